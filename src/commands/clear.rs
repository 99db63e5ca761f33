use anyhow::Result;
use owo_colors::OwoColorize;

pub async fn run() -> Result<()> {
    let mirror = super::open_mirror().await?;
    mirror.clear_on_sign_out().await?;

    println!("{}", "Local cache cleared".green());
    Ok(())
}
