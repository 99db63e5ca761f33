use anyhow::Result;
use chrono::NaiveDate;
use owo_colors::OwoColorize;

use crate::utils::render::print_events;
use crate::utils::tui::create_spinner;

pub async fn run(date: Option<NaiveDate>) -> Result<()> {
    let mirror = super::open_mirror().await?;
    let center = date.unwrap_or_else(|| mirror.today());

    let handle = mirror.refresh(center).await?;
    let range = handle.range();

    let spinner = create_spinner(format!("Refreshing {}...", range));
    let result = handle.wait().await;
    spinner.finish_and_clear();

    let count = result?;
    println!(
        "{} {} {}\n",
        "Cached".green(),
        range.to_string().bold(),
        format!("({count} events)").dimmed()
    );

    let events = mirror.events_in_range(&range).await?;
    print_events(&events, mirror.time_zone(), mirror.today());

    Ok(())
}
