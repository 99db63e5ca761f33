use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use owo_colors::OwoColorize;

use crate::utils::render::{format_decision, format_state};
use crate::utils::tui::create_spinner;

pub async fn run(dates: Vec<NaiveDate>, pause_ms: u64) -> Result<()> {
    let mirror = super::open_mirror().await?;
    let pause = Duration::from_millis(pause_ms);

    for date in dates {
        let decision = mirror.on_visible_date_changed(date, false).await;
        println!("{}  {}", date.to_string().bold(), format_decision(&decision));
        tokio::time::sleep(pause).await;
    }

    let spinner = create_spinner("Waiting for fetches to finish...".into());
    let state = mirror.settled().await;
    spinner.finish_and_clear();

    let stats = mirror.stats();
    println!();
    match mirror.current_cached_range() {
        Some(range) => println!("Cached window: {}", range.to_string().bold()),
        None => println!("Cached window: {}", "none".dimmed()),
    }
    println!("Network: {}", format_state(&state));
    println!(
        "{}",
        format!(
            "{} fetches: {} completed, {} cancelled, {} failed, {} events written",
            stats.started, stats.completed, stats.cancelled, stats.failed, stats.events_written
        )
        .dimmed()
    );

    if state.is_error() {
        anyhow::bail!("Last fetch failed");
    }

    Ok(())
}
