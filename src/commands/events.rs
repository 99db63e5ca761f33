use anyhow::{Context, Result};
use caldir_window_core::DateRange;
use chrono::{Days, NaiveDate};

use crate::utils::render::print_events;

/// Days shown after `--from` when `--to` is not given.
const DEFAULT_SPAN_DAYS: u64 = 3;

pub async fn run(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<()> {
    let mirror = super::open_mirror().await?;
    let today = mirror.today();

    let range = listing_range(from, to, today)?;

    let events = mirror.events_in_range(&range).await?;
    print_events(&events, mirror.time_zone(), today);

    Ok(())
}

fn listing_range(from: Option<NaiveDate>, to: Option<NaiveDate>, today: NaiveDate) -> Result<DateRange> {
    let from = from.unwrap_or(today);
    let to = match to {
        Some(to) => to,
        None => from
            .checked_add_days(Days::new(DEFAULT_SPAN_DAYS))
            .with_context(|| format!("No date {DEFAULT_SPAN_DAYS} days after {from}, pass --to"))?,
    };

    Ok(DateRange::new(from, to)?)
}
