use caldir_window_core::{EventRecord, EventStatus, FetchDecision, FetchMode, NetworkState};
use chrono::NaiveDate;
use chrono_tz::Tz;
use owo_colors::OwoColorize;

/// Print events grouped by day, in `tz`.
pub fn print_events(events: &[EventRecord], tz: Tz, today: NaiveDate) {
    if events.is_empty() {
        println!("{}", "No events found".dimmed());
        return;
    }

    let mut current_date: Option<NaiveDate> = None;

    for event in events {
        let date = event.start_date(tz);

        if current_date != Some(date) {
            if current_date.is_some() {
                println!();
            }
            println!("{}", date_label(date, today).bold());
            current_date = Some(date);
        }

        let time = if event.all_day {
            format!("{:>7}", "all-day")
        } else {
            format!("{:>7}", event.start.with_timezone(&tz).format("%H:%M"))
        };

        match event.status {
            EventStatus::Cancelled => println!("  {} {}", time, event.summary.strikethrough().dimmed()),
            EventStatus::Tentative => println!("  {} {} {}", time, event.summary, "(tentative)".dimmed()),
            EventStatus::Confirmed => println!("  {} {}", time, event.summary),
        }
    }
}

/// "Today", "Tomorrow" or e.g. "Wed Feb 25".
fn date_label(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        -1 => "Yesterday".to_string(),
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => date.format("%a %b %-d").to_string(),
    }
}

pub fn format_decision(decision: &FetchDecision) -> String {
    match decision {
        FetchDecision::NoOp => "cached".dimmed().to_string(),
        FetchDecision::NotSignedIn => "not signed in".yellow().to_string(),
        FetchDecision::AlreadyInFlight { range } => {
            format!("{} {}", "in flight".dimmed(), range.to_string().dimmed())
        }
        FetchDecision::Fetch { range, mode } => {
            let verb = match mode {
                FetchMode::Replace => "load".cyan().to_string(),
                FetchMode::Merge => "prefetch".blue().to_string(),
            };
            format!("{verb} {range}")
        }
    }
}

pub fn format_state(state: &NetworkState) -> String {
    match state {
        NetworkState::Idle => "idle".green().to_string(),
        NetworkState::Loading => "loading".yellow().to_string(),
        NetworkState::Error(message) => format!("{} {}", "error:".red(), message),
    }
}
