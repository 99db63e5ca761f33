mod commands;
mod utils;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "caldir-window")]
#[command(about = "Mirror a sliding window of your remote calendar into a local cache")]
struct Cli {
    /// Show sync decisions (-v) or everything (-vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reload the cached window around a date
    Refresh {
        /// Center of the window (defaults to today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Walk through visible dates the way a scrolling calendar view would
    Browse {
        /// Dates to visit in order (e.g. 2025-06-10 2025-06-14)
        #[arg(required = true)]
        dates: Vec<NaiveDate>,

        /// Pause between dates, in milliseconds
        #[arg(long, default_value_t = 150)]
        pause_ms: u64,
    },
    /// List cached events without touching the network
    Events {
        /// First day to list (defaults to today)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day to list (defaults to three days after --from)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Forget the cached window and wipe the local cache
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "caldir_window=info,caldir_window_core=info".into()),
        1 => EnvFilter::new("caldir_window=debug,caldir_window_core=debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Refresh { date } => commands::refresh::run(date).await,
        Commands::Browse { dates, pause_ms } => commands::browse::run(dates, pause_ms).await,
        Commands::Events { from, to } => commands::events::run(from, to).await,
        Commands::Clear => commands::clear::run().await,
    }
}
