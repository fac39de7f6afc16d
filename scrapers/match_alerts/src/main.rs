use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{error, info};

use match_alerts::{
    config::AlertConfig,
    fetch::WebFetcher,
    notify::{TwilioAccount, TwilioNotifier},
    schedule::{ingest_schedules, FileScheduleStore},
    server,
    tracker::{Tracker, TrackerState},
};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Poll result pages periodically and answer inbound texts
    Serve,
    /// Run a single poll cycle and send any notifications
    Poll,
    /// Build per-team schedule files from the division match lists
    IngestSchedule,
}

async fn build_tracker(config: &AlertConfig) -> Result<Tracker<WebFetcher, TwilioNotifier>> {
    if config.sms.from_number.is_empty() {
        bail!("SMS_FROM_NUMBER is not set");
    }
    let account = TwilioAccount::resolve(&config.sms).await?;
    let notifier = TwilioNotifier::new(account, &config.sms);
    let fetcher = WebFetcher::new(&config.scraping)?;
    let state = TrackerState::open(&config.storage).await?;
    Ok(Tracker::new(config, fetcher, notifier, state))
}

async fn serve(config: AlertConfig) -> Result<()> {
    let tracker = Arc::new(build_tracker(&config).await?);
    info!(
        "Watching {} results pages every {}s",
        config.event.results_urls.len(),
        config.scraping.poll_interval_secs
    );

    let poller = tracker.clone();
    let period = config.scraping.poll_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let report = poller.poll().await;
            if !report.failed_pages.is_empty() {
                error!("Failed to fetch {} results pages", report.failed_pages.len());
            }
            if !report.new_results.is_empty() {
                info!("Recorded {} new results", report.new_results.len());
            }
        }
    });

    server::serve(server::router(tracker), config.server.port).await
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = AlertConfig::from_env();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await?,
        Commands::Poll => {
            let tracker = build_tracker(&config).await?;
            let report = tracker.poll().await;
            for url in &report.failed_pages {
                error!("Could not fetch {}", url);
            }
            println!("{} new results", report.new_results.len());
        }
        Commands::IngestSchedule => {
            let fetcher = WebFetcher::new(&config.scraping)?;
            let store = FileScheduleStore::new(&config.storage.matches_dir);
            let teams = ingest_schedules(&fetcher, &config.event.match_list_urls, &store).await?;
            println!("Wrote schedules for {} teams", teams);
        }
    }

    Ok(())
}
