use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use offer_finder::api::{self, ApiState};
use offer_finder::config::{AppConfig, FetchMode, load_config};
use offer_finder::fetchers::StaticFetcher;
use offer_finder::scraper::Scraper;
use offer_finder::offer_finder::scrape_once;
use offer_finder::{feed, store};

#[derive(Debug, Parser)]
#[command(name = "offer-finder", version, about = "Scrapes promotional offers into a JSON file and serves it")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scrape every category once and write the payload (default)
    Scrape(ScrapeArgs),
    /// Import offers from a JSON feed and write the payload
    Import {
        /// Feed URL returning `{ "offers": [...] }` or an array of offers
        url: String,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Serve the stored payload over HTTP
    Serve {
        #[arg(long)]
        bind: Option<SocketAddr>,
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Scrape now, then again on the configured cron schedule
    Watch(ScrapeArgs),
}

#[derive(Debug, Default, clap::Args)]
struct ScrapeArgs {
    #[arg(long, value_enum)]
    mode: Option<FetchMode>,
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// Skip visiting offer pages to fill missing fields
    #[arg(long)]
    no_enrich: bool,
}

impl ScrapeArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(mode) = self.mode {
            config.fetch_mode = mode;
        }
        if let Some(ref output) = self.output {
            config.output_path.clone_from(output);
        }
        if self.no_enrich {
            config.enrich = false;
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if let Err(e) = run(cli.command, config).await {
        error!("Run failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run(command: Option<Command>, mut config: AppConfig) -> Result<()> {
    match command.unwrap_or_else(|| Command::Scrape(ScrapeArgs::default())) {
        Command::Scrape(args) => {
            args.apply(&mut config);
            scrape(&config).await
        }
        Command::Import { url, output } => {
            if let Some(output) = output {
                config.output_path = output;
            }
            let fetcher = StaticFetcher::new(&config.site.user_agent, config.request_timeout)?;
            let scraper = Scraper::new(&config.site)?;
            let offer_set = feed::import(&fetcher, &scraper, &url).await?;
            store::persist(&offer_set, &config.output_path).await?;
            Ok(())
        }
        Command::Serve { bind, data } => {
            let bind = bind.unwrap_or(config.bind_addr);
            let data = data.unwrap_or(config.output_path);
            api::serve(bind, ApiState::new(data)).await
        }
        Command::Watch(args) => {
            args.apply(&mut config);
            watch(config).await
        }
    }
}

async fn scrape(config: &AppConfig) -> Result<()> {
    let offer_set = scrape_once(config).await?;
    info!(
        "Done: {} offers written to {}",
        offer_set.count,
        config.output_path.display()
    );
    Ok(())
}

async fn watch(config: AppConfig) -> Result<()> {
    info!("Starting offer watcher");

    let config = Arc::new(config);
    let running = Arc::new(Mutex::new(()));

    // Run once immediately
    if let Err(e) = scrape_once(&config).await {
        error!("Error during initial scrape: {e:#}");
    }

    let sched = JobScheduler::new().await?;

    let job_config = Arc::clone(&config);
    let job_lock = Arc::clone(&running);
    sched
        .add(Job::new_async(config.schedule.as_str(), move |_uuid, _l| {
            let config = Arc::clone(&job_config);
            let lock = Arc::clone(&job_lock);
            Box::pin(async move {
                let Ok(_guard) = lock.try_lock() else {
                    warn!("Previous scrape still running, skipping this tick");
                    return;
                };
                if let Err(e) = scrape_once(&config).await {
                    error!("Error during scheduled scrape: {e:#}");
                }
            })
        })?)
        .await?;

    info!("Scheduler started with schedule \"{}\"", config.schedule);
    sched.start().await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {e}");
    }

    info!("Shutting down watcher");
    Ok(())
}
