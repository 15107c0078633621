//! Dealcast CLI
//!
//! Runs the broadcast scheduler, single cycles, and the operator commands
//! behind the bot's search and preference handlers.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use dealcast::{
    config::load_config,
    error::{AppError, Result},
    models::{Config, Listing, PreferenceUpdate},
    pipeline::{self, Broadcaster, CycleOutcome},
    services::{ListingCollector, TelegramMessenger},
    storage::{self, PreferenceStore, SqliteStore},
    utils::{http, url::AffiliateLinker},
};

/// Dealcast - deal collection and broadcast bot
#[derive(Parser, Debug)]
#[command(
    name = "dealcast",
    version,
    about = "Collects marketplace deals and broadcasts each one once"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the broadcast scheduler (Ctrl-C to stop)
    Run,

    /// Run one broadcast cycle now
    Cycle,

    /// Search listings for a query
    Search {
        query: String,

        /// Maximum listings to show
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },

    /// Show current deals
    Deals {
        /// Maximum listings to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Register a recipient and update their preferences
    Prefs {
        /// Recipient chat id
        id: i64,

        /// Display name used when the recipient is new
        #[arg(long, default_value = "")]
        name: String,

        #[arg(long, value_enum)]
        notifications: Option<Toggle>,

        /// Price ceiling in whole currency units
        #[arg(long)]
        max_price: Option<i64>,

        /// Comma-separated category keywords; pass an empty string to clear
        #[arg(long, value_delimiter = ',')]
        categories: Option<Vec<String>>,
    },

    /// Validate configuration
    Validate,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Toggle {
    On,
    Off,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn bot_token() -> Result<String> {
    std::env::var("BOT_TOKEN")
        .ok()
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| AppError::config("BOT_TOKEN is not set"))
}

fn build_collector(config: &Config) -> Result<ListingCollector> {
    let client = http::create_async_client(&config.collector)?;
    ListingCollector::new(config.collector.clone(), client)
}

fn build_broadcaster(config: &Config) -> Result<Broadcaster> {
    let collector = build_collector(config)?;
    let messenger = TelegramMessenger::new(&bot_token()?, &config.delivery)?;
    let store = storage::open_or_degraded(&config.store);

    Ok(Broadcaster::new(
        Arc::new(collector),
        store,
        Arc::new(messenger),
        config,
    ))
}

fn print_listings(listings: &[Listing], linker: &AffiliateLinker) {
    if listings.is_empty() {
        println!("Nessuna offerta trovata.");
        return;
    }
    for (i, listing) in listings.iter().enumerate() {
        println!("{}. {} - {}", i + 1, listing.title(), listing.price_display());
        if let Some(original) = &listing.original_price_display {
            println!("   invece di {}", original);
        }
        println!("   {}", linker.affiliate_link(&listing.source_url));
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli.config)?;
    log::debug!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Run => {
            let broadcaster = Arc::new(build_broadcaster(&config)?);
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("Cannot listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            };
            pipeline::run_scheduled(broadcaster, &config.schedule, shutdown).await;
        }

        Command::Cycle => {
            let broadcaster = build_broadcaster(&config)?;
            match broadcaster.run_cycle().await {
                CycleOutcome::Completed(report) => {
                    log::info!(
                        "Cycle complete: {} sent to the channel, {} personal",
                        report.channel_sent,
                        report.personal_sent
                    );
                }
                CycleOutcome::Aborted(reason) => {
                    return Err(AppError::fetch("all sources", reason));
                }
                CycleOutcome::Skipped => log::warn!("Cycle skipped"),
            }
        }

        Command::Search { query, limit } => {
            let collector = build_collector(&config)?;
            let listings = collector.collect(Some(query.as_str()), limit).await?;
            print_listings(&listings, &AffiliateLinker::new(&config.affiliate));
        }

        Command::Deals { limit } => {
            let collector = build_collector(&config)?;
            let listings = collector.collect(None, limit).await?;
            print_listings(&listings, &AffiliateLinker::new(&config.affiliate));
        }

        Command::Prefs {
            id,
            name,
            notifications,
            max_price,
            categories,
        } => {
            let store = SqliteStore::open(&config.store.database_url, &config.store)?;
            store.upsert_recipient(id, &name).await?;

            let update = PreferenceUpdate {
                notifications: notifications.map(|t| matches!(t, Toggle::On)),
                categories: categories.map(|list| {
                    list.into_iter()
                        .map(|c| c.trim().to_lowercase())
                        .filter(|c| !c.is_empty())
                        .collect()
                }),
                max_price,
            };
            if !update.is_empty() {
                store.set_preferences(id, &update).await?;
            }

            if let Some(recipient) = store.get_recipient(id).await? {
                println!("Recipient {} ({})", recipient.id, recipient.display_name);
                println!(
                    "  Notifications: {}",
                    if recipient.notifications_enabled { "on" } else { "off" }
                );
                println!("  Max price: {}", recipient.max_price);
                println!(
                    "  Categories: {}",
                    if recipient.categories.is_empty() {
                        "all".to_string()
                    } else {
                        recipient.categories.join(", ")
                    }
                );
            }
        }

        Command::Validate => {
            // load_config already validated; reaching here means the file is sound.
            log::info!("✓ Config OK ({} sources)", config.collector.sources.len());
            if bot_token().is_err() {
                log::warn!("BOT_TOKEN is not set; run and cycle will refuse to start");
            }
        }
    }

    Ok(())
}
