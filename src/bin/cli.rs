//! Forum monitor CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use forum_monitor::{
    config::{ConfigProvider, load_config},
    error::{AppError, Result},
    models::{Config, RetrievalMode},
    pipeline::{CycleStatus, PollCycle, Scheduler},
    services::{
        Authenticator, DocumentSource, FormLogin, HttpSource, NotificationSink, RecordExtractor,
        WebhookSink,
    },
    storage::{HistoryStore, SqliteHistory},
    utils::http,
};

/// forum-monitor - Forum Article Monitor
#[derive(Parser, Debug)]
#[command(
    name = "forum-monitor",
    version,
    about = "Watches a forum listing page and notifies a webhook about new articles"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the listing page on the configured interval until Ctrl-C
    Run {
        /// Reload the config file when it changes
        #[arg(long)]
        watch_config: bool,

        /// Seconds between config file checks
        #[arg(long, default_value_t = 5)]
        watch_interval: u64,
    },

    /// Run a single poll cycle and exit
    Once,

    /// Fetch and extract the listing without touching the history store
    Fetch,

    /// List stored articles that have not been notified yet
    Pending {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Validate the configuration file
    Validate,

    /// Send a test message through the configured webhook
    TestNotify {
        #[arg(long, default_value = "forum-monitor test message")]
        title: String,

        #[arg(long, default_value = "https://example.com/")]
        url: String,
    },
}

/// Initialize logging from the verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Resolves once Ctrl-C is received.
fn shutdown_signal() -> tokio::sync::oneshot::Receiver<()> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => {
                log::warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    });
    rx
}

async fn open_store(config: &Config) -> Result<Arc<SqliteHistory>> {
    let store = SqliteHistory::open(&config.storage.database).await?;
    Ok(Arc::new(store))
}

/// Fetch the listing page once, logging in first in session mode.
async fn fetch_listing(config: &Config) -> Result<String> {
    let client = http::create_async_client(&config.crawler)?;
    if config.retrieval.mode == RetrievalMode::Session {
        let credentials = config
            .credentials()
            .ok_or_else(|| AppError::config("session retrieval requires credentials"))?;
        FormLogin::new(client.clone(), &config.auth)
            .login(&credentials)
            .await?;
    }
    HttpSource::new(client, &config.site.listing_url).fetch().await
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Startup configuration errors are fatal.
    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging(cli.verbose, "info");
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
    };
    init_logging(cli.verbose, &config.logging.level);

    log::info!("forum-monitor starting...");
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Run {
            watch_config,
            watch_interval,
        } => {
            config.require_webhook()?;
            let store = open_store(&config).await?;
            let provider = Arc::new(ConfigProvider::open(&cli.config)?);

            let watcher = watch_config.then(|| {
                log::info!("Watching {} for changes", cli.config.display());
                Arc::clone(&provider).spawn_watcher(Duration::from_secs(watch_interval.max(1)))
            });

            let shutdown = shutdown_signal();
            let scheduler = Scheduler::new(provider, store.clone());
            let cycles = scheduler
                .run(async {
                    let _ = shutdown.await;
                })
                .await;

            if let Some(watcher) = watcher {
                watcher.abort();
            }
            store.close().await;
            log::info!("Stopped after {} cycles", cycles);
        }

        Command::Once => {
            config.require_webhook()?;
            let store = open_store(&config).await?;
            let cycle = PollCycle::from_config(&config, store.clone())?;
            let report = cycle.run().await;
            store.close().await;

            match report.status {
                CycleStatus::Completed => {
                    log::info!(
                        "{} new articles, {} notified, {} failed",
                        report.new_articles.len(),
                        report.dispatch.delivered,
                        report.dispatch.failed
                    );
                }
                CycleStatus::Failed { error, .. } => return Err(error),
                CycleStatus::TimedOut { stage } => {
                    return Err(AppError::Timeout {
                        stage: stage.to_string(),
                        secs: config.cycle_timeout().as_secs(),
                    });
                }
            }
        }

        Command::Fetch => {
            let markup = fetch_listing(&config).await?;
            let extractor = RecordExtractor::new(&config.selectors, &config.site.origin)?;
            let extraction = extractor.extract(&markup, config.detection.cap())?;

            for record in &extraction.records {
                println!(
                    "{:>8}  {}  {}",
                    record.source_id(&config.selectors.article_path_prefix),
                    record.title,
                    record.url
                );
            }
            log::info!(
                "{} articles ({} pinned, {} skipped)",
                extraction.records.len(),
                extraction.pinned,
                extraction.skipped
            );
        }

        Command::Pending { limit } => {
            let store = open_store(&config).await?;
            let pending = store.list_unnotified(limit).await?;
            for article in &pending {
                println!(
                    "#{:<6} {}  {}  {}",
                    article.id,
                    article.created_at.format("%Y-%m-%d %H:%M:%S"),
                    article.title,
                    article.url
                );
            }
            log::info!(
                "{} pending of {} stored articles",
                pending.len(),
                store.count().await?
            );
            store.close().await;
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            RecordExtractor::new(&config.selectors, &config.site.origin)?;
            log::info!("✓ Selectors OK");

            match config.require_webhook() {
                Ok(_) => log::info!("✓ Webhook configured"),
                Err(e) => log::warn!("{}", e),
            }
            log::info!("All validations passed!");
        }

        Command::TestNotify { title, url } => {
            let client = http::create_async_client(&config.crawler)?;
            let sink = WebhookSink::from_config(&config, client)?;
            sink.send(&title, &url).await?;
            log::info!("Test message delivered");
        }
    }

    log::info!("Done!");

    Ok(())
}
