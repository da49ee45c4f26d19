use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use newsdesk::api::{self, AppState};
use newsdesk::backup::{self, BackupScheduler, BackupStore, DailyCadence};
use newsdesk::collect::CollectionScheduler;
use newsdesk::config::Config;
use newsdesk::feed::{self, HttpFetch};
use newsdesk::restore::RestoreEngine;
use newsdesk::storage::Database;

#[derive(Parser, Debug)]
#[command(
    name = "newsdesk",
    about = "News article collection with search and snapshot backup"
)]
struct Args {
    /// Config file (default: ~/.config/newsdesk/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API and run the collection and backup schedules
    Serve,

    /// Run a single collection pass and exit
    Collect,

    /// Write the snapshot for one day (default: yesterday)
    Backup {
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
    },

    /// Restore articles missing from the store for an inclusive date range
    Restore {
        #[arg(long, value_name = "YYYY-MM-DD")]
        from: NaiveDate,
        #[arg(long, value_name = "YYYY-MM-DD")]
        to: NaiveDate,
    },

    /// Manage collection interests
    Interest {
        #[command(subcommand)]
        command: InterestCommand,
    },
}

#[derive(Subcommand, Debug)]
enum InterestCommand {
    /// Register an interest
    Add {
        #[arg(long)]
        name: String,
        /// Repeat for several keywords
        #[arg(long = "keyword", required = true)]
        keywords: Vec<String>,
    },

    /// List registered interests
    List,
}

/// Everything a subcommand may need, built once from the config
struct Services {
    config: Config,
    db: Database,
    http: HttpFetch,
    backup_store: Arc<dyn BackupStore>,
}

impl Services {
    async fn build(config: Config) -> Result<Self> {
        let db_path = config.database_path.to_string_lossy().into_owned();
        let db = Database::open(&db_path)
            .await
            .with_context(|| format!("Failed to open database at '{db_path}'"))?;

        let client = feed::build_client().context("Failed to build HTTP client")?;
        let http = HttpFetch::new(client.clone())
            .with_timeout(Duration::from_secs(config.collection.fetch_timeout_secs));
        let backup_store = backup::store_from_config(&config.backup, client)
            .context("Failed to configure backup store")?;

        Ok(Self {
            config,
            db,
            http,
            backup_store,
        })
    }

    fn collection(&self) -> Result<CollectionScheduler> {
        let fetchers = feed::build_fetchers(&self.config.sources, &self.http)
            .context("Failed to configure news sources")?;
        if fetchers.is_empty() {
            tracing::warn!("No sources configured, collection runs will store nothing");
        }
        Ok(CollectionScheduler::new(
            self.db.clone(),
            fetchers,
            Duration::from_secs(self.config.collection.fetch_timeout_secs),
        ))
    }

    fn backup_scheduler(&self) -> Result<BackupScheduler> {
        let backup = &self.config.backup;
        let tz = FixedOffset::east_opt(backup.utc_offset_hours * 3600)
            .context("backup.utc_offset_hours is out of range")?;
        let cadence = DailyCadence::new(tz, backup.hour, backup.minute)
            .context("backup.hour/backup.minute is not a valid time of day")?;
        Ok(BackupScheduler::new(
            self.db.clone(),
            self.backup_store.clone(),
            cadence,
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => Config::default_path().context("HOME environment variable not set")?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from '{}'", config_path.display()))?;
    let services = Services::build(config).await?;

    match args.command {
        Command::Serve => serve(services).await,
        Command::Collect => {
            let summary = services.collection()?.run_once().await?;
            println!(
                "Collected {} new articles for {} interests \
                 ({} fetch failures, {} ingest failures)",
                summary.stored, summary.interests, summary.fetch_failures, summary.ingest_failures
            );
            Ok(())
        }
        Command::Backup { date } => {
            let scheduler = services.backup_scheduler()?;
            let date = date.unwrap_or_else(|| scheduler.yesterday(Utc::now()));
            let written = scheduler
                .backup_date(date)
                .await
                .with_context(|| format!("Backup for {date} failed"))?;
            println!("Saved {written} articles for {date}");
            Ok(())
        }
        Command::Restore { from, to } => {
            let engine = RestoreEngine::new(services.db.clone(), services.backup_store.clone());
            let results = engine.restore(from, to).await?;
            for result in &results {
                match &result.failure {
                    Some(failure) => println!("{}: skipped ({failure})", result.restore_date),
                    None => println!(
                        "{}: restored {} articles",
                        result.restore_date, result.restored_article_count
                    ),
                }
            }
            Ok(())
        }
        Command::Interest { command } => match command {
            InterestCommand::Add { name, keywords } => {
                let interest = services.db.insert_interest(&name, &keywords).await?;
                println!("{}\t{}", interest.id, interest.name);
                Ok(())
            }
            InterestCommand::List => {
                for interest in services.db.list_interests().await? {
                    println!(
                        "{}\t{}\t{}",
                        interest.id,
                        interest.name,
                        interest.keywords.join(",")
                    );
                }
                Ok(())
            }
        },
    }
}

async fn serve(services: Services) -> Result<()> {
    let mut tasks = Vec::new();

    if services.config.collection.enabled {
        let period = Duration::from_secs(services.config.collection.interval_minutes * 60);
        tasks.push(services.collection()?.spawn(period));
    } else {
        tracing::info!("Scheduled collection disabled");
    }

    if services.config.backup.enabled {
        tasks.push(services.backup_scheduler()?.spawn());
    } else {
        tracing::info!("Scheduled backup disabled");
    }

    let state = AppState::new(services.db.clone(), services.backup_store.clone());
    let app = api::router(state);

    let bind = &services.config.server.bind;
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    tracing::info!(addr = %bind, "API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    for task in tasks {
        task.abort();
    }
    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
