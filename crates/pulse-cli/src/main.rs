mod jobs;
mod sources;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use pulse_analysis::{AnalysisService, PgAnalysisStore, PgJobQueue, WorkerConfig};
use pulse_core::AppConfig;
use pulse_sentiment::SentimentAggregator;
use tracing_subscriber::EnvFilter;

use crate::jobs::JobsCommands;
use crate::sources::SourcesCommands;

#[derive(Debug, Parser)]
#[command(name = "pulse-cli")]
#[command(about = "Tenant-scoped document analysis jobs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database administration
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Submit, inspect and recover analysis jobs
    Jobs {
        #[command(subcommand)]
        command: JobsCommands,
    },
    /// Sources visible to a tenant
    Sources {
        #[command(subcommand)]
        command: SourcesCommands,
    },
    /// Consume the job queue until interrupted
    Worker {
        /// Override the configured number of concurrent deliveries
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("pulse-cli: no command given (see --help)");
        return Ok(());
    };

    let config = pulse_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool = pulse_db::connect(&config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                pulse_db::health_check(&pool).await?;
                println!("database: ok");
            }
            DbCommands::Migrate => {
                let applied = pulse_db::run_migrations(&pool).await?;
                println!("migrations: {applied} applied");
            }
        },
        Commands::Jobs { command } => {
            let service = build_service(&pool, &config)?;
            jobs::run(&service, &config, command).await?;
        }
        Commands::Sources { command } => {
            let service = build_service(&pool, &config)?;
            sources::run(&service, command).await?;
        }
        Commands::Worker { concurrency } => {
            run_worker(&pool, &config, concurrency).await?;
        }
    }

    Ok(())
}

/// Wire the Postgres store and queue into an [`AnalysisService`].
fn build_service(pool: &sqlx::PgPool, config: &AppConfig) -> anyhow::Result<Arc<AnalysisService>> {
    let sentiment = SentimentAggregator::from_app_config(config)
        .map_err(|e| anyhow::anyhow!("invalid sentiment configuration: {e}"))?;
    Ok(Arc::new(AnalysisService::new(
        Arc::new(PgAnalysisStore::new(pool.clone())),
        Arc::new(PgJobQueue::new(pool.clone(), config.queue_name.clone())),
        Arc::new(sentiment),
        config.trend_params(),
    )))
}

async fn run_worker(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    concurrency: Option<usize>,
) -> anyhow::Result<()> {
    // Each claim holds a connection while the job runs on another.
    if config.db_max_connections < 2 {
        anyhow::bail!(
            "worker needs PULSE_DB_MAX_CONNECTIONS >= 2, got {}",
            config.db_max_connections
        );
    }

    let service = build_service(pool, config)?;
    let consumer = Arc::new(PgJobQueue::new(pool.clone(), config.queue_name.clone()));
    let mut worker_config = WorkerConfig::from_app_config(config);
    if let Some(n) = concurrency {
        worker_config = worker_config.with_concurrency(n, config.db_max_connections);
    }

    tracing::info!(
        queue = %config.queue_name,
        concurrency = worker_config.concurrency,
        sentiment_enabled = config.sentiment_enabled,
        "starting worker"
    );
    let stats = pulse_analysis::run_worker(service, consumer, worker_config, shutdown_signal()).await;
    println!(
        "worker stopped: {} completed, {} skipped, {} failed, {} released, {} malformed",
        stats.completed, stats.skipped, stats.failed, stats.released, stats.malformed
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests;
