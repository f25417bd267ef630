use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use group_crawler::{
    config::{Config, LogFormat},
    database::{Database, repositories::Repositories},
    job_scheduling::{
        JobCreator, JobDispatcher, JobScheduler, JobSchedulingAPI,
        executors::{CrawlContext, build_registry},
    },
    network::{DisconnectedClient, NetworkClient},
};

#[derive(Parser)]
#[command(name = "group-crawler")]
#[command(version)]
#[command(about = "Crawls group chats, their members and message history through a persistent job queue")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config.toml")]
    config: String,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

fn init_tracing(log_level: &str, format: LogFormat) {
    let log_filter = format!("group_crawler={log_level},sea_orm=warn");
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Cancel `token` on Ctrl-C or SIGTERM
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
    token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_from_file(&cli.config)?;
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    init_tracing(&cli.log_level, config.logging.format);
    info!("Starting group crawler v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {}", cli.config);
    info!("Using database: {}", config.database.url);

    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    info!("Database connection established and migrations applied");

    let repositories = Repositories::new(database.connection());
    let recovery = repositories
        .job_records
        .recover()
        .await
        .context("Startup recovery failed")?;
    info!(
        "Recovery: {} orphaned records back to NEW, {} recurring markers cancelled",
        recovery.reset_to_new, recovery.markers_cancelled
    );

    let created = repositories.job_type_settings.ensure_all().await?;
    if !created.is_empty() {
        info!("Created settings for job types: {:?}", created);
    }

    let network: Arc<dyn NetworkClient> = Arc::new(DisconnectedClient);
    let creator = Arc::new(JobCreator::new(
        repositories.job_records.clone(),
        config.scheduler.dedup_cache_capacity,
    ));
    let ctx = Arc::new(CrawlContext::new(
        repositories.clone(),
        creator.clone(),
        network.clone(),
        config.crawler.clone(),
    ));
    let registry = Arc::new(build_registry(ctx)?);
    info!("Registered executors: {:?}", registry.registered_types());

    let dispatcher = Arc::new(JobDispatcher::new(
        registry,
        repositories.job_records.clone(),
        repositories.job_type_settings.clone(),
        network,
        config.scheduler.clone(),
    ));

    let api = JobSchedulingAPI::new(
        dispatcher.clone(),
        creator,
        repositories.job_records.clone(),
        repositories.job_type_settings.clone(),
    );
    let health = api.health_check().await;
    info!(
        "Job queue: {} pending, {} running",
        health.pending_jobs, health.running_jobs
    );

    let cancellation_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancellation_token.clone()));

    JobScheduler::new(dispatcher).run(cancellation_token).await?;
    info!("Group crawler stopped");
    Ok(())
}
