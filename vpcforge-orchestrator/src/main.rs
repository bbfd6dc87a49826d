use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod provider;
pub mod repository;
pub mod service;
pub mod trigger;
pub mod workflow;

use config::Config;
use provider::SimulatedProvider;
use repository::{JobStore, MemoryJobStore, PgJobStore};
use trigger::TaskTrigger;
use workflow::TopologyWorkflow;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vpcforge_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting VPCForge Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let store = connect_store(&config).await?;

    tracing::info!(
        "Using simulated cloud provider with zones {:?}",
        config.simulated_zones
    );
    let provider = Arc::new(SimulatedProvider::new(config.simulated_zones.clone()));

    let workflow = Arc::new(TopologyWorkflow::new(
        provider,
        store.clone(),
        config.workflow(),
    ));
    let trigger = Arc::new(TaskTrigger::new(workflow, config.max_parallel_jobs));

    // Build router with all API endpoints
    let app = api::create_router(api::AppState { store, trigger });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}

async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn JobStore>> {
    let Some(database_url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set, job records will only live in memory");
        return Ok(Arc::new(MemoryJobStore::new()));
    };

    tracing::info!("Connecting to database...");

    let pool = db::create_pool(database_url)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    db::run_migrations(&pool, &config.jobs_table)
        .await
        .context("Failed to run database migrations")?;

    Ok(Arc::new(PgJobStore::new(pool, config.jobs_table.clone())))
}
