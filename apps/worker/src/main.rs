//! Keystone audit worker runtime.
//!
//! Consumes resource events from Redis and appends them to the PostgreSQL
//! audit trail.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use keystone_application::{AuditTrailConsumer, EventBus};
use keystone_core::{AppError, AppResult};
use keystone_domain::catalog::builtin_catalog;
use keystone_infrastructure::{PostgresAuditRepository, RedisEventSubscriber};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    redis_url: String,
    channel_prefix: String,
    db_max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_and_migrate(&config).await?;
    let redis_client = redis::Client::open(config.redis_url.as_str())
        .map_err(|error| AppError::Internal(format!("invalid REDIS_URL: {error}")))?;

    let audit_consumer = Arc::new(AuditTrailConsumer::new(Arc::new(
        PostgresAuditRepository::new(pool),
    )));
    let catalog = builtin_catalog()?;
    let mut builder = EventBus::builder();
    for definition in &catalog {
        builder = builder.subscribe_all(definition.event_names(), audit_consumer.clone());
    }
    let event_bus = builder.start();
    let publisher = event_bus.publisher();
    let subscriber = RedisEventSubscriber::new(redis_client, config.channel_prefix.clone());

    info!(
        channel_prefix = %config.channel_prefix,
        resources = catalog.len(),
        db_max_connections = config.db_max_connections,
        "keystone-worker started"
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        match subscriber.run(&publisher, shutdown.as_mut()).await {
            Ok(()) => break,
            Err(error) => {
                warn!(error = %error, "resource event subscription lost, reconnecting");
                tokio::select! {
                    () = &mut shutdown => break,
                    () = tokio::time::sleep(RECONNECT_DELAY) => {}
                }
            }
        }
    }

    event_bus.shutdown().await;
    info!("keystone-worker stopped");
    Ok(())
}

async fn connect_and_migrate(config: &WorkerConfig) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let redis_url = required_env("REDIS_URL")?;
        let channel_prefix = env::var("KEYSTONE_EVENT_CHANNEL_PREFIX")
            .ok()
            .map(|value| value.trim().trim_end_matches(':').to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "keystone:events".to_owned());
        let db_max_connections = parse_env_u32("KEYSTONE_DB_MAX_CONNECTIONS", 5)?;

        if db_max_connections == 0 {
            return Err(AppError::Validation(
                "KEYSTONE_DB_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            redis_url,
            channel_prefix,
            db_max_connections,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
