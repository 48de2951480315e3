use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::database::models::Location;
use crate::database::{DatabaseManager, MemoryStore, PgStore, Store};
use crate::routes::app;
use crate::services::{Geocoder, LocationIqGeocoder, StaticGeocoder};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// PostgreSQL via DATABASE_URL
    Postgres,
    /// In-process store; data is lost on exit
    Memory,
}

#[derive(Debug, Parser)]
#[command(name = "cafe-directory")]
#[command(about = "Café directory API server")]
#[command(version)]
pub struct Cli {
    #[arg(long, help = "Port to listen on (overrides PORT and config)")]
    pub port: Option<u16>,

    #[arg(long, value_enum, default_value_t = StoreBackend::Postgres, help = "Storage backend")]
    pub store: StoreBackend,

    #[arg(long, help = "Apply pending migrations before serving")]
    pub migrate: bool,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env();
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    tracing::info!("Starting cafe directory in {:?} mode", config.environment);
    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }

    let store = build_store(&cli, &config).await?;
    let geocoder = build_geocoder(&config)?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(store, geocoder, config);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await.context("server error")?;
    Ok(())
}

async fn build_store(cli: &Cli, config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    match cli.store {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; nothing will be persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let manager = DatabaseManager::connect(&config.database).await?;
            if cli.migrate {
                manager.migrate().await?;
            }
            Ok(Arc::new(PgStore::new(manager.pool())))
        }
    }
}

fn build_geocoder(config: &AppConfig) -> anyhow::Result<Arc<dyn Geocoder>> {
    match config.geocoder.api_key.as_deref() {
        Some(key) if !key.is_empty() => {
            Ok(Arc::new(LocationIqGeocoder::new(&config.geocoder, key)?))
        }
        _ if config.is_development() => {
            tracing::warn!("GEOCODER_API_KEY not set; every address resolves to (0, 0)");
            Ok(Arc::new(StaticGeocoder::with_fallback(Location { lat: 0.0, lng: 0.0 })))
        }
        _ => anyhow::bail!("GEOCODER_API_KEY must be set outside development"),
    }
}
