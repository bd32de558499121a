//! Innkeeper - hotel room reservation service

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use innkeeper::{
    api::{self, AppState},
    cache::create_cache,
    config::Config,
    db::{self, repositories::SqlxReservationRepository},
    services::BookingService,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "innkeeper=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting innkeeper reservation service...");

    let config = Config::load(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let cache = create_cache(&config.cache).await?;
    tracing::info!("Cache initialized: {:?}", config.cache.driver);

    let reservation_repo = SqlxReservationRepository::boxed(pool.clone());
    let booking_service = Arc::new(BookingService::new(reservation_repo, cache));

    let state = AppState {
        pool: pool.clone(),
        booking_service,
    };

    let app = api::build_router(state, &config.server.cors_origin);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
