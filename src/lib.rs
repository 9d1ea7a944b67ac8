pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::time::Duration;

use anyhow::Result;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::{config::Config, middleware::RateLimiter};

const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Config,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(db: sqlx::PgPool, config: Config) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit_per_minute, RATE_LIMIT_WINDOW_SECS);
        Self {
            db,
            config,
            rate_limiter,
        }
    }
}

/// Create the application with all routes and middleware
pub async fn create_app(config: Config) -> Result<Router> {
    let db = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&db).await?;

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let state = AppState::new(db, config);
    spawn_rate_limit_cleanup(state.rate_limiter.clone());

    Ok(build_router(state))
}

/// Router over an existing state, without touching the database
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::api_routes(state.clone()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
}

fn spawn_rate_limit_cleanup(limiter: RateLimiter) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(RATE_LIMIT_WINDOW_SECS));
        loop {
            interval.tick().await;
            limiter.cleanup().await;
        }
    });
}
