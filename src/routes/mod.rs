mod analytics;
pub mod common;
mod connectors;
pub mod documents;
mod enterprise;
pub mod health;

use axum::{middleware::from_fn_with_state, Router};

use crate::{middleware::rate_limit_middleware, AppState};

/// Combine all API routes; everything except `/health` is rate limited
pub fn api_routes(state: AppState) -> Router<AppState> {
    let limited = Router::new()
        .merge(health::system_routes())
        .nest("/enterprise", enterprise::routes())
        .nest("/documents", documents::routes(state.config.max_file_size))
        .nest("/analytics", analytics::routes())
        .nest("/connectors", connectors::routes())
        .route_layer(from_fn_with_state(state, rate_limit_middleware));

    Router::new().merge(health::routes()).merge(limited)
}
