use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use super::{RequestMeta, ENTERPRISE_HEADER};
use crate::{error::AppError, AppState};

/// Rate limiter state
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_secs: u64) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub async fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        let entry = requests.entry(key.to_string()).or_insert_with(Vec::new);

        // Remove old requests outside the window
        entry.retain(|&time| now.duration_since(time) < self.window);

        if entry.len() >= self.max_requests {
            false
        } else {
            entry.push(now);
            true
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Cleanup old entries periodically
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        requests.retain(|_, times| {
            times.retain(|&time| now.duration_since(time) < self.window);
            !times.is_empty()
        });
    }
}

/// Limiter key: the enterprise header when present, else the client address.
pub fn rate_limit_key(headers: &HeaderMap) -> String {
    if let Some(enterprise) = headers
        .get(ENTERPRISE_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return format!("enterprise:{}", enterprise);
    }

    RequestMeta::from_headers(headers)
        .ip_address
        .map(|ip| format!("ip:{}", ip))
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = rate_limit_key(request.headers());

    if state.rate_limiter.check(&key).await {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(key = %key, "Rate limit exceeded");
        Err(AppError::RateLimited {
            retry_after: state.rate_limiter.window().as_secs(),
        })
    }
}
