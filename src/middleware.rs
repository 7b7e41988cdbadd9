//! Filter Middleware (spec.md §4.5) — the request-time orchestrator.
//!
//! Grounded in the teacher's `security.rs` (`ip_access_control_middleware`)
//! and `auth.rs` (`admin_auth_middleware`) shape: extract
//! `ConnectInfo<SocketAddr>`, consult shared state, either short-circuit
//! with a `Response` or call `next.run(request).await`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Json, Router,
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tracing::info;

use crate::badip::BadIpLists;
use crate::cache::{CacheStats, EnrichmentCache, is_fresh};
use crate::config::Config;
use crate::decision::{Decision, decide};
use crate::enrichment::EnrichmentClient;
use crate::quota::RateState;
use crate::response::service_unavailable;

pub struct AppState {
    pub config: Arc<Config>,
    pub bad_ip_lists: Arc<BadIpLists>,
    pub cache: Arc<EnrichmentCache>,
    pub client: Arc<EnrichmentClient>,
    pub rate_state: Arc<RateState>,
}

impl AppState {
    pub fn new(config: Config, bad_ip_lists: BadIpLists) -> Self {
        let cache = EnrichmentCache::new(config.cache_size);
        Self {
            bad_ip_lists: Arc::new(bad_ip_lists),
            cache: Arc::new(cache),
            client: Arc::new(EnrichmentClient::new()),
            rate_state: Arc::new(RateState::new()),
            config: Arc::new(config),
        }
    }
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// The state machine from spec.md §4.5, implemented as an
/// `axum::middleware::from_fn_with_state` layer.
pub async fn filter_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = addr.ip();
    let path = request.uri().path().to_string();
    let config = &state.config;

    if config.block_ip.contains(&ip) {
        let spec = config.response.select(crate::response::DenyCategory::Ip);
        return spec.render();
    }

    if crate::cidr::is_private_or_reserved(&ip) {
        return service_unavailable(None);
    }

    let now = now_epoch();
    let cached = state.cache.get(&ip);

    let record = match cached {
        Some(record) if is_fresh_for(&record, now, config) => record,
        _ => {
            if state.rate_state.is_limited(now) {
                return service_unavailable(Some(state.rate_state.reset_at()));
            }

            let (record, rate_limit) = state.client.lookup(ip, now).await;
            state.cache.put(ip, record.clone());

            if let Some(reset_at) = rate_limit.exhausted_until {
                state.rate_state.set_reset_at(reset_at);
            }

            if !record.is_actionable() {
                return service_unavailable(None);
            }

            record
        }
    };

    if !record.is_actionable() {
        return service_unavailable(None);
    }
    let payload = record.payload.as_ref().expect("actionable record has a payload");

    match decide(ip, &path, payload, config, &state.bad_ip_lists) {
        Decision::Forward => next.run(request).await,
        Decision::Deny(category) => {
            log_block(config.disable_logging, &ip, &path, category.label());
            config.response.select(category).render()
        }
    }
}

fn is_fresh_for(record: &crate::enrichment::EnrichmentRecord, now: i64, config: &Config) -> bool {
    let ttl = if record.is_success() {
        config.invalidate_success_after.as_secs()
    } else {
        config.invalidate_error_after.as_secs()
    };
    is_fresh(record.last_updated, now, ttl)
}

fn log_block(disable_logging: bool, ip: &std::net::IpAddr, path: &str, category: &str) {
    if disable_logging {
        return;
    }
    info!(
        "Blocked '{}' from accessing '{}' based on {} block condition.",
        ip, path, category
    );
}

pub fn admin_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/_filter/health", get(health_handler))
        .route("/_filter/cache-stats", get(cache_stats_handler))
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn cache_stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats: CacheStats = state.cache.stats();
    Json(stats)
}

/// Wraps `app` with the filter middleware, consistent with every
/// `*_middleware` function in the teacher crate.
pub fn with_filter(app: Router, state: Arc<AppState>) -> Router {
    app.layer(middleware::from_fn_with_state(state, filter_middleware))
}
