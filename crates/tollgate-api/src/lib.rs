//! tollgate-api — HTTP surface for the Tollgate engine.
//!
//! Thin axum handlers over a shared `Arc<Engine>`. Every `/api/v1` response
//! uses the `{success, data?, error?}` envelope; `/health` returns the bare
//! report so load balancers can read it.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/health` | Health report; 503 when unhealthy |
//! | GET | `/api/v1/dashboard` | Dashboard snapshot, cached for a short TTL |
//! | POST | `/api/v1/chat` | Run the chat pipeline |
//! | POST | `/api/v1/eval` | Run the evaluation suite |
//! | GET | `/metrics` | Prometheus exposition |

pub mod cache;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tollgate_engine::Engine;

use crate::cache::DashboardCache;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<Engine>,
    pub dashboard: Arc<DashboardCache>,
}

impl ApiState {
    pub fn new(engine: Arc<Engine>) -> Self {
        let ttl = Duration::from_secs(engine.config().server.dashboard_ttl_secs);
        Self {
            engine,
            dashboard: Arc::new(DashboardCache::new(ttl)),
        }
    }
}

/// Build the complete router.
pub fn build_router(engine: Arc<Engine>) -> Router {
    let state = ApiState::new(engine);

    let api_routes = Router::new()
        .route("/dashboard", get(handlers::dashboard))
        .route("/chat", post(handlers::chat))
        .route("/eval", post(handlers::eval))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(handlers::health).with_state(state.clone()))
        .route("/metrics", get(handlers::prometheus_metrics).with_state(state))
}
