//! Operational HTTP surface: `GET /healthz`, `GET /readyz`, `GET /metrics`. The
//! dispatcher's own dashboard/API is out of scope; this exists so an operator can
//! probe liveness and scrape Prometheus-text counters.

use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tower_http::cors;

/// In-process counters surfaced at `/metrics`. Updated by dispatcher workers as
/// signals move through the pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    pub signals_dispatched: AtomicU64,
    pub signals_completed: AtomicU64,
    pub signals_rejected: AtomicU64,
    pub signals_failed: AtomicU64,
    pub steps_executed: AtomicU64,
    pub steps_failed: AtomicU64,
    pub gas_gate_wait_depth: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn render(&self) -> String {
        let counter = |name: &str, value: u64| format!("# TYPE {name} counter\n{name} {value}\n");
        let gauge = |name: &str, value: u64| format!("# TYPE {name} gauge\n{name} {value}\n");
        [
            counter("orchestrator_signals_dispatched_total", self.signals_dispatched.load(Ordering::Relaxed)),
            counter("orchestrator_signals_completed_total", self.signals_completed.load(Ordering::Relaxed)),
            counter("orchestrator_signals_rejected_total", self.signals_rejected.load(Ordering::Relaxed)),
            counter("orchestrator_signals_failed_total", self.signals_failed.load(Ordering::Relaxed)),
            counter("orchestrator_steps_executed_total", self.steps_executed.load(Ordering::Relaxed)),
            counter("orchestrator_steps_failed_total", self.steps_failed.load(Ordering::Relaxed)),
            gauge("orchestrator_gas_gate_wait_depth", self.gas_gate_wait_depth.load(Ordering::Relaxed)),
        ]
        .concat()
    }
}

/// Flips to `true` once every configured chain worker has started. `/readyz` reports
/// `503` until then so a load balancer (or k8s) won't route traffic to a half-started
/// instance.
pub type Readiness = Arc<AtomicBool>;

#[derive(Clone)]
struct AppState {
    metrics: Arc<Metrics>,
    ready: Readiness,
}

pub fn routes(metrics: Arc<Metrics>, ready: Readiness) -> Router {
    let state = AppState { metrics, ready };
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET])
                .allow_headers(cors::Any),
        )
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.render()
}
