use acctwatch_core::{LedgerSnapshot, ProgressSnapshot, StateHandle};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn ledger(State(state): State<StateHandle>) -> Json<LedgerSnapshot> {
    Json(state.ledger_snapshot())
}

async fn progress(State(state): State<StateHandle>) -> Json<ProgressSnapshot> {
    Json(state.snapshot())
}

pub fn router(state: StateHandle) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ledger", get(ledger))
        .route("/progress", get(progress))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
