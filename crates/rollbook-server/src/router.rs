use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with every rollbook endpoint.
pub fn build_router(state: AppState) -> Router {
    let ledger_routes = Router::new()
        .route("/verify", get(handler::verify_ledger_handler))
        .route("/chain", get(handler::chain_handler))
        .route("/stats", get(handler::stats_handler))
        .route("/blocks/:kind", get(handler::blocks_by_kind_handler))
        .route("/block/:hash", get(handler::block_by_hash_handler))
        .route("/records/verify", post(handler::verify_record_handler));

    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/v1/events", post(handler::record_event_handler))
        .nest("/v1/ledger", ledger_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
