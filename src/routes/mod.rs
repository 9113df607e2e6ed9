// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tower_http::cors::{Any, CorsLayer};

use crate::inventory::Inventory;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) inventory: Arc<Inventory>,
    pub(crate) ws_event_connections: Arc<AtomicUsize>,
}

pub fn app(inventory: Arc<Inventory>, ws_event_connections: Arc<AtomicUsize>) -> Router {
    let state = AppState {
        inventory,
        ws_event_connections,
    };
    Router::new()
        .route("/", get(http::root_handler)) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route(
            "/api/operations",
            get(http::operations_handler).post(http::execute_handler),
        ) // GET, POST /api/operations
        .route("/api/{kind}", get(http::list_handler)) // GET /api/{kind}
        .route("/api/{kind}/refresh", post(http::refresh_handler)) // POST /api/{kind}/refresh
        .route("/api/{kind}/tree", get(http::tree_handler)) // GET /api/{kind}/tree
        .route("/ws/events", get(ws::ws_events)) // WS /ws/events
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
