mod error;
mod rest;
mod types;
mod websocket;

pub use error::{ApiError, ApiResult};
pub use rest::RestApi;
pub use types::*;
pub use websocket::websocket_handler;

use crate::metrics::metrics_route;
use crate::service::RouteService;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create a complete API server with REST and WebSocket support
pub fn create_api_server(service: Arc<RouteService>) -> Router {
    let rest_api = RestApi::new(service.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let ws_router = Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(service);

    Router::new()
        .merge(rest_api.router())
        .merge(ws_router)
        .route("/metrics", metrics_route())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
