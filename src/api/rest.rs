use crate::api::error::{ApiError, ApiResult};
use crate::api::types::*;
use crate::route::validate_match_query;
use crate::service::{HealthReport, RouteService};
use crate::store::CleanOutcome;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_ROUTE_LIMIT: usize = 100;
const DEFAULT_LOOKBACK_HOURS: u64 = 24;

pub struct RestApi {
    service: Arc<RouteService>,
}

impl RestApi {
    pub fn new(service: Arc<RouteService>) -> Self {
        Self { service }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/find-matching-routes", post(find_matching_routes))
            .route("/routes", get(list_routes))
            .route("/active-users", get(active_users))
            .route("/clean-routes", post(clean_routes))
            .with_state(self.service.clone())
    }
}

async fn health_check(State(service): State<Arc<RouteService>>) -> Json<HealthReport> {
    Json(service.health().await)
}

async fn find_matching_routes(
    State(service): State<Arc<RouteService>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> ApiResult<Json<FindMatchesResponse>> {
    let Json(body) = body.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let query = validate_match_query(&body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

    let served = service.find_matches(&query).await?;
    let count = served.value.len();

    Ok(Json(FindMatchesResponse {
        message: if count > 0 {
            "Matching routes found".to_string()
        } else {
            "No matching routes found".to_string()
        },
        matches: served.value,
        count,
        backend: served.backend,
    }))
}

async fn list_routes(
    State(service): State<Arc<RouteService>>,
    params: Result<Query<ListRoutesQuery>, QueryRejection>,
) -> ApiResult<Json<ListRoutesResponse>> {
    let Query(params) = params.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let limit = params.limit.unwrap_or(DEFAULT_ROUTE_LIMIT);
    let hours = params.hours.unwrap_or(DEFAULT_LOOKBACK_HOURS);
    let since = Duration::from_secs(hours.saturating_mul(60 * 60));

    let served = service.list_routes(params.user_id, limit, since).await?;
    let count = served.value.len();

    Ok(Json(ListRoutesResponse {
        message: "Routes retrieved successfully".to_string(),
        routes: served.value,
        count,
        backend: served.backend,
    }))
}

async fn active_users(State(service): State<Arc<RouteService>>) -> Json<ActiveUsersResponse> {
    Json(ActiveUsersResponse {
        message: "Active users retrieved successfully".to_string(),
        peers: service.active_peers(),
    })
}

async fn clean_routes(
    State(service): State<Arc<RouteService>>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let secret = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v))
        .unwrap_or_default();

    let response = match service.admin_clean(secret).await? {
        CleanOutcome::Durable(report) => Json(CleanRoutesResponse {
            message: "Routes cleaned successfully".to_string(),
            total_removed: report.total_removed(),
            report,
        })
        .into_response(),
        CleanOutcome::Degraded {
            in_memory_routes_cleared,
        } => Json(DegradedCleanResponse {
            message: "Store unavailable, cleaned in-memory routes only".to_string(),
            degraded: true,
            in_memory_routes_cleared,
        })
        .into_response(),
    };

    Ok(response)
}
