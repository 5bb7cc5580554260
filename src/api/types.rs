use crate::relay::ActivePeers;
use crate::route::{MatchResult, RouteRecord};
use crate::store::{Backend, PurgeReport};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct FindMatchesResponse {
    pub message: String,
    pub matches: Vec<MatchResult>,
    pub count: usize,
    pub backend: Backend,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListRoutesQuery {
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
    pub limit: Option<usize>,
    pub hours: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListRoutesResponse {
    pub message: String,
    pub routes: Vec<RouteRecord>,
    pub count: usize,
    pub backend: Backend,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveUsersResponse {
    pub message: String,
    #[serde(flatten)]
    pub peers: ActivePeers,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanRoutesResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: PurgeReport,
    pub total_removed: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DegradedCleanResponse {
    pub message: String,
    pub degraded: bool,
    pub in_memory_routes_cleared: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: String,
}
