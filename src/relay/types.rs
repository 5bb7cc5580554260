//! Connection bookkeeping types

use crate::route::{ConnectionId, RouteRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Live state of one attached peer
#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub connection_id: ConnectionId,
    pub connected_at: DateTime<Utc>,
    /// Every route accepted from this connection, oldest first
    pub routes_published: Vec<RouteRecord>,
}

impl ConnectionState {
    pub fn new(connection_id: impl Into<ConnectionId>, connected_at: DateTime<Utc>) -> Self {
        Self {
            connection_id: connection_id.into(),
            connected_at,
            routes_published: Vec::new(),
        }
    }

    pub fn connected_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.connected_at < cutoff
    }
}

/// Snapshot of who is online right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePeers {
    pub connected_count: usize,
    pub active_route_count: usize,
    pub unique_owner_count: usize,
    #[serde(rename = "connectionIDs")]
    pub connection_ids: Vec<ConnectionId>,
}
