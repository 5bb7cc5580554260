use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of one live duplex session between a peer and the relay
pub type ConnectionId = String;

/// Current time truncated to millisecond precision.
///
/// The durable store keeps timestamps as epoch milliseconds, so every record
/// is stamped at that precision to compare equal after a round trip.
pub fn timestamp_now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// A `(lat, lng)` pair, serialized as a two-element JSON array
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point(pub f64, pub f64);

impl Point {
    pub fn lat(&self) -> f64 {
        self.0
    }

    pub fn lng(&self) -> f64 {
        self.1
    }
}

/// The latest route published by one owner from one connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    #[serde(rename = "ownerUserID", alias = "userID")]
    pub owner_user_id: String,

    #[serde(rename = "connectionID")]
    pub connection_id: ConnectionId,

    pub source: Point,
    pub destination: Point,
    pub path: Vec<Point>,

    #[serde(default)]
    pub via: Vec<Point>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Client fields the relay does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RouteRecord {
    /// Whether the record was last touched before `cutoff`
    pub fn updated_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.updated_at < cutoff
    }

    /// Replace this record's content with `newer`, keeping the creation time
    pub fn replace_with(&mut self, newer: RouteRecord) {
        let created_at = self.created_at;
        *self = newer;
        self.created_at = created_at;
    }
}

/// A validated publish payload that has not been bound to a connection yet
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDraft {
    pub owner_user_id: String,
    pub source: Point,
    pub destination: Point,
    pub path: Vec<Point>,
    pub via: Vec<Point>,
    pub extra: Map<String, Value>,
}

impl RouteDraft {
    /// Bind the draft to its owning connection, stamping both timestamps with `now`
    pub fn into_record(self, connection_id: impl Into<ConnectionId>, now: DateTime<Utc>) -> RouteRecord {
        RouteRecord {
            owner_user_id: self.owner_user_id,
            connection_id: connection_id.into(),
            source: self.source,
            destination: self.destination,
            path: self.path,
            via: self.via,
            created_at: now,
            updated_at: now,
            extra: self.extra,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactPath,
    SameEndpoints,
}

impl MatchType {
    pub fn score(&self) -> u8 {
        match self {
            MatchType::ExactPath => 100,
            MatchType::SameEndpoints => 80,
        }
    }
}

/// A stored route annotated with how it matched a query. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    #[serde(flatten)]
    pub route: RouteRecord,
    pub match_type: MatchType,
    pub match_score: u8,
}

impl MatchResult {
    pub fn new(route: RouteRecord, match_type: MatchType) -> Self {
        Self {
            route,
            match_type,
            match_score: match_type.score(),
        }
    }
}

/// What a peer is looking for when asking for matching routes
#[derive(Debug, Clone, PartialEq)]
pub struct MatchQuery {
    pub owner_user_id: String,
    pub source: Option<Point>,
    pub destination: Option<Point>,
    pub path: Option<Vec<Point>>,
}

impl MatchQuery {
    pub fn new(owner_user_id: impl Into<String>) -> Self {
        Self {
            owner_user_id: owner_user_id.into(),
            source: None,
            destination: None,
            path: None,
        }
    }

    pub fn with_path(mut self, path: Vec<Point>) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_endpoints(mut self, source: Point, destination: Point) -> Self {
        self.source = Some(source);
        self.destination = Some(destination);
        self
    }
}
