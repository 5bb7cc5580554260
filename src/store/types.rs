use crate::route::timestamp_now;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Age after which the administrative cleanup drops routes outright
pub const INVALID_ROUTE_RETENTION: Duration = Duration::from_secs(48 * 60 * 60);

/// Timestamp `age` before now, saturating at the earliest representable time
pub fn cutoff_for(age: Duration) -> DateTime<Utc> {
    let now = timestamp_now();
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFilter {
    pub owner_user_id: Option<String>,
    pub since: Duration,
    pub limit: usize,
}

impl RouteFilter {
    pub fn recent(since: Duration, limit: usize) -> Self {
        Self {
            owner_user_id: None,
            since,
            limit,
        }
    }

    pub fn for_owner(mut self, owner_user_id: impl Into<String>) -> Self {
        self.owner_user_id = Some(owner_user_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub original_count: u64,
    pub new_count: u64,
    pub expired_removed: u64,
    pub invalid_removed: u64,
}

impl PurgeReport {
    pub fn total_removed(&self) -> u64 {
        self.expired_removed + self.invalid_removed
    }
}

/// Result of an administrative clean
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanOutcome {
    /// The durable store was cleaned
    Durable(PurgeReport),
    /// The durable store was unreachable; only in-memory routes were cleared
    Degraded { in_memory_routes_cleared: usize },
}

/// Which backend answered a read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Durable,
    Volatile,
}

/// A read result tagged with the backend that served it
#[derive(Debug, Clone, PartialEq)]
pub struct Served<T> {
    pub value: T,
    pub backend: Backend,
}

impl<T> Served<T> {
    pub fn durable(value: T) -> Self {
        Self {
            value,
            backend: Backend::Durable,
        }
    }

    pub fn volatile(value: T) -> Self {
        Self {
            value,
            backend: Backend::Volatile,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.backend == Backend::Volatile
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreStatus {
    Connected,
    Error(String),
}

impl StoreStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, StoreStatus::Connected)
    }
}

impl std::fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreStatus::Connected => write!(f, "connected"),
            StoreStatus::Error(message) => write!(f, "error: {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutoff_saturates() {
        assert_eq!(cutoff_for(Duration::MAX), DateTime::<Utc>::MIN_UTC);
        assert!(cutoff_for(Duration::from_secs(60)) < timestamp_now());
    }

    #[test]
    fn test_purge_report_total() {
        let report = PurgeReport {
            original_count: 10,
            new_count: 6,
            expired_removed: 3,
            invalid_removed: 1,
        };
        assert_eq!(report.total_removed(), 4);
    }

    #[test]
    fn test_store_status_display() {
        assert_eq!(StoreStatus::Connected.to_string(), "connected");
        assert_eq!(
            StoreStatus::Error("disk gone".into()).to_string(),
            "error: disk gone"
        );
    }
}
