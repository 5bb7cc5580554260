//! Route persistence
//!
//! Two backends share one read contract: the durable [`SqliteRouteStore`]
//! (system of record for history) and the process-local [`VolatileStore`]
//! (who is online right now). [`FallbackStore`] composes them so callers
//! never branch on backend health themselves.

mod error;
pub mod fallback;
pub mod sqlite;
pub mod types;
pub mod unavailable;
pub mod volatile;

pub use error::{StoreError, StoreResult};
pub use fallback::FallbackStore;
pub use sqlite::SqliteRouteStore;
pub use types::{
    cutoff_for, Backend, CleanOutcome, PurgeReport, RouteFilter, SaveOutcome, Served, StoreStatus,
};
pub use unavailable::UnavailableStore;
pub use volatile::VolatileStore;

use crate::route::{MatchQuery, MatchResult, RouteRecord};
use async_trait::async_trait;
use std::time::Duration;

/// Read operations every route backend answers with the same semantics
#[async_trait]
pub trait RouteReader: Send + Sync {
    /// Routes updated within `filter.since`, newest first, at most `filter.limit`
    async fn query(&self, filter: &RouteFilter) -> StoreResult<Vec<RouteRecord>>;

    /// Routes updated within `since` that match `query`, best match first
    async fn find_matches(&self, query: &MatchQuery, since: Duration)
        -> StoreResult<Vec<MatchResult>>;
}

/// Durable backend interface
#[async_trait]
pub trait PersistentStore: RouteReader {
    /// Upsert keyed by (owner, connection). Updates keep the original creation time.
    async fn save(&self, record: &RouteRecord) -> StoreResult<SaveOutcome>;

    /// Delete routes not updated within `older_than`
    async fn purge_expired(&self, older_than: Duration) -> StoreResult<u64>;

    /// Administrative cleanup of long-expired and malformed rows
    async fn purge_invalid(&self) -> StoreResult<PurgeReport>;

    async fn count(&self) -> StoreResult<u64>;

    async fn health_check(&self) -> StoreResult<()>;
}
