use crate::route::{MatchQuery, MatchResult, RouteRecord};
use crate::store::error::{StoreError, StoreResult};
use crate::store::types::{PurgeReport, RouteFilter, SaveOutcome};
use crate::store::{PersistentStore, RouteReader};
use async_trait::async_trait;
use std::time::Duration;

/// Stand-in used when the durable store could not be opened at startup.
/// Every call fails, which keeps the relay in fallback mode.
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> StoreResult<T> {
        Err(StoreError::Unavailable(self.reason.clone()))
    }
}

#[async_trait]
impl RouteReader for UnavailableStore {
    async fn query(&self, _filter: &RouteFilter) -> StoreResult<Vec<RouteRecord>> {
        self.fail()
    }

    async fn find_matches(
        &self,
        _query: &MatchQuery,
        _since: Duration,
    ) -> StoreResult<Vec<MatchResult>> {
        self.fail()
    }
}

#[async_trait]
impl PersistentStore for UnavailableStore {
    async fn save(&self, _record: &RouteRecord) -> StoreResult<SaveOutcome> {
        self.fail()
    }

    async fn purge_expired(&self, _older_than: Duration) -> StoreResult<u64> {
        self.fail()
    }

    async fn purge_invalid(&self) -> StoreResult<PurgeReport> {
        self.fail()
    }

    async fn count(&self) -> StoreResult<u64> {
        self.fail()
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.fail()
    }
}
