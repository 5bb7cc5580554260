use crate::metrics;
use crate::route::{MatchQuery, MatchResult, RouteRecord};
use crate::store::error::StoreResult;
use crate::store::types::{CleanOutcome, RouteFilter, SaveOutcome, Served, StoreStatus};
use crate::store::volatile::VolatileStore;
use crate::store::{PersistentStore, RouteReader};
use std::sync::Arc;
use std::time::Duration;

/// Durable store with an in-memory fallback for reads.
///
/// Writes go to the durable store on a best-effort basis. Reads try the
/// durable store first and answer from memory when it fails; an empty
/// durable answer is returned as is.
#[derive(Clone)]
pub struct FallbackStore {
    durable: Arc<dyn PersistentStore>,
    volatile: Arc<VolatileStore>,
}

impl FallbackStore {
    pub fn new(durable: Arc<dyn PersistentStore>, volatile: Arc<VolatileStore>) -> Self {
        Self { durable, volatile }
    }

    pub fn volatile(&self) -> &Arc<VolatileStore> {
        &self.volatile
    }

    /// Persist a route. Failures are logged and reported as `None`.
    pub async fn save(&self, record: &RouteRecord) -> Option<SaveOutcome> {
        match self.durable.save(record).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    owner = %record.owner_user_id,
                    connection_id = %record.connection_id,
                    "Durable save failed, route kept in memory only"
                );
                None
            }
        }
    }

    pub async fn query(&self, filter: &RouteFilter) -> StoreResult<Served<Vec<RouteRecord>>> {
        match self.durable.query(filter).await {
            Ok(routes) => Ok(Served::durable(routes)),
            Err(e) => {
                tracing::warn!(error = %e, "Durable query failed, serving from memory");
                metrics::record_store_fallback("query");
                Ok(Served::volatile(self.volatile.query(filter).await?))
            }
        }
    }

    pub async fn find_matches(
        &self,
        query: &MatchQuery,
        since: Duration,
    ) -> StoreResult<Served<Vec<MatchResult>>> {
        match self.durable.find_matches(query, since).await {
            Ok(matches) => Ok(Served::durable(matches)),
            Err(e) => {
                tracing::warn!(error = %e, "Durable match lookup failed, serving from memory");
                metrics::record_store_fallback("find_matches");
                Ok(Served::volatile(self.volatile.find_matches(query, since).await?))
            }
        }
    }

    /// Administrative cleanup. When the durable store fails, every in-memory
    /// route is dropped instead.
    pub async fn clean(&self) -> CleanOutcome {
        match self.durable.purge_invalid().await {
            Ok(report) => CleanOutcome::Durable(report),
            Err(e) => {
                tracing::warn!(error = %e, "Durable cleanup failed, clearing in-memory routes");
                metrics::record_store_fallback("clean");
                CleanOutcome::Degraded {
                    in_memory_routes_cleared: self.volatile.clear_all(),
                }
            }
        }
    }

    pub async fn purge_expired(&self, older_than: Duration) -> StoreResult<u64> {
        self.durable.purge_expired(older_than).await
    }

    pub async fn status(&self) -> StoreStatus {
        match self.durable.health_check().await {
            Ok(()) => StoreStatus::Connected,
            Err(e) => StoreStatus::Error(e.to_string()),
        }
    }
}
