use crate::route::{ConnectionId, MatchQuery, MatchResult, MatchingEngine, RouteRecord};
use crate::store::error::StoreResult;
use crate::store::types::{cutoff_for, RouteFilter, SaveOutcome};
use crate::store::RouteReader;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::time::Duration;

/// In-memory routes, one per live connection.
///
/// Mirrors every accepted publish and serves reads whenever the durable
/// store is unreachable. Contents do not survive a restart.
#[derive(Default)]
pub struct VolatileStore {
    routes: DashMap<ConnectionId, RouteRecord>,
}

impl VolatileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the route held for `record.connection_id`.
    ///
    /// A republish by the same owner keeps the original creation time.
    pub fn upsert(&self, record: RouteRecord) -> SaveOutcome {
        match self.routes.entry(record.connection_id.clone()) {
            Entry::Occupied(mut entry) => {
                let current = entry.get_mut();
                if current.owner_user_id == record.owner_user_id {
                    current.replace_with(record);
                } else {
                    *current = record;
                }
                SaveOutcome::Updated
            }
            Entry::Vacant(entry) => {
                entry.insert(record);
                SaveOutcome::Inserted
            }
        }
    }

    pub fn get(&self, connection_id: &str) -> Option<RouteRecord> {
        self.routes.get(connection_id).map(|r| r.value().clone())
    }

    pub fn remove(&self, connection_id: &str) -> Option<RouteRecord> {
        self.routes.remove(connection_id).map(|(_, record)| record)
    }

    /// Drop every route, returning how many were held
    pub fn clear_all(&self) -> usize {
        let count = self.routes.len();
        self.routes.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// All routes, newest first
    pub fn snapshot(&self) -> Vec<RouteRecord> {
        let mut routes: Vec<RouteRecord> = self.routes.iter().map(|r| r.value().clone()).collect();
        routes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        routes
    }

    pub fn unique_owner_count(&self) -> usize {
        self.routes
            .iter()
            .map(|r| r.value().owner_user_id.clone())
            .collect::<HashSet<_>>()
            .len()
    }
}

#[async_trait]
impl RouteReader for VolatileStore {
    async fn query(&self, filter: &RouteFilter) -> StoreResult<Vec<RouteRecord>> {
        let cutoff = cutoff_for(filter.since);
        let mut routes: Vec<RouteRecord> = self
            .snapshot()
            .into_iter()
            .filter(|r| !r.updated_before(cutoff))
            .filter(|r| match &filter.owner_user_id {
                Some(owner) => &r.owner_user_id == owner,
                None => true,
            })
            .collect();
        routes.truncate(filter.limit);
        Ok(routes)
    }

    async fn find_matches(
        &self,
        query: &MatchQuery,
        since: Duration,
    ) -> StoreResult<Vec<MatchResult>> {
        let cutoff = cutoff_for(since);
        let candidates = self
            .snapshot()
            .into_iter()
            .filter(|r| !r.updated_before(cutoff));
        Ok(MatchingEngine::rank(candidates, query))
    }
}
