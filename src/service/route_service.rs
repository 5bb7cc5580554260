use crate::metrics;
use crate::relay::{
    ActivePeers, BroadcastEngine, ConnectionRegistry, PeerSender, ServerEvent,
};
use crate::route::{timestamp_now, validate, ConnectionId, MatchQuery, MatchResult, RouteRecord};
use crate::service::error::{ServiceError, ServiceResult};
use crate::store::{
    CleanOutcome, FallbackStore, PersistentStore, RouteFilter, Served, StoreResult, StoreStatus,
    VolatileStore,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(60 * 60);

/// Tunables for [`RouteService`]
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Routes older than this are purged and excluded from matching
    pub route_expiry: Duration,
    /// Upper bound for any listing
    pub max_routes_per_request: usize,
    /// Connections attached for longer than this are swept
    pub client_timeout: Duration,
    pub admin_secret: String,
    /// Size of the snapshot sent to a newly connected peer
    pub existing_routes_limit: usize,
    pub existing_routes_window: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            route_expiry: 24 * HOUR,
            max_routes_per_request: 1000,
            client_timeout: 24 * HOUR,
            admin_secret: "admin-secret-key".to_string(),
            existing_routes_limit: 100,
            existing_routes_window: 24 * HOUR,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub store_status: String,
    pub fallback_mode_active: bool,
    #[serde(flatten)]
    pub peers: ActivePeers,
}

/// Outcome of one expiry sweep. Each sub-task reports independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub finished_at: DateTime<Utc>,
    pub expired_routes: Result<u64, String>,
    pub stale_connections: usize,
}

/// Sole entry point for the transport layer.
///
/// Publishes flow validate -> registry -> durable save (best-effort) ->
/// fanout to everyone but the publisher. Reads go through the
/// [`FallbackStore`] so a failing database degrades to in-memory answers.
pub struct RouteService {
    registry: ConnectionRegistry,
    broadcast: Arc<BroadcastEngine>,
    store: FallbackStore,
    settings: ServiceSettings,
}

impl RouteService {
    pub fn new(durable: Arc<dyn PersistentStore>, settings: ServiceSettings) -> Self {
        let volatile = Arc::new(VolatileStore::new());
        let broadcast = Arc::new(BroadcastEngine::new());

        Self {
            registry: ConnectionRegistry::new(volatile.clone(), broadcast.clone()),
            broadcast,
            store: FallbackStore::new(durable, volatile),
            settings,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn broadcast(&self) -> &BroadcastEngine {
        &self.broadcast
    }

    /// Attach a new peer and send it the recent-routes snapshot
    pub async fn connect(&self, sender: PeerSender) -> ConnectionId {
        let connection_id = uuid::Uuid::new_v4().to_string();
        self.registry.on_connect(&connection_id, sender);

        let filter = RouteFilter::recent(
            self.settings.existing_routes_window,
            self.settings.existing_routes_limit,
        );
        match self.store.query(&filter).await {
            Ok(served) => {
                self.broadcast.unicast(
                    &ServerEvent::ExistingRoutes {
                        routes: served.value,
                    },
                    &connection_id,
                );
            }
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, error = %e, "Could not load existing routes");
            }
        }

        connection_id
    }

    pub fn disconnect(&self, connection_id: &str) -> bool {
        self.registry.on_disconnect(connection_id)
    }

    /// Validate and relay a route published by `connection_id`
    pub async fn publish(
        &self,
        connection_id: &str,
        raw: serde_json::Value,
    ) -> ServiceResult<RouteRecord> {
        let draft = validate(raw).map_err(|e| {
            tracing::warn!(connection_id = %connection_id, error = %e, "Rejected route");
            metrics::record_route_rejected(rejection_reason(&e));
            ServiceError::from(e)
        })?;
        let record = draft.into_record(connection_id, timestamp_now());

        self.registry.publish_route(connection_id, record.clone())?;
        self.store.save(&record).await;

        // Swept while the save was in flight; peers already saw user-disconnected
        if !self.registry.is_connected(connection_id) {
            tracing::info!(connection_id = %connection_id, "Connection gone before fanout, dropping route update");
            return Ok(record);
        }

        let delivered = self.broadcast.fanout(
            &ServerEvent::RouteUpdate {
                data: record.clone(),
            },
            Some(connection_id),
        );
        metrics::record_route_published();
        tracing::info!(
            connection_id = %connection_id,
            owner = %record.owner_user_id,
            delivered,
            "Broadcasting new route"
        );

        Ok(record)
    }

    pub async fn find_matches(&self, query: &MatchQuery) -> StoreResult<Served<Vec<MatchResult>>> {
        self.store.find_matches(query, self.settings.route_expiry).await
    }

    /// Recent routes, newest first. `limit` is clamped to the configured maximum.
    pub async fn list_routes(
        &self,
        owner_user_id: Option<String>,
        limit: usize,
        since: Duration,
    ) -> StoreResult<Served<Vec<RouteRecord>>> {
        let mut filter = RouteFilter::recent(since, limit.min(self.settings.max_routes_per_request));
        filter.owner_user_id = owner_user_id;
        self.store.query(&filter).await
    }

    pub fn active_peers(&self) -> ActivePeers {
        self.registry.active_peers()
    }

    pub async fn health(&self) -> HealthReport {
        let store_status = self.store.status().await;
        if let StoreStatus::Error(message) = &store_status {
            tracing::warn!(error = %message, "Database health check failed");
        }

        HealthReport {
            status: "healthy",
            timestamp: timestamp_now(),
            fallback_mode_active: !store_status.is_connected(),
            store_status: store_status.to_string(),
            peers: self.active_peers(),
        }
    }

    /// Administrative cleanup. A wrong secret changes nothing.
    pub async fn admin_clean(&self, secret: &str) -> ServiceResult<CleanOutcome> {
        if secret != self.settings.admin_secret {
            tracing::warn!("Rejected admin clean with invalid secret");
            return Err(ServiceError::Unauthorized);
        }

        let outcome = self.store.clean().await;
        match &outcome {
            CleanOutcome::Durable(report) => {
                tracing::info!(
                    expired_removed = report.expired_removed,
                    invalid_removed = report.invalid_removed,
                    new_count = report.new_count,
                    "Cleaned route storage"
                );
            }
            CleanOutcome::Degraded { .. } => {
                // The fallback store already cleared the routes; histories go too
                self.registry.clear_routes();
            }
        }
        Ok(outcome)
    }

    /// One expiry pass: purge expired durable routes, then stale connections.
    pub async fn sweep(&self) -> SweepReport {
        let expired_routes = match self.store.purge_expired(self.settings.route_expiry).await {
            Ok(removed) => {
                metrics::record_sweep_removed("durable", removed);
                Ok(removed)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Expired route purge failed");
                Err(e.to_string())
            }
        };

        let stale_connections = self.registry.purge_stale(self.settings.client_timeout);
        metrics::record_sweep_removed("volatile", stale_connections as u64);

        SweepReport {
            finished_at: timestamp_now(),
            expired_routes,
            stale_connections,
        }
    }

    /// Tell every peer the relay is going away
    pub fn shutdown_notice(&self) -> usize {
        self.broadcast.fanout(
            &ServerEvent::ServerShutdown {
                message: "Server is shutting down".to_string(),
            },
            None,
        )
    }
}

fn rejection_reason(error: &crate::route::ValidationError) -> &'static str {
    use crate::route::ValidationError;
    match error {
        ValidationError::NotAnObject => "not_an_object",
        ValidationError::MissingField(_) => "missing_field",
        ValidationError::InvalidField { .. } => "invalid_field",
    }
}
