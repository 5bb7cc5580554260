use crate::relay::broadcast::{BroadcastEngine, PeerSender};
use crate::relay::protocol::ServerEvent;
use crate::relay::types::{ActivePeers, ConnectionState};
use crate::route::{timestamp_now, ConnectionId, RouteRecord};
use crate::service::ServiceError;
use crate::store::{cutoff_for, VolatileStore};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Peer lifecycle and per-peer route history.
///
/// A connection goes `Connected -> Disconnected` exactly once; a reconnect
/// gets a fresh id. Each connection owns at most one entry in the
/// [`VolatileStore`], removed together with the connection.
pub struct ConnectionRegistry {
    states: DashMap<ConnectionId, ConnectionState>,
    volatile: Arc<VolatileStore>,
    broadcast: Arc<BroadcastEngine>,
}

impl ConnectionRegistry {
    pub fn new(volatile: Arc<VolatileStore>, broadcast: Arc<BroadcastEngine>) -> Self {
        Self {
            states: DashMap::new(),
            volatile,
            broadcast,
        }
    }

    pub fn on_connect(&self, connection_id: &str, sender: PeerSender) {
        self.states.insert(
            connection_id.to_string(),
            ConnectionState::new(connection_id, timestamp_now()),
        );
        self.broadcast.attach(connection_id, sender);

        tracing::info!(connection_id = %connection_id, peers = self.states.len(), "Peer connected");
        self.broadcast
            .fanout(&ServerEvent::ClientCount(self.states.len()), None);
    }

    /// Tear down a connection. Returns whether it had an active route.
    pub fn on_disconnect(&self, connection_id: &str) -> bool {
        // Already swept as stale; that sweep announced the new count
        let Some(had_route) = self.evict(connection_id) else {
            return false;
        };

        tracing::info!(
            connection_id = %connection_id,
            had_route,
            peers = self.states.len(),
            "Peer disconnected"
        );
        self.broadcast
            .fanout(&ServerEvent::ClientCount(self.states.len()), None);
        had_route
    }

    /// Record a route accepted from `connection_id` and make it the
    /// connection's active route.
    pub fn publish_route(&self, connection_id: &str, record: RouteRecord) -> Result<(), ServiceError> {
        // The state guard is held across the upsert so a concurrent
        // disconnect cannot leave an orphaned in-memory route behind.
        let mut state = self
            .states
            .get_mut(connection_id)
            .ok_or_else(|| ServiceError::ConnectionClosed(connection_id.to_string()))?;

        state.routes_published.push(record.clone());
        self.volatile.upsert(record);
        crate::metrics::set_active_routes(self.volatile.len());
        Ok(())
    }

    /// Remove connections attached for longer than `max_age`, together with
    /// their routes and mailboxes. Returns how many were removed.
    pub fn purge_stale(&self, max_age: Duration) -> usize {
        let cutoff = cutoff_for(max_age);
        let stale: Vec<ConnectionId> = self
            .states
            .iter()
            .filter(|s| s.value().connected_before(cutoff))
            .map(|s| s.key().clone())
            .collect();

        let removed = stale
            .iter()
            .filter(|id| self.evict(id).is_some())
            .count();

        if removed > 0 {
            tracing::info!(removed, "Purged stale connections");
            self.broadcast
                .fanout(&ServerEvent::ClientCount(self.states.len()), None);
        }
        removed
    }

    /// Drop every in-memory route and every connection's history.
    /// Connections stay attached.
    pub fn clear_routes(&self) -> usize {
        for mut state in self.states.iter_mut() {
            state.routes_published.clear();
        }
        let cleared = self.volatile.clear_all();
        crate::metrics::set_active_routes(0);
        cleared
    }

    pub fn history(&self, connection_id: &str) -> Option<Vec<RouteRecord>> {
        self.states
            .get(connection_id)
            .map(|s| s.routes_published.clone())
    }

    pub fn is_connected(&self, connection_id: &str) -> bool {
        self.states.contains_key(connection_id)
    }

    pub fn active_peers(&self) -> ActivePeers {
        let mut connection_ids: Vec<ConnectionId> =
            self.states.iter().map(|s| s.key().clone()).collect();
        connection_ids.sort();

        ActivePeers {
            connected_count: connection_ids.len(),
            active_route_count: self.volatile.len(),
            unique_owner_count: self.volatile.unique_owner_count(),
            connection_ids,
        }
    }

    /// Remove a connection and its route. `None` if it was already gone.
    fn evict(&self, connection_id: &str) -> Option<bool> {
        self.broadcast.detach(connection_id);
        self.states.remove(connection_id)?;

        let had_route = self.volatile.remove(connection_id).is_some();
        if had_route {
            crate::metrics::set_active_routes(self.volatile.len());
            self.broadcast.fanout(
                &ServerEvent::UserDisconnected {
                    connection_id: connection_id.to_string(),
                },
                None,
            );
        }
        Some(had_route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{Point, RouteDraft};
    use serde_json::{json, Map, Value};
    use tokio::sync::mpsc;

    fn registry() -> ConnectionRegistry {
        ConnectionRegistry::new(
            Arc::new(VolatileStore::new()),
            Arc::new(BroadcastEngine::new()),
        )
    }

    fn record(owner: &str, conn: &str) -> RouteRecord {
        RouteDraft {
            owner_user_id: owner.to_string(),
            source: Point(0.0, 0.0),
            destination: Point(1.0, 1.0),
            path: vec![Point(0.0, 0.0), Point(1.0, 1.0)],
            via: Vec::new(),
            extra: Map::new(),
        }
        .into_record(conn, timestamp_now())
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        frames
    }

    #[test]
    fn test_connect_broadcasts_count() {
        let registry = registry();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        registry.on_connect("a", tx_a);
        registry.on_connect("b", tx_b);

        assert_eq!(
            drain(&mut rx_a),
            vec![
                json!({"event": "clientCount", "data": 1}),
                json!({"event": "clientCount", "data": 2}),
            ]
        );
        assert_eq!(drain(&mut rx_b), vec![json!({"event": "clientCount", "data": 2})]);
    }

    #[test]
    fn test_disconnect_with_route_notifies_others() {
        let registry = registry();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.on_connect("a", tx_a);
        registry.on_connect("b", tx_b);
        registry.publish_route("a", record("alice", "a")).unwrap();
        drain(&mut rx_b);

        assert!(registry.on_disconnect("a"));
        assert_eq!(
            drain(&mut rx_b),
            vec![
                json!({"event": "user-disconnected", "data": {"connectionID": "a"}}),
                json!({"event": "clientCount", "data": 1}),
            ]
        );
        assert_eq!(registry.active_peers().active_route_count, 0);
    }

    #[test]
    fn test_disconnect_without_route_only_updates_count() {
        let registry = registry();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.on_connect("a", tx_a);
        registry.on_connect("b", tx_b);
        drain(&mut rx_b);

        assert!(!registry.on_disconnect("a"));
        assert_eq!(drain(&mut rx_b), vec![json!({"event": "clientCount", "data": 1})]);
    }

    #[test]
    fn test_publish_after_disconnect_is_rejected() {
        let registry = registry();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.on_connect("a", tx);
        registry.on_disconnect("a");

        assert_eq!(
            registry.publish_route("a", record("alice", "a")),
            Err(ServiceError::ConnectionClosed("a".to_string()))
        );
        assert_eq!(registry.active_peers().active_route_count, 0);
    }

    #[test]
    fn test_history_accumulates_and_active_route_replaced() {
        let registry = registry();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.on_connect("a", tx);

        registry.publish_route("a", record("alice", "a")).unwrap();
        registry.publish_route("a", record("alice", "a")).unwrap();

        assert_eq!(registry.history("a").unwrap().len(), 2);
        let peers = registry.active_peers();
        assert_eq!(peers.active_route_count, 1);
        assert_eq!(peers.unique_owner_count, 1);
        assert_eq!(peers.connection_ids, vec!["a".to_string()]);
    }

    #[test]
    fn test_purge_stale() {
        let registry = registry();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        registry.on_connect("old", tx_a);
        registry.on_connect("new", tx_b);
        registry.publish_route("old", record("alice", "old")).unwrap();

        registry
            .states
            .get_mut("old")
            .unwrap()
            .connected_at = timestamp_now() - chrono::Duration::hours(25);

        assert_eq!(registry.purge_stale(Duration::from_secs(24 * 3600)), 1);
        assert!(!registry.is_connected("old"));
        assert!(registry.is_connected("new"));
        assert_eq!(registry.active_peers().active_route_count, 0);
        assert_eq!(registry.purge_stale(Duration::from_secs(24 * 3600)), 0);
    }

    #[test]
    fn test_disconnect_after_stale_purge_is_silent() {
        let registry = registry();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.on_connect("a", tx_a);
        registry.on_connect("b", tx_b);
        registry.states.get_mut("a").unwrap().connected_at =
            timestamp_now() - chrono::Duration::hours(25);

        registry.purge_stale(Duration::from_secs(24 * 3600));
        drain(&mut rx_b);

        assert!(!registry.on_disconnect("a"));
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn test_clear_routes() {
        let registry = registry();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.on_connect("a", tx);
        registry.publish_route("a", record("alice", "a")).unwrap();

        assert_eq!(registry.clear_routes(), 1);
        assert!(registry.history("a").unwrap().is_empty());
        assert!(registry.is_connected("a"));
    }
}
