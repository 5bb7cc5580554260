use crate::metrics;
use crate::relay::protocol::ServerEvent;
use crate::route::ConnectionId;
use dashmap::DashMap;
use tokio::sync::mpsc;

/// Outbound mailbox of one peer. Its WebSocket writer task drains it.
pub type PeerSender = mpsc::UnboundedSender<String>;

/// Delivers server events to attached peers.
///
/// Events are serialized once per send and the encoded frame is cloned per
/// recipient. A peer whose mailbox is closed is skipped silently.
#[derive(Default)]
pub struct BroadcastEngine {
    peers: DashMap<ConnectionId, PeerSender>,
}

impl BroadcastEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, connection_id: impl Into<ConnectionId>, sender: PeerSender) {
        self.peers.insert(connection_id.into(), sender);
        metrics::set_connected_peers(self.peers.len());
    }

    pub fn detach(&self, connection_id: &str) -> bool {
        let removed = self.peers.remove(connection_id).is_some();
        metrics::set_connected_peers(self.peers.len());
        removed
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn is_attached(&self, connection_id: &str) -> bool {
        self.peers.contains_key(connection_id)
    }

    /// Send `event` to every attached peer except `exclude`.
    /// Returns how many mailboxes accepted the frame.
    pub fn fanout(&self, event: &ServerEvent, exclude: Option<&str>) -> usize {
        let Some(frame) = encode(event) else {
            return 0;
        };

        let mut delivered = 0;
        for peer in self.peers.iter() {
            if exclude == Some(peer.key().as_str()) {
                continue;
            }
            if peer.value().send(frame.clone()).is_ok() {
                delivered += 1;
            }
        }

        tracing::debug!(event = event.name(), delivered, "Fanned out event");
        metrics::record_events_delivered(event.name(), delivered);
        delivered
    }

    /// Send `event` to a single peer. Absent or closed peers are a no-op.
    pub fn unicast(&self, event: &ServerEvent, connection_id: &str) -> bool {
        let Some(peer) = self.peers.get(connection_id) else {
            return false;
        };
        let Some(frame) = encode(event) else {
            return false;
        };

        let delivered = peer.value().send(frame).is_ok();
        if delivered {
            metrics::record_events_delivered(event.name(), 1);
        }
        delivered
    }
}

fn encode(event: &ServerEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!(event = event.name(), error = %e, "Failed to encode event");
            None
        }
    }
}
