//! Peer relay
//!
//! Tracks attached peers and delivers events to them:
//! - [`ConnectionRegistry`] owns connection lifecycle and route history
//! - [`BroadcastEngine`] owns the outbound mailboxes
//! - [`protocol`] defines the JSON event frames

pub mod broadcast;
pub mod protocol;
pub mod registry;
pub mod types;

pub use broadcast::{BroadcastEngine, PeerSender};
pub use protocol::{ClientEvent, ServerEvent};
pub use registry::ConnectionRegistry;
pub use types::{ActivePeers, ConnectionState};
