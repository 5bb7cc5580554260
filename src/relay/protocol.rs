//! Event channel wire format
//!
//! Every frame is a JSON text message `{"event": <name>, "data": <payload>}`.

use crate::route::{ConnectionId, RouteRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events the relay sends to peers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Snapshot sent once to a newly connected peer
    #[serde(rename = "existing-routes")]
    ExistingRoutes { routes: Vec<RouteRecord> },

    /// Number of connected peers after a connect or disconnect
    #[serde(rename = "clientCount")]
    ClientCount(usize),

    #[serde(rename = "route-update")]
    RouteUpdate { data: RouteRecord },

    #[serde(rename = "user-disconnected")]
    UserDisconnected {
        #[serde(rename = "connectionID")]
        connection_id: ConnectionId,
    },

    /// Sent only to the peer whose frame caused it
    #[serde(rename = "error")]
    Error { message: String },

    #[serde(rename = "pong")]
    Pong,

    #[serde(rename = "server-shutdown")]
    ServerShutdown { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    /// Wire name, used as a metrics label
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ExistingRoutes { .. } => "existing-routes",
            ServerEvent::ClientCount(_) => "clientCount",
            ServerEvent::RouteUpdate { .. } => "route-update",
            ServerEvent::UserDisconnected { .. } => "user-disconnected",
            ServerEvent::Error { .. } => "error",
            ServerEvent::Pong => "pong",
            ServerEvent::ServerShutdown { .. } => "server-shutdown",
        }
    }
}

/// Events peers send to the relay
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Publish a route. The payload is validated by the service.
    #[serde(rename = "message")]
    Message(Value),

    #[serde(rename = "ping")]
    Ping,
}

impl ClientEvent {
    pub fn decode(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_event_frames() {
        let frame = serde_json::to_value(ServerEvent::ClientCount(3)).unwrap();
        assert_eq!(frame, json!({"event": "clientCount", "data": 3}));

        let frame = serde_json::to_value(ServerEvent::UserDisconnected {
            connection_id: "c1".to_string(),
        })
        .unwrap();
        assert_eq!(
            frame,
            json!({"event": "user-disconnected", "data": {"connectionID": "c1"}})
        );

        let frame = serde_json::to_value(ServerEvent::error("bad")).unwrap();
        assert_eq!(frame, json!({"event": "error", "data": {"message": "bad"}}));

        let frame = serde_json::to_value(ServerEvent::Pong).unwrap();
        assert_eq!(frame, json!({"event": "pong"}));
    }

    #[test]
    fn test_client_event_decode() {
        let event = ClientEvent::decode(r#"{"event":"message","data":{"userID":"a"}}"#).unwrap();
        assert_eq!(event, ClientEvent::Message(json!({"userID": "a"})));

        assert_eq!(
            ClientEvent::decode(r#"{"event":"ping"}"#).unwrap(),
            ClientEvent::Ping
        );
        assert!(ClientEvent::decode(r#"{"event":"teleport","data":{}}"#).is_err());
        assert!(ClientEvent::decode("not json").is_err());
    }
}
