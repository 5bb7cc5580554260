use crate::relay::{ClientEvent, ServerEvent};
use crate::service::error::ServiceError;
use crate::service::route_service::RouteService;
use std::sync::Arc;

/// Routes inbound event frames to the service.
///
/// Replies (`pong`, `error`) go to the originating peer only.
#[derive(Clone)]
pub struct EventDispatcher {
    service: Arc<RouteService>,
}

impl EventDispatcher {
    pub fn new(service: Arc<RouteService>) -> Self {
        Self { service }
    }

    pub async fn dispatch(&self, connection_id: &str, frame: &str) {
        let event = match ClientEvent::decode(frame) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, error = %e, "Failed to decode event frame");
                self.reply(connection_id, ServerEvent::error(format!("Invalid event: {}", e)));
                return;
            }
        };

        match event {
            ClientEvent::Message(raw) => match self.service.publish(connection_id, raw).await {
                Ok(_) => {}
                Err(ServiceError::ConnectionClosed(_)) => {
                    tracing::debug!(connection_id = %connection_id, "Dropped publish from closed connection");
                }
                Err(e) => self.reply(connection_id, ServerEvent::error(e.to_string())),
            },
            ClientEvent::Ping => self.reply(connection_id, ServerEvent::Pong),
        }
    }

    fn reply(&self, connection_id: &str, event: ServerEvent) {
        self.service.broadcast().unicast(&event, connection_id);
    }
}
