//! Route service
//!
//! [`RouteService`] is the only entry point the transport layer talks to.
//! [`EventDispatcher`] turns inbound event frames into service calls and
//! [`ExpiryScheduler`] runs the periodic sweep.

pub mod dispatcher;
mod error;
pub mod expiry;
pub mod route_service;

pub use dispatcher::EventDispatcher;
pub use error::{ServiceError, ServiceResult};
pub use expiry::ExpiryScheduler;
pub use route_service::{HealthReport, RouteService, ServiceSettings, SweepReport};
