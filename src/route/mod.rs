//! Route model, validation and matching
//!
//! A route is the travel path one peer publishes from one connection:
//! endpoints, the ordered path between them, optional via points and any
//! extra fields the client attached.

mod error;
pub mod matching;
pub mod types;
pub mod validation;

pub use error::{ValidationError, ValidationResult};
pub use matching::MatchingEngine;
pub use types::{
    timestamp_now, ConnectionId, MatchQuery, MatchResult, MatchType, Point, RouteDraft,
    RouteRecord,
};
pub use validation::{parse_point, validate, validate_match_query};
