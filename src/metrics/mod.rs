//! Metrics and observability module
//!
//! Prometheus-compatible metrics for the relay:
//! - Routes published and rejected
//! - Events delivered to peers
//! - Store fallbacks and sweep removals
//! - Connected peers and active routes

pub mod exporter;
pub mod recorder;

pub use exporter::{install_recorder, metrics_route, render_metrics, MetricsError};
pub use recorder::{
    init_metrics, record_events_delivered, record_route_published, record_route_rejected,
    record_store_fallback, record_sweep_removed, set_active_routes, set_connected_peers,
};
