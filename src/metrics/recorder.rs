//! Metrics recorder for relay operations
//!
//! Thin wrappers over the `metrics` macros so call sites never repeat
//! metric names or label keys.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::sync::atomic::{AtomicBool, Ordering};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    describe_counter!(
        "relay_routes_published_total",
        "Routes accepted from peers"
    );
    describe_counter!(
        "relay_routes_rejected_total",
        "Publish payloads that failed validation"
    );
    describe_counter!(
        "relay_events_delivered_total",
        "Events queued onto peer channels"
    );
    describe_counter!(
        "relay_store_fallbacks_total",
        "Reads served from memory because the durable store failed"
    );
    describe_counter!(
        "relay_sweep_removed_total",
        "Routes and connections removed by the expiry sweep"
    );

    describe_gauge!("relay_connected_peers", "Currently attached peer channels");
    describe_gauge!("relay_active_routes", "Routes held in memory");
}

// ============== Route Operations ==============

pub fn record_route_published() {
    counter!("relay_routes_published_total").increment(1);
}

pub fn record_route_rejected(reason: &str) {
    counter!("relay_routes_rejected_total", "reason" => reason.to_string()).increment(1);
}

pub fn set_active_routes(count: usize) {
    gauge!("relay_active_routes").set(count as f64);
}

// ============== Delivery ==============

/// Record `delivered` events queued for one event name
pub fn record_events_delivered(event: &'static str, delivered: usize) {
    counter!("relay_events_delivered_total", "event" => event).increment(delivered as u64);
}

pub fn set_connected_peers(count: usize) {
    gauge!("relay_connected_peers").set(count as f64);
}

// ============== Store ==============

/// Record a read that fell back to the in-memory store
pub fn record_store_fallback(op: &'static str) {
    counter!("relay_store_fallbacks_total", "op" => op).increment(1);
}

/// Record routes removed by a sweep, `kind` being "durable" or "volatile"
pub fn record_sweep_removed(kind: &'static str, removed: u64) {
    counter!("relay_sweep_removed_total", "kind" => kind).increment(removed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics() {
        // Should not panic when called multiple times
        init_metrics();
        init_metrics();
    }

    #[test]
    fn test_recording_without_recorder() {
        // No global recorder installed: every call is a no-op
        record_route_published();
        record_route_rejected("missing_field");
        record_events_delivered("route-update", 3);
        record_store_fallback("query");
        record_sweep_removed("durable", 2);
        set_connected_peers(4);
        set_active_routes(1);
    }
}
