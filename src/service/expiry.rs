use crate::service::route_service::{RouteService, SweepReport};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Periodic background sweep of expired routes and stale connections
pub struct ExpiryScheduler {
    service: Arc<RouteService>,
    period: Duration,
    last_report: Mutex<Option<SweepReport>>,
}

impl ExpiryScheduler {
    pub fn new(service: Arc<RouteService>, period: Duration) -> Self {
        Self {
            service,
            period,
            last_report: Mutex::new(None),
        }
    }

    /// Run one sweep now and remember its report
    pub async fn run_once(&self) -> SweepReport {
        let report = self.service.sweep().await;
        match &report.expired_routes {
            Ok(removed) => tracing::info!(
                expired_routes = removed,
                stale_connections = report.stale_connections,
                "Expiry sweep finished"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                stale_connections = report.stale_connections,
                "Expiry sweep finished with store failure"
            ),
        }

        *self.last_report.lock() = Some(report.clone());
        report
    }

    pub fn last_report(&self) -> Option<SweepReport> {
        self.last_report.lock().clone()
    }

    /// Sweep every period until the task is aborted. The first sweep runs
    /// one full period after spawning.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Skip the first immediate tick
            ticker.tick().await;

            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }
}
