//! Request performance monitor.
//!
//! Constructed once at startup and shared through `AppState`. The HTTP
//! metrics middleware records every request here; while started, a
//! background task logs a per-route summary at a fixed interval.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
struct RouteStats {
    count: u64,
    errors: u64,
    total_ms: f64,
    max_ms: f64,
}

/// Aggregated numbers for one `METHOD path` pair
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub route: String,
    pub count: u64,
    /// Responses with a 5xx status
    pub errors: u64,
    pub avg_ms: f64,
    pub max_ms: f64,
}

struct SummaryTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct PerformanceMonitor {
    routes: DashMap<String, RouteStats>,
    started_at: Instant,
    task: Mutex<Option<SummaryTask>>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            routes: DashMap::new(),
            started_at: Instant::now(),
            task: Mutex::new(None),
        }
    }

    pub fn record(&self, method: &str, path: &str, status: u16, duration: Duration) {
        let ms = duration.as_secs_f64() * 1000.0;
        let mut entry = self
            .routes
            .entry(format!("{} {}", method, path))
            .or_default();
        entry.count += 1;
        entry.total_ms += ms;
        entry.max_ms = entry.max_ms.max(ms);
        if status >= 500 {
            entry.errors += 1;
        }
    }

    /// Routes ordered by request count, busiest first
    pub fn summary(&self) -> Vec<RouteSummary> {
        let mut summary: Vec<RouteSummary> = self
            .routes
            .iter()
            .map(|entry| {
                let stats = entry.value();
                RouteSummary {
                    route: entry.key().clone(),
                    count: stats.count,
                    errors: stats.errors,
                    avg_ms: if stats.count == 0 {
                        0.0
                    } else {
                        stats.total_ms / stats.count as f64
                    },
                    max_ms: stats.max_ms,
                }
            })
            .collect();
        summary.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.route.cmp(&b.route)));
        summary
    }

    pub fn total_requests(&self) -> u64 {
        self.routes.iter().map(|e| e.value().count).sum()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn log_summary(&self) {
        let summary = self.summary();
        if summary.is_empty() {
            tracing::debug!("No requests recorded yet");
            return;
        }
        for route in summary.iter().take(10) {
            tracing::info!(
                route = %route.route,
                count = route.count,
                errors = route.errors,
                avg_ms = route.avg_ms,
                max_ms = route.max_ms,
                "Request summary"
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|task| task.is_some())
            .unwrap_or(false)
    }

    /// Start the periodic summary task. Calling `start` on a running
    /// monitor does nothing.
    pub fn start(self: &Arc<Self>, every: Duration) {
        let mut task = match self.task.lock() {
            Ok(task) => task,
            Err(poisoned) => poisoned.into_inner(),
        };
        if task.is_some() {
            return;
        }

        tracing::info!(interval_secs = every.as_secs(), "Starting performance monitor");

        let cancel = CancellationToken::new();
        let monitor = Arc::clone(self);
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut tick = interval(every);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately
            tick.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tick.tick() => monitor.log_summary(),
                }
            }
        });

        *task = Some(SummaryTask { cancel, handle });
    }

    /// Stop the summary task and wait for it to finish
    pub async fn stop(&self) {
        let task = match self.task.lock() {
            Ok(mut task) => task.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                tracing::warn!(error = %e, "Performance monitor task ended abnormally");
            }
            tracing::info!("Performance monitor stopped");
        }
    }
}
