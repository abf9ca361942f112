pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod intake;
pub mod monitor;
pub mod notifications;
pub mod storage;

pub use db::DbPool;

use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::monitor::PerformanceMonitor;
use crate::notifications::LeadMailer;
use crate::storage::FileStore;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub rate_limiter: Arc<RateLimiter>,
    pub monitor: Arc<PerformanceMonitor>,
    pub file_store: Arc<dyn FileStore>,
    pub mailer: Arc<LeadMailer>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool, file_store: Arc<dyn FileStore>) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let mailer = Arc::new(LeadMailer::new(
            config.email.clone(),
            config.server.public_url.clone(),
        ));
        Self {
            config,
            db,
            rate_limiter,
            monitor: Arc::new(PerformanceMonitor::new()),
            file_store,
            mailer,
            metrics_handle: None,
        }
    }

    /// Set the Prometheus metrics handle
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
