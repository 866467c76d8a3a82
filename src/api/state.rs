use std::sync::Arc;

use crate::cache::StatusCache;
use crate::config::Config;
use crate::observability::Metrics;
use crate::queue::JobQueue;
use crate::store::JobStore;
use crate::vendor::VendorClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<JobStore>,
    pub queue: Arc<JobQueue>,
    pub cache: Arc<StatusCache>,
    pub vendors: Arc<VendorClient>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<JobStore>,
        queue: Arc<JobQueue>,
        cache: Arc<StatusCache>,
        vendors: Arc<VendorClient>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            queue,
            cache,
            vendors,
            metrics,
        }
    }
}
