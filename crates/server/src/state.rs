use std::sync::Arc;

use engine::HierarchyQuery;
use store::ThreadStore;

use crate::config::ServerConfig;

/// Shared application state for the query API.
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<ServerConfig>,
    pub hierarchy: Arc<HierarchyQuery>,
}

impl ServerState {
    pub fn new(config: ServerConfig, store: Arc<dyn ThreadStore>) -> Self {
        Self {
            config: Arc::new(config),
            hierarchy: Arc::new(HierarchyQuery::new(store)),
        }
    }
}
