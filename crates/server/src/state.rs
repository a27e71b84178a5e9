//! Shared application state for the HTTP handlers

use std::collections::HashMap;
use std::sync::Arc;

use dakoku_domain::Config;
use dakoku_infra::{FreeeClient, SlackClient, TokenManager};
use tokio::sync::RwLock;

/// State threaded through every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: Arc<TokenManager>,
    pub freee: Arc<FreeeClient>,
    pub slack: Arc<SlackClient>,
    /// Slack user id → employee id, filled as users are resolved. Safe to
    /// lose on restart.
    pub resolution_cache: Arc<RwLock<HashMap<String, i64>>>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        tokens: Arc<TokenManager>,
        freee: Arc<FreeeClient>,
        slack: Arc<SlackClient>,
    ) -> Self {
        Self {
            config,
            tokens,
            freee,
            slack,
            resolution_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}
