pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use services::UpstreamClient;
use std::sync::Arc;

/// Shared application state. The relay keeps no per-request or per-session
/// data; the upstream client is the only thing shared between requests.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<UpstreamClient>,
}

impl AppState {
    pub fn new(upstream: Arc<UpstreamClient>) -> Self {
        Self { upstream }
    }
}
