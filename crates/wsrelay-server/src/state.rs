//! Shared application state

use std::time::Instant;

use wsrelay_hub::HubHandle;

/// State handed to every HTTP handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(hub: HubHandle) -> Self {
        Self {
            hub,
            started_at: Instant::now(),
        }
    }
}
