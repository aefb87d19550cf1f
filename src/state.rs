//! Shared application state.

use wakehall_core::{DeviceRegistry, LocalScanner};

/// State handed to every request handler: the immutable device registry
/// plus the de-duplicating local scanner.
pub struct AppState {
    pub registry: DeviceRegistry,
    pub scanner: LocalScanner,
}

impl AppState {
    pub fn new(registry: DeviceRegistry) -> Self {
        Self {
            registry,
            scanner: LocalScanner::new(),
        }
    }
}
