use std::sync::Mutex;

use domains::ports::PathRevalidator;
use tracing::info;

/// Emits an event per invalidated path. Deployments without a page cache use
/// this as their revalidator.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRevalidator;

impl PathRevalidator for TracingRevalidator {
    fn revalidate(&self, path: &str) {
        info!(path, "revalidate");
    }
}

/// Remembers every path it was asked to invalidate.
#[derive(Debug, Default)]
pub struct RecordingRevalidator {
    paths: Mutex<Vec<String>>,
}

impl RecordingRevalidator {
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl PathRevalidator for RecordingRevalidator {
    fn revalidate(&self, path: &str) {
        if let Ok(mut paths) = self.paths.lock() {
            paths.push(path.to_string());
        }
    }
}
