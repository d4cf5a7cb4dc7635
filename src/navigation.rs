//! Navigation and permission prompts — host capabilities the guide calls.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Fire-and-forget page navigation. There is no completion signal; callers
/// wait a settle delay instead.
pub trait Navigator: Send + Sync {
    fn navigate_to(&self, path: &str);
}

/// Navigator that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn navigate_to(&self, path: &str) {
        tracing::info!(path, "Navigation requested");
    }
}

/// Navigator that remembers every requested path.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    paths: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_to(&self, path: &str) {
        self.paths
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.to_string());
    }
}

/// Outcome of an OS permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOutcome {
    Granted,
    Denied,
    /// The platform cannot ask (unsupported browser, headless host).
    Unavailable,
}

/// A permission prompt, e.g. push notifications.
#[async_trait]
pub trait PermissionPrompt: Send + Sync {
    async fn request(&self) -> PermissionOutcome;
}

/// Prompt that always returns the same outcome.
#[derive(Debug, Clone, Copy)]
pub struct FixedPermission(pub PermissionOutcome);

#[async_trait]
impl PermissionPrompt for FixedPermission {
    async fn request(&self) -> PermissionOutcome {
        self.0
    }
}
