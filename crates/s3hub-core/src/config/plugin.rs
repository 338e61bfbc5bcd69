//! Plugin manager configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Largest accepted `max_concurrent_plugins`, equal to the permit ceiling of
/// `tokio::sync::Semaphore`.
pub const MAX_CONCURRENT_PLUGINS: usize = usize::MAX >> 3;

/// Settings for the plugin manager. Immutable once the manager is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Upper bound on plugin executions in flight across all calls
    /// (`0` = unlimited).
    #[serde(default = "default_max_concurrent_plugins")]
    pub max_concurrent_plugins: usize,
    /// Per-plugin execution timeout in milliseconds.
    #[serde(default = "default_plugin_timeout_ms")]
    pub plugin_timeout_ms: u64,
    /// Whether registered pre-processors run before plugin execution.
    #[serde(default = "default_true")]
    pub enable_pre_processing: bool,
    /// Whether registered post-processors run on the final result.
    #[serde(default = "default_true")]
    pub enable_post_processing: bool,
    /// If non-empty, only these plugin names may register.
    #[serde(default)]
    pub allowed_plugins: Vec<String>,
    /// Plugin names that may never register.
    #[serde(default)]
    pub blocked_plugins: Vec<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_plugins: default_max_concurrent_plugins(),
            plugin_timeout_ms: default_plugin_timeout_ms(),
            enable_pre_processing: true,
            enable_post_processing: true,
            allowed_plugins: Vec::new(),
            blocked_plugins: Vec::new(),
        }
    }
}

impl ManagerConfig {
    /// Returns the per-plugin timeout as a [`Duration`].
    pub fn plugin_timeout(&self) -> Duration {
        Duration::from_millis(self.plugin_timeout_ms)
    }

    /// Returns whether `name` is on the block-list.
    pub fn is_blocked(&self, name: &str) -> bool {
        self.blocked_plugins.iter().any(|n| n == name)
    }

    /// Returns whether `name` passes both the block-list and the allow-list.
    ///
    /// The block-list always wins; an empty allow-list admits everything.
    pub fn is_allowed(&self, name: &str) -> bool {
        if self.is_blocked(name) {
            return false;
        }
        self.allowed_plugins.is_empty() || self.allowed_plugins.iter().any(|n| n == name)
    }

    /// Rejects settings the manager cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.plugin_timeout_ms == 0 {
            return Err(AppError::configuration(
                "plugins.plugin_timeout_ms must be greater than zero",
            ));
        }
        if self.max_concurrent_plugins > MAX_CONCURRENT_PLUGINS {
            return Err(AppError::configuration(format!(
                "plugins.max_concurrent_plugins must be at most {MAX_CONCURRENT_PLUGINS} (use 0 for unlimited)"
            )));
        }
        Ok(())
    }
}

fn default_max_concurrent_plugins() -> usize {
    10
}

fn default_plugin_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}
