//! Outcome of an operation dispatch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message of the result returned when no plugin supports an operation.
pub const NO_PLUGINS_REGISTERED: &str = "no plugins registered";

/// Message of the result returned when every plugin failed or was skipped.
pub const NO_PLUGINS_EXECUTED: &str = "no plugins executed";

/// Result of an operation.
///
/// A dispatch returns exactly one of these: the result of the last plugin
/// that completed successfully, or a synthetic one when none did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable message.
    pub message: String,
    /// Optional payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Name of the plugin that produced the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
}

impl OperationResult {
    /// Creates a successful result.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            plugin: None,
        }
    }

    /// Attaches a payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Records the producing plugin.
    pub fn from_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    /// Result for an operation with no registered plugins.
    pub fn no_plugins_registered() -> Self {
        Self::success(NO_PLUGINS_REGISTERED)
    }

    /// Result for a dispatch in which no plugin completed successfully.
    pub fn no_plugins_executed() -> Self {
        Self::success(NO_PLUGINS_EXECUTED)
    }
}
