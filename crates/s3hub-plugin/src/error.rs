//! Error type for the plugin runtime.
//!
//! Registration, unregistration, pipeline-stage, and shutdown failures are
//! returned to callers as [`PluginError`]. Per-plugin execution failures
//! use the same type internally but never cross the manager boundary.

use std::time::Duration;

use thiserror::Error;

use s3hub_core::error::AppError;

/// Errors raised by the plugin manager and dispatcher.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin name is on the block-list.
    #[error("Plugin '{name}' is blocked")]
    Blocked {
        /// Plugin name.
        name: String,
    },

    /// An allow-list is configured and does not contain the plugin name.
    #[error("Plugin '{name}' is not allowed")]
    NotAllowed {
        /// Plugin name.
        name: String,
    },

    /// The plugin's `initialize` hook failed.
    #[error("Plugin '{name}' initialization failed: {source}")]
    InitializationFailed {
        /// Plugin name.
        name: String,
        /// Error returned by the plugin.
        #[source]
        source: AppError,
    },

    /// No plugin is registered under the name.
    #[error("Plugin '{name}' not found")]
    NotFound {
        /// Plugin name.
        name: String,
    },

    /// A pre-processor failed; the operation was aborted.
    #[error("Pre-processing failed in plugin '{plugin}': {source}")]
    PreProcessing {
        /// Pre-processor name.
        plugin: String,
        /// Error returned by the pre-processor.
        #[source]
        source: AppError,
    },

    /// A post-processor failed; the operation result was discarded.
    #[error("Post-processing failed in plugin '{plugin}': {source}")]
    PostProcessing {
        /// Post-processor name.
        plugin: String,
        /// Error returned by the post-processor.
        #[source]
        source: AppError,
    },

    /// A plugin's `execute` returned an error.
    #[error("Plugin '{plugin}' execution failed: {source}")]
    Execution {
        /// Plugin name.
        plugin: String,
        /// Error returned by the plugin.
        #[source]
        source: AppError,
    },

    /// A plugin panicked while executing.
    #[error("Plugin '{plugin}' panicked: {message}")]
    Panicked {
        /// Plugin name.
        plugin: String,
        /// Panic message, when the payload carried one.
        message: String,
    },

    /// A plugin did not finish before its deadline.
    #[error("Plugin '{plugin}' timed out after {}ms", .after.as_millis())]
    Timeout {
        /// Plugin name.
        plugin: String,
        /// Time budget the plugin was given.
        after: Duration,
    },

    /// The caller cancelled the operation while a plugin was running.
    #[error("Plugin '{plugin}' was cancelled")]
    Cancelled {
        /// Plugin name.
        plugin: String,
    },

    /// The admission gate bounding concurrent plugin executions was closed.
    #[error("Plugin admission gate closed")]
    AdmissionClosed,

    /// One or more plugins failed to clean up during shutdown.
    #[error("Shutdown completed with {} cleanup failure(s): {}", .failures.len(), format_failures(.failures))]
    Shutdown {
        /// Plugin name and cleanup error for each failure.
        failures: Vec<(String, AppError)>,
    },
}

fn format_failures(failures: &[(String, AppError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{name}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<PluginError> for AppError {
    fn from(err: PluginError) -> Self {
        match &err {
            PluginError::Blocked { .. } | PluginError::NotAllowed { .. } => {
                AppError::authorization(err.to_string())
            }
            PluginError::NotFound { .. } => AppError::not_found(err.to_string()),
            PluginError::Timeout { .. } => AppError::timeout(err.to_string()),
            PluginError::Cancelled { .. } => AppError::cancelled(err.to_string()),
            PluginError::AdmissionClosed => AppError::internal(err.to_string()),
            _ => AppError::plugin(err.to_string()),
        }
    }
}
