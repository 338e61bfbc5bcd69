//! Capability contracts implemented by plugins.
//!
//! Every plugin implements [`Plugin`]. The remaining traits are optional
//! capabilities; which ones a plugin offers is declared on its
//! [`PluginDescriptor`](crate::descriptor::PluginDescriptor) at registration.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use s3hub_core::result::AppResult;
use s3hub_core::types::S3Operation;

use crate::context::{OperationArgs, OperationContext, PluginSettings};
use crate::result::OperationResult;

/// Identity of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Unique plugin name; the registry key.
    pub name: String,
    /// Version string, display only.
    pub version: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
}

impl PluginMetadata {
    /// Creates metadata with an empty description.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Execution priority of a plugin within one operation.
///
/// Higher priorities run first. Plugins that do not expose a priority
/// are treated as [`Priority::Medium`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Runs after everything else.
    Low,
    /// Default level.
    #[default]
    Medium,
    /// Runs before medium and low.
    High,
    /// Runs first.
    Critical,
}

impl Priority {
    /// Returns the lowercase name of this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Base contract every plugin implements.
#[async_trait]
pub trait Plugin: Send + Sync + fmt::Debug {
    /// Returns the plugin's identity.
    fn metadata(&self) -> PluginMetadata;

    /// Returns the operations this plugin wants to intercept.
    fn supported_operations(&self) -> HashSet<S3Operation>;

    /// Called once during registration. An error rejects the registration.
    async fn initialize(&self, settings: &PluginSettings) -> AppResult<()>;

    /// Called on unregistration, replacement, and shutdown.
    async fn cleanup(&self) -> AppResult<()>;

    /// Runs the plugin for one operation.
    ///
    /// `ctx` carries a cancellation token and deadline bounded by the
    /// manager's per-plugin timeout; long-running plugins should observe it.
    async fn execute(&self, ctx: &OperationContext, args: &OperationArgs)
    -> AppResult<OperationResult>;
}

/// Transforms operation arguments before any plugin executes.
#[async_trait]
pub trait PreProcessor: Send + Sync + fmt::Debug {
    /// Returns the (possibly rewritten) arguments.
    async fn pre_process(
        &self,
        ctx: &OperationContext,
        args: OperationArgs,
    ) -> AppResult<OperationArgs>;
}

/// Transforms the final operation result.
#[async_trait]
pub trait PostProcessor: Send + Sync + fmt::Debug {
    /// Returns the (possibly rewritten) result.
    async fn post_process(
        &self,
        ctx: &OperationContext,
        result: OperationResult,
    ) -> AppResult<OperationResult>;
}

/// Decides per call whether a plugin runs at all.
pub trait ConditionalPlugin: Send + Sync + fmt::Debug {
    /// Returns `false` to skip the plugin for this call.
    fn should_execute(&self, ctx: &OperationContext, args: &OperationArgs) -> bool;
}

/// Supplies an ordering hint.
pub trait PrioritizedPlugin: Send + Sync + fmt::Debug {
    /// Returns the plugin's priority.
    fn priority(&self) -> Priority;
}

/// Processes object bodies one chunk at a time.
///
/// The runtime only lists stream processors; the transfer path that
/// consumes object bodies decides when to call them.
#[async_trait]
pub trait StreamProcessor: Send + Sync + fmt::Debug {
    /// Transforms a single chunk.
    async fn process_stream(&self, ctx: &OperationContext, chunk: Bytes) -> AppResult<Bytes>;
}

/// Handles many argument sets in one call.
#[async_trait]
pub trait BatchProcessor: Send + Sync + fmt::Debug {
    /// Largest batch the processor accepts.
    fn max_batch_size(&self) -> usize {
        100
    }

    /// Processes a batch, returning one result per input.
    async fn process_batch(
        &self,
        ctx: &OperationContext,
        batch: Vec<OperationArgs>,
    ) -> AppResult<Vec<OperationResult>>;
}

/// Evaluates a query expression against object content.
#[async_trait]
pub trait SelectProcessor: Send + Sync + fmt::Debug {
    /// Runs `expression` over `content`.
    async fn select(
        &self,
        ctx: &OperationContext,
        expression: &str,
        content: Bytes,
    ) -> AppResult<Value>;
}
