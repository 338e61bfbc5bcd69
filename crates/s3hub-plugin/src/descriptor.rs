//! Plugin descriptors: a base plugin plus the optional capabilities it offers.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use s3hub_core::types::S3Operation;

use crate::capabilities::{
    BatchProcessor, ConditionalPlugin, Plugin, PluginMetadata, PostProcessor, PreProcessor,
    PrioritizedPlugin, Priority, SelectProcessor, StreamProcessor,
};

/// Optional capability a plugin may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Rewrites arguments before execution.
    PreProcessor,
    /// Rewrites the final result.
    PostProcessor,
    /// Processes object bodies chunk by chunk.
    StreamProcessor,
    /// Processes batches of argument sets.
    BatchProcessor,
    /// Evaluates select expressions.
    SelectProcessor,
    /// Gates execution per call.
    Conditional,
    /// Supplies a priority.
    Prioritized,
}

impl Capability {
    /// Capabilities whose holders the registry keeps in a dedicated list.
    pub const LISTED: [Capability; 5] = [
        Self::PreProcessor,
        Self::PostProcessor,
        Self::StreamProcessor,
        Self::BatchProcessor,
        Self::SelectProcessor,
    ];

    /// Returns the snake_case name of this capability.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreProcessor => "pre_processor",
            Self::PostProcessor => "post_processor",
            Self::StreamProcessor => "stream_processor",
            Self::BatchProcessor => "batch_processor",
            Self::SelectProcessor => "select_processor",
            Self::Conditional => "conditional",
            Self::Prioritized => "prioritized",
        }
    }

    /// Returns whether the registry keeps a list for this capability.
    pub fn is_listed(&self) -> bool {
        Self::LISTED.contains(self)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A plugin together with handles to each optional capability it offers.
///
/// A type implementing several capability traits is usually shared:
///
/// ```rust,ignore
/// let audit = Arc::new(AuditPlugin::default());
/// let descriptor = PluginDescriptor::new(audit.clone())
///     .with_post_processor(audit.clone())
///     .with_priority_source(audit);
/// ```
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    plugin: Arc<dyn Plugin>,
    metadata: PluginMetadata,
    operations: HashSet<S3Operation>,
    pre_processor: Option<Arc<dyn PreProcessor>>,
    post_processor: Option<Arc<dyn PostProcessor>>,
    stream_processor: Option<Arc<dyn StreamProcessor>>,
    batch_processor: Option<Arc<dyn BatchProcessor>>,
    select_processor: Option<Arc<dyn SelectProcessor>>,
    condition: Option<Arc<dyn ConditionalPlugin>>,
    priority_source: Option<Arc<dyn PrioritizedPlugin>>,
}

impl PluginDescriptor {
    /// Wraps a plugin with no optional capabilities.
    ///
    /// Metadata and supported operations are read once here so the
    /// registry works from a stable copy.
    pub fn new(plugin: Arc<dyn Plugin>) -> Self {
        let metadata = plugin.metadata();
        let operations = plugin.supported_operations();
        Self {
            plugin,
            metadata,
            operations,
            pre_processor: None,
            post_processor: None,
            stream_processor: None,
            batch_processor: None,
            select_processor: None,
            condition: None,
            priority_source: None,
        }
    }

    /// Adds the pre-processor capability.
    pub fn with_pre_processor(mut self, processor: Arc<dyn PreProcessor>) -> Self {
        self.pre_processor = Some(processor);
        self
    }

    /// Adds the post-processor capability.
    pub fn with_post_processor(mut self, processor: Arc<dyn PostProcessor>) -> Self {
        self.post_processor = Some(processor);
        self
    }

    /// Adds the stream-processor capability.
    pub fn with_stream_processor(mut self, processor: Arc<dyn StreamProcessor>) -> Self {
        self.stream_processor = Some(processor);
        self
    }

    /// Adds the batch-processor capability.
    pub fn with_batch_processor(mut self, processor: Arc<dyn BatchProcessor>) -> Self {
        self.batch_processor = Some(processor);
        self
    }

    /// Adds the select-processor capability.
    pub fn with_select_processor(mut self, processor: Arc<dyn SelectProcessor>) -> Self {
        self.select_processor = Some(processor);
        self
    }

    /// Adds a per-call execution gate.
    pub fn with_condition(mut self, condition: Arc<dyn ConditionalPlugin>) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Adds a priority source.
    pub fn with_priority_source(mut self, source: Arc<dyn PrioritizedPlugin>) -> Self {
        self.priority_source = Some(source);
        self
    }

    /// Returns the plugin name.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Returns the plugin metadata.
    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    /// Returns the operations the plugin declared.
    pub fn operations(&self) -> &HashSet<S3Operation> {
        &self.operations
    }

    /// Returns the base plugin.
    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }

    /// Returns the pre-processor handle, if present.
    pub fn pre_processor(&self) -> Option<&Arc<dyn PreProcessor>> {
        self.pre_processor.as_ref()
    }

    /// Returns the post-processor handle, if present.
    pub fn post_processor(&self) -> Option<&Arc<dyn PostProcessor>> {
        self.post_processor.as_ref()
    }

    /// Returns the stream-processor handle, if present.
    pub fn stream_processor(&self) -> Option<&Arc<dyn StreamProcessor>> {
        self.stream_processor.as_ref()
    }

    /// Returns the batch-processor handle, if present.
    pub fn batch_processor(&self) -> Option<&Arc<dyn BatchProcessor>> {
        self.batch_processor.as_ref()
    }

    /// Returns the select-processor handle, if present.
    pub fn select_processor(&self) -> Option<&Arc<dyn SelectProcessor>> {
        self.select_processor.as_ref()
    }

    /// Returns the execution gate, if present.
    pub fn condition(&self) -> Option<&Arc<dyn ConditionalPlugin>> {
        self.condition.as_ref()
    }

    /// Resolves the plugin's priority, defaulting to [`Priority::Medium`].
    pub fn priority(&self) -> Priority {
        self.priority_source
            .as_ref()
            .map(|source| source.priority())
            .unwrap_or_default()
    }

    /// Returns whether the plugin offers `capability`.
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::PreProcessor => self.pre_processor.is_some(),
            Capability::PostProcessor => self.post_processor.is_some(),
            Capability::StreamProcessor => self.stream_processor.is_some(),
            Capability::BatchProcessor => self.batch_processor.is_some(),
            Capability::SelectProcessor => self.select_processor.is_some(),
            Capability::Conditional => self.condition.is_some(),
            Capability::Prioritized => self.priority_source.is_some(),
        }
    }

    /// Lists every capability present.
    pub fn capabilities(&self) -> Vec<Capability> {
        [
            Capability::PreProcessor,
            Capability::PostProcessor,
            Capability::StreamProcessor,
            Capability::BatchProcessor,
            Capability::SelectProcessor,
            Capability::Conditional,
            Capability::Prioritized,
        ]
        .into_iter()
        .filter(|c| self.has(*c))
        .collect()
    }
}
