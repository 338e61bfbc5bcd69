//! Plugin manager owning the registry and the dispatcher.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use s3hub_core::config::plugin::ManagerConfig;
use s3hub_core::types::S3Operation;

use crate::capabilities::{
    BatchProcessor, Plugin, PluginMetadata, PostProcessor, PreProcessor, Priority,
    SelectProcessor, StreamProcessor,
};
use crate::context::{OperationArgs, OperationContext, PluginSettings};
use crate::descriptor::{Capability, PluginDescriptor};
use crate::dispatcher::Dispatcher;
use crate::error::PluginError;
use crate::observer::OutcomeObserver;
use crate::registry::{RegisteredPlugin, Registry};
use crate::result::OperationResult;

/// Listing entry describing a registered plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginSummary {
    /// Plugin identity.
    #[serde(flatten)]
    pub metadata: PluginMetadata,
    /// Resolved priority.
    pub priority: Priority,
    /// Declared operations, sorted.
    pub operations: Vec<S3Operation>,
    /// Capabilities present.
    pub capabilities: Vec<Capability>,
}

impl From<&RegisteredPlugin> for PluginSummary {
    fn from(entry: &RegisteredPlugin) -> Self {
        let descriptor = entry.descriptor();
        let mut operations: Vec<S3Operation> = descriptor.operations().iter().copied().collect();
        operations.sort();
        Self {
            metadata: descriptor.metadata().clone(),
            priority: entry.priority(),
            operations,
            capabilities: descriptor.capabilities(),
        }
    }
}

/// Owns the plugin registry and runs operations through it.
///
/// Registration, unregistration, and shutdown hold the registry's write
/// lock for their whole duration, including plugin lifecycle hooks.
/// Dispatch holds the read lock only while copying a snapshot.
#[derive(Debug)]
pub struct PluginManager {
    /// Manager settings.
    config: ManagerConfig,
    /// Registry guarded by the manager's single lock.
    registry: RwLock<Registry>,
    /// Dispatch protocol.
    dispatcher: Dispatcher,
}

impl PluginManager {
    /// Creates a manager with an empty registry.
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            dispatcher: Dispatcher::new(&config),
            config,
            registry: RwLock::new(Registry::new()),
        }
    }

    /// Installs an observer receiving every plugin outcome.
    pub fn with_observer(mut self, observer: Arc<dyn OutcomeObserver>) -> Self {
        self.dispatcher = self.dispatcher.with_observer(observer);
        self
    }

    /// Returns the manager settings.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Returns the free admission permits, or `None` when concurrency is
    /// unbounded.
    pub fn available_permits(&self) -> Option<usize> {
        self.dispatcher.available_permits()
    }

    /// Registers a plugin.
    ///
    /// Rejects blocked names, then names missing from a non-empty
    /// allow-list, then plugins whose `initialize` fails. Registering a
    /// name that is already taken replaces the old plugin, which is removed
    /// from every list and cleaned up once the new one has initialised.
    pub async fn register_plugin(&self, descriptor: PluginDescriptor) -> Result<(), PluginError> {
        let name = descriptor.name().to_string();

        if self.config.is_blocked(&name) {
            return Err(PluginError::Blocked { name });
        }
        if !self.config.is_allowed(&name) {
            return Err(PluginError::NotAllowed { name });
        }

        let mut registry = self.registry.write().await;

        descriptor
            .plugin()
            .initialize(&PluginSettings::new())
            .await
            .map_err(|source| PluginError::InitializationFailed {
                name: name.clone(),
                source,
            })?;

        let version = descriptor.metadata().version.clone();
        let priority = descriptor.priority();
        let operations = descriptor.operations().len();

        if let Some(previous) = registry.insert(descriptor) {
            info!(plugin = %name, "Replacing previously registered plugin");
            if let Err(e) = previous.descriptor().plugin().cleanup().await {
                warn!(plugin = %name, error = %e, "Replaced plugin cleanup returned error");
            }
        }

        info!(
            plugin = %name,
            version = %version,
            priority = %priority,
            operations,
            "Plugin registered"
        );

        Ok(())
    }

    /// Unregisters a plugin by name.
    ///
    /// A failing `cleanup` is logged and does not prevent removal.
    pub async fn unregister_plugin(&self, name: &str) -> Result<(), PluginError> {
        let mut registry = self.registry.write().await;

        let plugin = registry
            .get(name)
            .map(|entry| entry.descriptor().plugin().clone())
            .ok_or_else(|| PluginError::NotFound {
                name: name.to_string(),
            })?;

        if let Err(e) = plugin.cleanup().await {
            warn!(plugin = %name, error = %e, "Plugin cleanup returned error");
        }

        registry.remove(name);

        info!(plugin = %name, "Plugin unregistered");

        Ok(())
    }

    /// Runs `operation` through the plugin pipeline.
    ///
    /// Returns the last successful plugin result (post-processed), a
    /// synthetic success when no plugin is registered or none succeeded,
    /// or the error of a failed pre/post-processing stage.
    pub async fn execute_operation(
        &self,
        operation: S3Operation,
        ctx: &OperationContext,
        args: OperationArgs,
    ) -> Result<OperationResult, PluginError> {
        let snapshot = {
            let registry = self.registry.read().await;
            registry.snapshot(operation)
        };

        self.dispatcher.dispatch(operation, snapshot, ctx, args).await
    }

    /// Cleans up and removes every plugin.
    ///
    /// Every plugin is attempted; failures are collected into one error.
    pub async fn shutdown(&self) -> Result<(), PluginError> {
        let mut registry = self.registry.write().await;
        let entries = registry.drain();
        let total = entries.len();

        let mut failures = Vec::new();
        for entry in entries {
            if let Err(e) = entry.descriptor().plugin().cleanup().await {
                warn!(plugin = %entry.name(), error = %e, "Plugin cleanup failed during shutdown");
                failures.push((entry.name().to_string(), e));
            }
        }

        info!(plugins = total, failed = failures.len(), "Plugin manager shut down");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PluginError::Shutdown { failures })
        }
    }

    /// Lists all registered plugins, sorted by name.
    pub async fn get_plugins(&self) -> Vec<PluginSummary> {
        let registry = self.registry.read().await;
        let mut plugins: Vec<PluginSummary> = registry.plugins().map(PluginSummary::from).collect();
        plugins.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
        plugins
    }

    /// Gets a registered plugin by name.
    pub async fn get_plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        let registry = self.registry.read().await;
        registry
            .get(name)
            .map(|entry| entry.descriptor().plugin().clone())
    }

    /// Lists the plugins for an operation, in dispatch order.
    pub async fn get_plugins_by_operation(&self, operation: S3Operation) -> Vec<PluginSummary> {
        let registry = self.registry.read().await;
        registry
            .for_operation(operation)
            .iter()
            .map(PluginSummary::from)
            .collect()
    }

    /// Lists the holders of a listed capability, in registration order.
    pub async fn get_plugins_with(&self, capability: Capability) -> Vec<PluginSummary> {
        let registry = self.registry.read().await;
        registry
            .with_capability(capability)
            .iter()
            .map(PluginSummary::from)
            .collect()
    }

    /// Returns the registered pre-processors.
    pub async fn get_pre_processors(&self) -> Vec<Arc<dyn PreProcessor>> {
        self.collect(Capability::PreProcessor, |d| d.pre_processor().cloned())
            .await
    }

    /// Returns the registered post-processors.
    pub async fn get_post_processors(&self) -> Vec<Arc<dyn PostProcessor>> {
        self.collect(Capability::PostProcessor, |d| d.post_processor().cloned())
            .await
    }

    /// Returns the registered stream processors.
    pub async fn get_stream_processors(&self) -> Vec<Arc<dyn StreamProcessor>> {
        self.collect(Capability::StreamProcessor, |d| d.stream_processor().cloned())
            .await
    }

    /// Returns the registered batch processors.
    pub async fn get_batch_processors(&self) -> Vec<Arc<dyn BatchProcessor>> {
        self.collect(Capability::BatchProcessor, |d| d.batch_processor().cloned())
            .await
    }

    /// Returns the registered select processors.
    pub async fn get_select_processors(&self) -> Vec<Arc<dyn SelectProcessor>> {
        self.collect(Capability::SelectProcessor, |d| d.select_processor().cloned())
            .await
    }

    /// Returns the plugin count.
    pub async fn plugin_count(&self) -> usize {
        self.registry.read().await.len()
    }

    /// Checks that the registry's structures agree with each other.
    pub async fn is_consistent(&self) -> bool {
        self.registry.read().await.is_consistent()
    }

    async fn collect<T: ?Sized>(
        &self,
        capability: Capability,
        handle: impl Fn(&PluginDescriptor) -> Option<Arc<T>>,
    ) -> Vec<Arc<T>> {
        let registry = self.registry.read().await;
        registry
            .with_capability(capability)
            .iter()
            .filter_map(|entry| {
                let descriptor: &PluginDescriptor = entry.descriptor();
                handle(descriptor)
            })
            .collect()
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}
