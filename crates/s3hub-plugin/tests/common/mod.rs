//! Shared test plugins for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use s3hub_plugin::prelude::*;
use tokio_util::sync::CancellationToken;

/// Ordered record of plugin calls shared between test plugins.
#[derive(Debug, Default)]
pub struct CallLog {
    entries: Mutex<Vec<String>>,
}

impl CallLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }
}

/// What `execute` does.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Returns a success result whose message is the plugin name.
    Succeed,
    /// Returns an error.
    Fail(String),
    /// Sleeps, then succeeds.
    Sleep(Duration),
    /// Panics with the message.
    Panic(String),
}

/// Tracks how many executions overlap.
#[derive(Debug, Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Configurable plugin used across the integration tests.
#[derive(Debug)]
pub struct TestPlugin {
    name: String,
    version: String,
    operations: HashSet<S3Operation>,
    priority: Option<Priority>,
    behavior: Behavior,
    gate: Option<bool>,
    pre: Option<Result<(), String>>,
    post: Option<Result<(), String>>,
    extra: Vec<Capability>,
    init_error: Option<String>,
    cleanup_error: Option<String>,
    log: Arc<CallLog>,
    in_flight: Option<Arc<InFlight>>,
    pub executions: AtomicUsize,
    pub initializations: AtomicUsize,
    pub cleanups: AtomicUsize,
    pub seen_args: Mutex<Vec<OperationArgs>>,
    pub seen_tokens: Mutex<Vec<CancellationToken>>,
}

impl TestPlugin {
    pub fn new(name: &str, operations: &[S3Operation]) -> Self {
        Self {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            operations: operations.iter().copied().collect(),
            priority: None,
            behavior: Behavior::Succeed,
            gate: None,
            pre: None,
            post: None,
            extra: Vec::new(),
            init_error: None,
            cleanup_error: None,
            log: CallLog::new(),
            in_flight: None,
            executions: AtomicUsize::new(0),
            initializations: AtomicUsize::new(0),
            cleanups: AtomicUsize::new(0),
            seen_args: Mutex::new(Vec::new()),
            seen_tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn failing(self, reason: &str) -> Self {
        self.behavior(Behavior::Fail(reason.to_string()))
    }

    pub fn gated(mut self, allow: bool) -> Self {
        self.gate = Some(allow);
        self
    }

    pub fn pre_processor(mut self) -> Self {
        self.pre = Some(Ok(()));
        self
    }

    pub fn failing_pre_processor(mut self, reason: &str) -> Self {
        self.pre = Some(Err(reason.to_string()));
        self
    }

    pub fn post_processor(mut self) -> Self {
        self.post = Some(Ok(()));
        self
    }

    pub fn failing_post_processor(mut self, reason: &str) -> Self {
        self.post = Some(Err(reason.to_string()));
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.extra.push(capability);
        self
    }

    pub fn init_error(mut self, reason: &str) -> Self {
        self.init_error = Some(reason.to_string());
        self
    }

    pub fn cleanup_error(mut self, reason: &str) -> Self {
        self.cleanup_error = Some(reason.to_string());
        self
    }

    pub fn log(mut self, log: &Arc<CallLog>) -> Self {
        self.log = log.clone();
        self
    }

    pub fn in_flight(mut self, tracker: &Arc<InFlight>) -> Self {
        self.in_flight = Some(tracker.clone());
        self
    }

    /// Builds the descriptor, returning the shared plugin for assertions.
    pub fn build(self) -> (Arc<TestPlugin>, PluginDescriptor) {
        let plugin = Arc::new(self);
        let mut descriptor = PluginDescriptor::new(plugin.clone());

        if plugin.priority.is_some() {
            descriptor = descriptor.with_priority_source(plugin.clone());
        }
        if plugin.gate.is_some() {
            descriptor = descriptor.with_condition(plugin.clone());
        }
        if plugin.pre.is_some() {
            descriptor = descriptor.with_pre_processor(plugin.clone());
        }
        if plugin.post.is_some() {
            descriptor = descriptor.with_post_processor(plugin.clone());
        }
        for capability in &plugin.extra {
            descriptor = match capability {
                Capability::StreamProcessor => descriptor.with_stream_processor(plugin.clone()),
                Capability::BatchProcessor => descriptor.with_batch_processor(plugin.clone()),
                Capability::SelectProcessor => descriptor.with_select_processor(plugin.clone()),
                _ => descriptor,
            };
        }

        (plugin, descriptor)
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }

    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    pub fn result(&self) -> OperationResult {
        OperationResult::success(format!("result from {}", self.name)).from_plugin(&self.name)
    }
}

#[async_trait]
impl Plugin for TestPlugin {
    fn metadata(&self) -> PluginMetadata {
        plugin_metadata!(name: self.name.as_str(), version: self.version.as_str())
    }

    fn supported_operations(&self) -> HashSet<S3Operation> {
        self.operations.clone()
    }

    async fn initialize(&self, settings: &PluginSettings) -> AppResult<()> {
        assert!(settings.is_empty());
        self.initializations.fetch_add(1, Ordering::SeqCst);
        match &self.init_error {
            Some(reason) => Err(AppError::plugin(reason.clone())),
            None => Ok(()),
        }
    }

    async fn cleanup(&self) -> AppResult<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        match &self.cleanup_error {
            Some(reason) => Err(AppError::internal(reason.clone())),
            None => Ok(()),
        }
    }

    async fn execute(
        &self,
        ctx: &OperationContext,
        args: &OperationArgs,
    ) -> AppResult<OperationResult> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("execute:{}", self.name));
        self.seen_args.lock().unwrap().push(args.clone());
        self.seen_tokens
            .lock()
            .unwrap()
            .push(ctx.cancellation_token().clone());

        if let Some(tracker) = &self.in_flight {
            tracker.enter();
        }

        let outcome = match &self.behavior {
            Behavior::Succeed => Ok(self.result()),
            Behavior::Fail(reason) => Err(AppError::internal(reason.clone())),
            Behavior::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(self.result())
            }
            Behavior::Panic(message) => panic!("{message}"),
        };

        if let Some(tracker) = &self.in_flight {
            tracker.leave();
        }
        outcome
    }
}

impl PrioritizedPlugin for TestPlugin {
    fn priority(&self) -> Priority {
        self.priority.unwrap_or_default()
    }
}

impl ConditionalPlugin for TestPlugin {
    fn should_execute(&self, _ctx: &OperationContext, _args: &OperationArgs) -> bool {
        self.gate.unwrap_or(true)
    }
}

#[async_trait]
impl PreProcessor for TestPlugin {
    async fn pre_process(
        &self,
        _ctx: &OperationContext,
        mut args: OperationArgs,
    ) -> AppResult<OperationArgs> {
        self.log.push(format!("pre:{}", self.name));
        match &self.pre {
            Some(Err(reason)) => Err(AppError::validation(reason.clone())),
            _ => {
                args.insert(&format!("pre:{}", self.name), true);
                Ok(args)
            }
        }
    }
}

#[async_trait]
impl PostProcessor for TestPlugin {
    async fn post_process(
        &self,
        _ctx: &OperationContext,
        mut result: OperationResult,
    ) -> AppResult<OperationResult> {
        self.log.push(format!("post:{}", self.name));
        match &self.post {
            Some(Err(reason)) => Err(AppError::internal(reason.clone())),
            _ => {
                result.message = format!("{} +{}", result.message, self.name);
                Ok(result)
            }
        }
    }
}

#[async_trait]
impl StreamProcessor for TestPlugin {
    async fn process_stream(&self, _ctx: &OperationContext, chunk: Bytes) -> AppResult<Bytes> {
        Ok(chunk)
    }
}

#[async_trait]
impl BatchProcessor for TestPlugin {
    async fn process_batch(
        &self,
        _ctx: &OperationContext,
        batch: Vec<OperationArgs>,
    ) -> AppResult<Vec<OperationResult>> {
        Ok(batch.iter().map(|_| self.result()).collect())
    }
}

#[async_trait]
impl SelectProcessor for TestPlugin {
    async fn select(
        &self,
        _ctx: &OperationContext,
        expression: &str,
        content: Bytes,
    ) -> AppResult<serde_json::Value> {
        Ok(serde_json::json!({ "expression": expression, "bytes": content.len() }))
    }
}
