//! Operation dispatcher: runs one operation through the plugin pipeline.
//!
//! For every call:
//! - Pre-processors rewrite the arguments in registration order. The first
//!   failure aborts the call.
//! - Plugins run one at a time in priority order. A plugin whose gate
//!   declines is skipped. Each invocation is bounded by the per-plugin
//!   timeout and the caller's deadline; failures are logged and the loop
//!   moves on. The last successful result wins.
//! - Post-processors rewrite that result in registration order. The first
//!   failure aborts the call.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, error};

use s3hub_core::config::plugin::ManagerConfig;
use s3hub_core::types::S3Operation;

use crate::context::{OperationArgs, OperationContext};
use crate::error::PluginError;
use crate::observer::{OutcomeObserver, OutcomeStatus, PluginOutcome};
use crate::registry::{DispatchSnapshot, RegisteredPlugin};
use crate::result::OperationResult;

/// Executes the dispatch protocol over a registry snapshot.
#[derive(Debug)]
pub struct Dispatcher {
    /// Time budget for a single plugin invocation.
    plugin_timeout: Duration,
    /// Whether pre-processors run.
    pre_processing: bool,
    /// Whether post-processors run.
    post_processing: bool,
    /// Bounds plugin invocations in flight across all calls.
    admission: Option<Arc<Semaphore>>,
    /// Receives every plugin outcome.
    observer: Option<Arc<dyn OutcomeObserver>>,
}

impl Dispatcher {
    /// Creates a dispatcher from manager settings.
    ///
    /// A concurrency limit above [`Semaphore::MAX_PERMITS`] is clamped to it.
    pub fn new(config: &ManagerConfig) -> Self {
        let admission = match config.max_concurrent_plugins {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n.min(Semaphore::MAX_PERMITS)))),
        };

        Self {
            plugin_timeout: config.plugin_timeout(),
            pre_processing: config.enable_pre_processing,
            post_processing: config.enable_post_processing,
            admission,
            observer: None,
        }
    }

    /// Installs an outcome observer.
    pub fn with_observer(mut self, observer: Arc<dyn OutcomeObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Returns the number of free admission permits, if the gate is enabled.
    pub fn available_permits(&self) -> Option<usize> {
        self.admission.as_ref().map(|s| s.available_permits())
    }

    /// Dispatches `operation` over `snapshot`.
    pub async fn dispatch(
        &self,
        operation: S3Operation,
        snapshot: DispatchSnapshot,
        ctx: &OperationContext,
        args: OperationArgs,
    ) -> Result<OperationResult, PluginError> {
        if snapshot.plugins.is_empty() {
            debug!(operation = %operation, "No plugins registered for operation");
            return Ok(OperationResult::no_plugins_registered());
        }

        let ctx = ctx.for_operation(operation);

        debug!(
            operation = %operation,
            request_id = %ctx.request_id,
            plugin_count = snapshot.plugins.len(),
            "Dispatching operation"
        );

        let args = if self.pre_processing {
            self.pre_process(&snapshot.pre_processors, &ctx, args).await?
        } else {
            args
        };

        let mut last_success = None;

        for entry in &snapshot.plugins {
            if let Some(gate) = entry.descriptor().condition() {
                if !gate.should_execute(&ctx, &args) {
                    self.report(entry, &ctx, OutcomeStatus::Skipped, Duration::ZERO);
                    continue;
                }
            }

            let started = Instant::now();
            let outcome = self.invoke(entry, &ctx, &args).await;
            let elapsed = started.elapsed();

            match outcome {
                Ok(result) => {
                    debug!(
                        operation = %operation,
                        plugin = %entry.name(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Plugin executed"
                    );
                    self.report(entry, &ctx, OutcomeStatus::Succeeded, elapsed);
                    last_success = Some(result);
                }
                Err(err) => {
                    error!(
                        operation = %operation,
                        plugin = %entry.name(),
                        request_id = %ctx.request_id,
                        error = %err,
                        "Plugin execution failed"
                    );
                    let status = match err {
                        PluginError::Timeout { .. } => OutcomeStatus::TimedOut,
                        PluginError::Cancelled { .. } => OutcomeStatus::Cancelled,
                        other => OutcomeStatus::Failed(other.to_string()),
                    };
                    self.report(entry, &ctx, status, elapsed);
                }
            }
        }

        let Some(result) = last_success else {
            debug!(operation = %operation, "No plugin completed successfully");
            return Ok(OperationResult::no_plugins_executed());
        };

        if self.post_processing {
            self.post_process(&snapshot.post_processors, &ctx, result)
                .await
        } else {
            Ok(result)
        }
    }

    /// Feeds the arguments through every pre-processor.
    async fn pre_process(
        &self,
        processors: &[RegisteredPlugin],
        ctx: &OperationContext,
        mut args: OperationArgs,
    ) -> Result<OperationArgs, PluginError> {
        for entry in processors {
            let Some(processor) = entry.descriptor().pre_processor() else {
                continue;
            };
            args = processor
                .pre_process(ctx, args)
                .await
                .map_err(|source| PluginError::PreProcessing {
                    plugin: entry.name().to_string(),
                    source,
                })?;
        }

        debug!(
            operation = %ctx.operation,
            processors = processors.len(),
            "Pre-processing complete"
        );
        Ok(args)
    }

    /// Feeds the result through every post-processor.
    async fn post_process(
        &self,
        processors: &[RegisteredPlugin],
        ctx: &OperationContext,
        mut result: OperationResult,
    ) -> Result<OperationResult, PluginError> {
        for entry in processors {
            let Some(processor) = entry.descriptor().post_processor() else {
                continue;
            };
            result = processor
                .post_process(ctx, result)
                .await
                .map_err(|source| PluginError::PostProcessing {
                    plugin: entry.name().to_string(),
                    source,
                })?;
        }

        debug!(
            operation = %ctx.operation,
            processors = processors.len(),
            "Post-processing complete"
        );
        Ok(result)
    }

    /// Runs one plugin under a bounded context.
    ///
    /// Waiting for an admission permit counts against the plugin's deadline.
    /// The bounded token is cancelled as soon as this returns. A panic inside
    /// the plugin is caught and reported as [`PluginError::Panicked`].
    async fn invoke(
        &self,
        entry: &RegisteredPlugin,
        ctx: &OperationContext,
        args: &OperationArgs,
    ) -> Result<OperationResult, PluginError> {
        let bounded = ctx.bounded(self.plugin_timeout);
        let _release = bounded.cancellation_token().clone().drop_guard();
        let budget = bounded.remaining().unwrap_or(self.plugin_timeout);
        let deadline = bounded
            .deadline()
            .unwrap_or_else(|| Instant::now() + self.plugin_timeout);
        let name = entry.name();

        let call = async {
            let _permit = match &self.admission {
                Some(gate) => Some(
                    gate.acquire()
                        .await
                        .map_err(|_| PluginError::AdmissionClosed)?,
                ),
                None => None,
            };

            let execution = entry.descriptor().plugin().execute(&bounded, args);
            match AssertUnwindSafe(execution).catch_unwind().await {
                Ok(result) => result.map_err(|source| PluginError::Execution {
                    plugin: name.to_string(),
                    source,
                }),
                Err(payload) => Err(PluginError::Panicked {
                    plugin: name.to_string(),
                    message: panic_message(payload.as_ref()),
                }),
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancellation_token().cancelled() => Err(PluginError::Cancelled {
                plugin: name.to_string(),
            }),
            _ = tokio::time::sleep_until(deadline) => Err(PluginError::Timeout {
                plugin: name.to_string(),
                after: budget,
            }),
            result = call => result,
        }
    }

    fn report(
        &self,
        entry: &RegisteredPlugin,
        ctx: &OperationContext,
        status: OutcomeStatus,
        elapsed: Duration,
    ) {
        let Some(observer) = &self.observer else {
            return;
        };
        observer.on_outcome(&PluginOutcome {
            plugin: entry.name().to_string(),
            operation: ctx.operation,
            request_id: ctx.request_id,
            status,
            elapsed,
        });
    }
}

/// Extracts the message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
