//! Built-in plugins registered by the host.

use std::collections::HashSet;

use serde_json::json;

use s3hub_plugin::prelude::*;

/// Cleans up the `key` argument before any plugin sees it.
#[derive(Debug, Default)]
pub struct KeyNormalizer;

impl KeyNormalizer {
    pub fn descriptor() -> PluginDescriptor {
        let plugin = std::sync::Arc::new(Self);
        PluginDescriptor::new(plugin.clone()).with_pre_processor(plugin)
    }
}

/// Trims whitespace and strips leading `/` from an object key.
pub fn normalize_key(key: &str) -> &str {
    key.trim().trim_start_matches('/')
}

#[async_trait]
impl Plugin for KeyNormalizer {
    fn metadata(&self) -> PluginMetadata {
        plugin_metadata!(
            name: "key-normalizer",
            version: env!("CARGO_PKG_VERSION"),
            description: "Normalizes object keys before dispatch"
        )
    }

    fn supported_operations(&self) -> HashSet<S3Operation> {
        S3Operation::ALL.into_iter().collect()
    }

    async fn initialize(&self, _settings: &PluginSettings) -> AppResult<()> {
        Ok(())
    }

    async fn cleanup(&self) -> AppResult<()> {
        Ok(())
    }

    async fn execute(
        &self,
        _ctx: &OperationContext,
        args: &OperationArgs,
    ) -> AppResult<OperationResult> {
        let key = args.get_str("key").map(normalize_key).unwrap_or_default();
        Ok(OperationResult::success(format!("key normalized to '{key}'"))
            .from_plugin("key-normalizer"))
    }
}

#[async_trait]
impl PreProcessor for KeyNormalizer {
    async fn pre_process(
        &self,
        _ctx: &OperationContext,
        mut args: OperationArgs,
    ) -> AppResult<OperationArgs> {
        if let Some(key) = args.get_str("key") {
            let normalized = normalize_key(key).to_string();
            args.insert("key", normalized);
        }
        Ok(args)
    }
}

/// Records what ran and stamps the final result.
#[derive(Debug, Default)]
pub struct AuditTrail;

impl AuditTrail {
    pub fn descriptor() -> PluginDescriptor {
        let plugin = std::sync::Arc::new(Self);
        PluginDescriptor::new(plugin.clone())
            .with_post_processor(plugin.clone())
            .with_priority_source(plugin)
    }
}

#[async_trait]
impl Plugin for AuditTrail {
    fn metadata(&self) -> PluginMetadata {
        plugin_metadata!(
            name: "audit-trail",
            version: env!("CARGO_PKG_VERSION"),
            description: "Records every dispatched operation"
        )
    }

    fn supported_operations(&self) -> HashSet<S3Operation> {
        S3Operation::ALL.into_iter().collect()
    }

    async fn initialize(&self, _settings: &PluginSettings) -> AppResult<()> {
        Ok(())
    }

    async fn cleanup(&self) -> AppResult<()> {
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &OperationContext,
        args: &OperationArgs,
    ) -> AppResult<OperationResult> {
        tracing::info!(
            operation = %ctx.operation,
            request_id = %ctx.request_id,
            bucket = ctx.bucket.as_deref().unwrap_or("-"),
            key = args.get_str("key").unwrap_or("-"),
            "Operation audited"
        );

        Ok(OperationResult::success(format!("{} recorded", ctx.operation))
            .with_data(json!({
                "operation": ctx.operation,
                "mutating": ctx.operation.is_mutating(),
                "bucket": ctx.bucket,
                "key": args.get_str("key"),
                "arguments": args,
            }))
            .from_plugin("audit-trail"))
    }
}

#[async_trait]
impl PostProcessor for AuditTrail {
    async fn post_process(
        &self,
        ctx: &OperationContext,
        mut result: OperationResult,
    ) -> AppResult<OperationResult> {
        let stamp = json!({
            "request_id": ctx.request_id,
            "started_at": ctx.started_at.to_rfc3339(),
            "finished_at": chrono::Utc::now().to_rfc3339(),
        });
        result.data = Some(match result.data.take() {
            Some(serde_json::Value::Object(mut data)) => {
                data.insert("audit".to_string(), stamp);
                serde_json::Value::Object(data)
            }
            Some(other) => json!({ "value": other, "audit": stamp }),
            None => json!({ "audit": stamp }),
        });
        Ok(result)
    }
}

impl PrioritizedPlugin for AuditTrail {
    fn priority(&self) -> Priority {
        Priority::Low
    }
}
