//! Per-call context and arguments handed to plugins.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use s3hub_core::types::S3Operation;

/// Settings object passed to [`Plugin::initialize`](crate::Plugin::initialize).
pub type PluginSettings = Map<String, Value>;

/// Context for a single operation call.
///
/// The storage fields are owned by the caller and passed through untouched.
/// The dispatcher replaces the cancellation token and deadline with a
/// bounded derivative for every plugin invocation.
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// The operation being performed.
    pub operation: S3Operation,
    /// Target bucket, if any.
    pub bucket: Option<String>,
    /// Target object key, if any.
    pub key: Option<String>,
    /// Storage region, if any.
    pub region: Option<String>,
    /// Caller-supplied metadata.
    pub metadata: HashMap<String, String>,
    /// Identifier correlating log lines and outcomes for this call.
    pub request_id: Uuid,
    /// When the call started.
    pub started_at: DateTime<Utc>,
    /// Cancellation signal.
    cancel: CancellationToken,
    /// Absolute deadline, if any.
    deadline: Option<Instant>,
}

impl OperationContext {
    /// Creates a context with a fresh cancellation token and no deadline.
    pub fn new(operation: S3Operation) -> Self {
        Self {
            operation,
            bucket: None,
            key: None,
            region: None,
            metadata: HashMap::new(),
            request_id: Uuid::new_v4(),
            started_at: Utc::now(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Sets the bucket.
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    /// Sets the object key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Inserts a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Uses `token` as the caller's cancellation signal.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Sets an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns the cancellation token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns the deadline, if one is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns whether the call has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns a copy addressed to `operation`.
    pub(crate) fn for_operation(&self, operation: S3Operation) -> Self {
        let mut ctx = self.clone();
        ctx.operation = operation;
        ctx
    }

    /// Derives a context for one plugin invocation.
    ///
    /// The copy gets a child token (cancelled when the caller's token is)
    /// and a deadline no later than `now + timeout`.
    pub(crate) fn bounded(&self, timeout: Duration) -> Self {
        let limit = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(d) if d < limit => d,
            _ => limit,
        };

        let mut ctx = self.clone();
        ctx.cancel = self.cancel.child_token();
        ctx.deadline = Some(deadline);
        ctx
    }
}

/// Named arguments of an operation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationArgs(Map<String, Value>);

impl OperationArgs {
    /// Creates an empty argument set.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Inserts a value, builder style.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Inserts a value, returning the previous one.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.to_string(), value.into())
    }

    /// Removes a value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Gets a raw value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Gets a string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    /// Gets an i64 value.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(|v| v.as_i64())
    }

    /// Gets a bool value.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(|v| v.as_bool())
    }

    /// Returns whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the arguments.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Returns the underlying JSON map.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for OperationArgs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
