//! Prelude for convenient imports when writing plugins.

pub use async_trait::async_trait;
pub use bytes::Bytes;

pub use s3hub_core::error::AppError;
pub use s3hub_core::result::AppResult;
pub use s3hub_core::types::S3Operation;

pub use crate::capabilities::{
    BatchProcessor, ConditionalPlugin, Plugin, PluginMetadata, PostProcessor, PreProcessor,
    PrioritizedPlugin, Priority, SelectProcessor, StreamProcessor,
};
pub use crate::context::{OperationArgs, OperationContext, PluginSettings};
pub use crate::descriptor::{Capability, PluginDescriptor};
pub use crate::result::OperationResult;

pub use crate::{operation_args, operations, plugin_metadata};
