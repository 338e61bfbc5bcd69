//! # s3hub-plugin
//!
//! Plugin runtime for s3hub. Provides:
//!
//! - Capability contracts a plugin may implement (executor, pre/post
//!   processors, stream/batch/select processors, conditional gate, priority)
//! - A registry keeping per-operation and per-capability lists consistent
//! - A dispatcher running pre-processors, priority-ordered plugins with
//!   per-plugin deadlines, and post-processors
//! - The [`PluginManager`] composition root guarding the registry

pub mod capabilities;
pub mod context;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod macros;
pub mod manager;
pub mod observer;
pub mod prelude;
pub mod registry;
pub mod result;

pub use capabilities::{Plugin, PluginMetadata, Priority};
pub use context::{OperationArgs, OperationContext, PluginSettings};
pub use descriptor::{Capability, PluginDescriptor};
pub use dispatcher::Dispatcher;
pub use error::PluginError;
pub use manager::{PluginManager, PluginSummary};
pub use observer::{OutcomeObserver, OutcomeStatus, PluginOutcome, RecordingObserver};
pub use registry::Registry;
pub use result::OperationResult;

pub use s3hub_core::types::S3Operation;
