//! # s3hub-core
//!
//! Core crate for s3hub. Contains the storage operation identifiers,
//! configuration schemas, and the unified error system shared by the
//! plugin runtime and the host binary.
//!
//! This crate has **no** internal dependencies on other s3hub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
pub use types::S3Operation;
