//! Convenience result type alias for s3hub.

use crate::error::AppError;

/// A specialized `Result` type for s3hub operations.
///
/// Plugin contracts and manager operations all return this so that
/// every crate does not need to write `Result<T, AppError>` explicitly.
pub type AppResult<T> = Result<T, AppError>;
