//! Core type definitions used across the s3hub workspace.

pub mod operation;

pub use operation::S3Operation;
