//! Storage operation identifiers.
//!
//! An [`S3Operation`] names the kind of object-store action a caller is
//! performing. The plugin runtime uses it only as a map key; the host
//! decides which operations it actually exposes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Kind of storage operation being intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum S3Operation {
    /// List objects under a bucket/prefix.
    List,
    /// Download an object.
    Get,
    /// Upload an object.
    Put,
    /// Delete an object.
    Delete,
    /// Copy an object to a new key.
    Copy,
    /// Move (copy then delete) an object.
    Move,
    /// Fetch object metadata only.
    Head,
    /// Create a bucket.
    CreateBucket,
    /// Delete a bucket.
    DeleteBucket,
    /// Synchronise a local tree with a bucket prefix.
    Sync,
}

impl S3Operation {
    /// Every operation, in declaration order.
    pub const ALL: [S3Operation; 10] = [
        Self::List,
        Self::Get,
        Self::Put,
        Self::Delete,
        Self::Copy,
        Self::Move,
        Self::Head,
        Self::CreateBucket,
        Self::DeleteBucket,
        Self::Sync,
    ];

    /// Returns the stable wire name of this operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Get => "get",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Copy => "copy",
            Self::Move => "move",
            Self::Head => "head",
            Self::CreateBucket => "create_bucket",
            Self::DeleteBucket => "delete_bucket",
            Self::Sync => "sync",
        }
    }

    /// Returns whether this operation changes bucket or object state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Put
                | Self::Delete
                | Self::Copy
                | Self::Move
                | Self::CreateBucket
                | Self::DeleteBucket
                | Self::Sync
        )
    }
}

impl fmt::Display for S3Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for S3Operation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == normalized)
            .ok_or_else(|| AppError::validation(format!("Unknown operation '{s}'")))
    }
}
