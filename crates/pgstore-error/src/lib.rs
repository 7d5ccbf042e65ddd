//! Error type for the pgstore data plane.
//!
//! The mutation API itself never returns errors: misusing a transaction is
//! a programming error and asserts at the call site. `PgError` carries the
//! failures of the fallible surfaces around the core — the debug-mode
//! transaction validator and the typed omap payload helpers.

use pgstore_types::ObjectId;
use thiserror::Error;

/// Primary error type for pgstore operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PgError {
    /// The clone/rename source graph contains a cycle.
    ///
    /// Acyclicity is a caller obligation; the traversal assumes it and the
    /// validator detects it.
    #[error("clone/rename graph has a cycle through {object}")]
    CloneCycle { object: ObjectId },

    /// A clone-range source is modified by the same transaction.
    #[error("clone_range source {source} is modified by the same transaction (target {target})")]
    CloneRangeSourceModified { source: ObjectId, target: ObjectId },

    /// A rename source was touched again after the rename consumed it.
    #[error("rename source {source} referenced after rename onto {target}")]
    RenameSourceRevived { source: ObjectId, target: ObjectId },

    /// An encoded omap payload does not parse.
    #[error("malformed omap payload: {detail}")]
    OmapDecode { detail: String },
}

impl PgError {
    /// Create an omap decode error.
    pub fn omap_decode(detail: impl Into<String>) -> Self {
        Self::OmapDecode {
            detail: detail.into(),
        }
    }

    /// Whether this error reports a violated caller obligation (as opposed
    /// to malformed input data).
    #[must_use]
    pub const fn is_caller_obligation(&self) -> bool {
        matches!(
            self,
            Self::CloneCycle { .. }
                | Self::CloneRangeSourceModified { .. }
                | Self::RenameSourceRevived { .. }
        )
    }
}

/// Result type alias using `PgError`.
pub type Result<T> = std::result::Result<T, PgError>;
