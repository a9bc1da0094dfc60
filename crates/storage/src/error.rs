//! Storage error types and result alias.
//!
//! This module defines the error types that can occur during record store
//! operations. Every [`RecordFamily`](crate::RecordFamily) implementation maps
//! its internal errors to these standardized variants.
//!
//! # Error Types
//!
//! - [`StorageError::NoSuchFamily`] - The column family has not been provisioned
//! - [`StorageError::FamilyExists`] - A create was issued for a family that already exists
//! - [`StorageError::Connection`] - Network or connection-related failures
//! - [`StorageError::Internal`] - Backend-specific internal errors
//! - [`StorageError::Timeout`] - Operation exceeded time limit
//!
//! # Example
//!
//! ```
//! use proteus_session_storage::{StorageError, StorageResult};
//!
//! fn lookup(family: &str) -> StorageResult<()> {
//!     Err(StorageError::no_such_family(family))
//! }
//!
//! assert!(lookup("session_store").unwrap_err().is_missing_family());
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for record store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during record store operations.
///
/// Errors preserve their source chain via the `#[source]` attribute, enabling
/// debugging tools to display the full error context.
///
/// # Non-exhaustive
///
/// New variants may be added in future minor releases without a
/// semver-breaking change. Downstream match expressions must include a
/// wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The column family does not exist in the keyspace.
    ///
    /// Raised by reads and writes against a family that was never created.
    /// Provisioning treats this as "create the family", every other caller
    /// treats it as an ordinary failure.
    #[error("No such column family: {family}")]
    NoSuchFamily {
        /// Name of the missing family.
        family: String,
    },

    /// The column family already exists.
    #[error("Column family already exists: {family}")]
    FamilyExists {
        /// Name of the family that was already present.
        family: String,
    },

    /// Connection or network error.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying error that caused this connection failure.
        #[source]
        source: Option<BoxError>,
    },

    /// Internal storage backend error.
    ///
    /// Catch-all for backend-specific errors that don't fit other categories.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
        /// The underlying error that caused this internal failure.
        #[source]
        source: Option<BoxError>,
    },

    /// Operation timed out.
    #[error("Operation timeout")]
    Timeout,
}

impl StorageError {
    /// Creates a new `NoSuchFamily` error for the given family.
    #[must_use]
    pub fn no_such_family(family: impl Into<String>) -> Self {
        Self::NoSuchFamily { family: family.into() }
    }

    /// Creates a new `FamilyExists` error for the given family.
    #[must_use]
    pub fn family_exists(family: impl Into<String>) -> Self {
        Self::FamilyExists { family: family.into() }
    }

    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Internal` error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Creates a new `Internal` error with a message and source error.
    #[must_use]
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Returns `true` when the error means the family has not been provisioned.
    #[must_use]
    pub fn is_missing_family(&self) -> bool {
        matches!(self, Self::NoSuchFamily { .. })
    }

    /// Returns `true` for failures that may succeed if the call is repeated.
    ///
    /// Nothing in this workspace retries automatically; the predicate exists
    /// for callers layering their own retry policy on top.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout)
    }
}
