//! Session error types.
//!
//! Lookups that find nothing (`get_id`, `get_session`, `get_ticket_session`)
//! return `Ok(None)`. Operations that act on a credential (`create_token`,
//! `exchange_token`) treat an unknown key as an error instead. The asymmetry
//! is part of the public contract: a lookup answers a question, an exchange
//! has a precondition.

use std::sync::Arc;

use proteus_session_storage::StorageError;
use thiserror::Error;

/// Errors returned by session operations.
///
/// # Non-exhaustive
///
/// New variants may be added in future minor releases without a
/// semver-breaking change. Downstream match expressions must include a
/// wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// Checking a column family failed for a reason other than "missing".
    ///
    /// Decided once at startup and returned to every caller afterwards; the
    /// store never re-provisions on its own.
    #[error("Provisioning of column family {family} failed: {source}")]
    Provisioning {
        /// Family whose existence check failed.
        family: String,
        /// The failure reported by the record store.
        #[source]
        source: Arc<StorageError>,
    },

    /// A read or write failed during a single operation.
    ///
    /// Only the operation that hit the failure sees it.
    #[error("Storage error: {0}")]
    Store(
        /// The underlying storage error.
        #[from]
        StorageError,
    ),

    /// The ticket does not exist or has expired.
    #[error("Wrong ticket")]
    InvalidTicket,

    /// The token does not exist or has expired.
    #[error("Wrong token")]
    InvalidToken,

    /// Every generated ticket candidate collided with an existing key.
    #[error("Ticket generation gave up after {attempts} colliding candidates")]
    RetryExhausted {
        /// Number of candidates tried.
        attempts: u32,
    },

    /// The provisioning task ended without resolving the readiness gate.
    #[error("Readiness gate closed before provisioning completed")]
    GateClosed,

    /// Configuration rejected at construction.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl SessionError {
    /// Creates a `RetryExhausted` error.
    #[must_use]
    pub fn retry_exhausted(attempts: u32) -> Self {
        Self::RetryExhausted { attempts }
    }

    /// Returns `true` for the errors that mean "no such ticket or token".
    #[must_use]
    pub fn is_invalid_credential(&self) -> bool {
        matches!(self, Self::InvalidTicket | Self::InvalidToken)
    }
}

/// Reasons a [`SessionConfig`](crate::SessionConfig) is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A family name was empty.
    #[error("{field} must not be empty")]
    EmptyFamilyName {
        /// Name of the offending option.
        field: &'static str,
    },

    /// Session attributes and tickets would share one family.
    #[error("storeFamily and ticketFamily must differ (both are {name:?})")]
    SharedFamily {
        /// The shared family name.
        name: String,
    },

    /// Ticket lifetime of zero seconds.
    #[error("expire must be at least one second")]
    ZeroExpire,

    /// No ticket candidates would ever be tried.
    #[error("maxTicketAttempts must be at least one")]
    ZeroTicketAttempts,
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(SessionError::InvalidTicket.to_string(), "Wrong ticket");
        assert_eq!(SessionError::InvalidToken.to_string(), "Wrong token");
        assert_eq!(
            SessionError::retry_exhausted(5).to_string(),
            "Ticket generation gave up after 5 colliding candidates"
        );
    }

    #[test]
    fn test_store_error_preserves_source_chain() {
        let err: SessionError = StorageError::timeout().into();
        assert!(matches!(err, SessionError::Store(_)));

        let source = err.source().expect("source chain must be preserved");
        assert_eq!(source.to_string(), "Operation timeout");
    }

    #[test]
    fn test_provisioning_error_shares_source() {
        let source = Arc::new(StorageError::connection("refused"));
        let first = SessionError::Provisioning { family: "f".into(), source: Arc::clone(&source) };
        let second = SessionError::Provisioning { family: "f".into(), source };

        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(
            first.source().expect("source").to_string(),
            "Connection error: refused"
        );
    }

    #[test]
    fn test_invalid_credential_predicate() {
        assert!(SessionError::InvalidTicket.is_invalid_credential());
        assert!(SessionError::InvalidToken.is_invalid_credential());
        assert!(!SessionError::GateClosed.is_invalid_credential());
    }
}
