//! Configuration for [`SessionStore`](crate::SessionStore).
//!
//! Options can be built in code with [`SessionConfig::builder`] or
//! deserialized from any serde format using the option names `storeFamily`,
//! `ticketFamily`, `expire` and `maxTicketAttempts`. Any other option is
//! ignored.
//!
//! ```
//! use proteus_session::SessionConfig;
//!
//! let config = SessionConfig::builder()
//!     .ticket_family("tickets")
//!     .expire(3600)
//!     .build()?;
//! assert_eq!(config.store_family(), "session_store");
//! assert_eq!(config.ticket_ttl().as_secs(), 3600);
//! # Ok::<(), proteus_session::ConfigError>(())
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default family for session attribute rows.
pub const DEFAULT_STORE_FAMILY: &str = "session_store";

/// Default family for ticket and token rows.
pub const DEFAULT_TICKET_FAMILY: &str = "session_ticket";

/// Default ticket lifetime in seconds (30 days).
pub const DEFAULT_EXPIRE_SECS: u64 = 60 * 60 * 24 * 30;

/// Default number of ticket candidates tried before giving up.
pub const DEFAULT_MAX_TICKET_ATTEMPTS: u32 = 5;

/// Configuration for a [`SessionStore`](crate::SessionStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Family holding session attributes keyed by user id.
    #[serde(default = "default_store_family")]
    pub(crate) store_family: String,

    /// Family holding ticket and token rows.
    #[serde(default = "default_ticket_family")]
    pub(crate) ticket_family: String,

    /// Ticket lifetime in seconds.
    #[serde(default = "default_expire")]
    pub(crate) expire: u64,

    /// Ticket candidates tried before failing with `RetryExhausted`.
    #[serde(default = "default_max_ticket_attempts")]
    pub(crate) max_ticket_attempts: u32,
}

fn default_store_family() -> String {
    DEFAULT_STORE_FAMILY.to_owned()
}

fn default_ticket_family() -> String {
    DEFAULT_TICKET_FAMILY.to_owned()
}

fn default_expire() -> u64 {
    DEFAULT_EXPIRE_SECS
}

fn default_max_ticket_attempts() -> u32 {
    DEFAULT_MAX_TICKET_ATTEMPTS
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_family: default_store_family(),
            ticket_family: default_ticket_family(),
            expire: default_expire(),
            max_ticket_attempts: default_max_ticket_attempts(),
        }
    }
}

#[bon::bon]
impl SessionConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Optional Fields
    ///
    /// * `store_family` - Session attribute family (default: `session_store`).
    /// * `ticket_family` - Ticket/token family (default: `session_ticket`).
    /// * `expire` - Ticket lifetime in seconds (default: 30 days).
    /// * `max_ticket_attempts` - Collision retry cap (default: 5).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a family name is empty, both families
    /// share a name, or `expire`/`max_ticket_attempts` is zero.
    #[builder]
    pub fn new(
        #[builder(into, default = default_store_family())] store_family: String,
        #[builder(into, default = default_ticket_family())] ticket_family: String,
        #[builder(default = DEFAULT_EXPIRE_SECS)] expire: u64,
        #[builder(default = DEFAULT_MAX_TICKET_ATTEMPTS)] max_ticket_attempts: u32,
    ) -> Result<Self, ConfigError> {
        let config = Self { store_family, ticket_family, expire, max_ticket_attempts };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants enforced by the builder.
    ///
    /// Deserialized configurations bypass the builder, so
    /// [`SessionStore::new`](crate::SessionStore::new) calls this again.
    ///
    /// # Errors
    ///
    /// See [`SessionConfig::new`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_family.is_empty() {
            return Err(ConfigError::EmptyFamilyName { field: "storeFamily" });
        }
        if self.ticket_family.is_empty() {
            return Err(ConfigError::EmptyFamilyName { field: "ticketFamily" });
        }
        if self.store_family == self.ticket_family {
            return Err(ConfigError::SharedFamily { name: self.store_family.clone() });
        }
        if self.expire == 0 {
            return Err(ConfigError::ZeroExpire);
        }
        if self.max_ticket_attempts == 0 {
            return Err(ConfigError::ZeroTicketAttempts);
        }
        Ok(())
    }

    /// Family holding session attributes.
    #[must_use]
    pub fn store_family(&self) -> &str {
        &self.store_family
    }

    /// Family holding tickets and tokens.
    #[must_use]
    pub fn ticket_family(&self) -> &str {
        &self.ticket_family
    }

    /// Ticket lifetime in seconds.
    #[must_use]
    pub fn expire(&self) -> u64 {
        self.expire
    }

    /// Ticket lifetime.
    #[must_use]
    pub fn ticket_ttl(&self) -> Duration {
        Duration::from_secs(self.expire)
    }

    /// Collision retry cap for ticket creation.
    #[must_use]
    pub fn max_ticket_attempts(&self) -> u32 {
        self.max_ticket_attempts
    }
}
