//! Ticket issuance and resolution.
//!
//! A ticket row lives in the ticket family under the ticket string, with a
//! single `id` column holding the user id, and expires after the configured
//! lifetime.

use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use proteus_session_storage::{RecordFamily, Row, WriteOptions, single_row};
use rand::{RngCore, rngs::OsRng};

use crate::{
    error::{Result, SessionError},
    types::{Ticket, UserId},
};

/// Random bytes per ticket before encoding.
pub const TICKET_BYTES: usize = 24;

/// Encoded ticket length (standard base64 of [`TICKET_BYTES`]).
pub const TICKET_LENGTH: usize = 32;

/// Column of a ticket row holding the user id.
pub const ID_COLUMN: &str = "id";

/// Draws a ticket candidate from the operating system RNG.
#[must_use]
pub fn generate_ticket() -> Ticket {
    let mut bytes = [0u8; TICKET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Ticket::from(STANDARD.encode(bytes))
}

/// Resolves `ticket` to its user id with a single read of the `id` column.
pub(crate) async fn lookup_user(family: &dyn RecordFamily, ticket: &Ticket) -> Result<Option<UserId>> {
    let row = family.get(ticket.as_str(), &[ID_COLUMN]).await?;
    Ok(row.and_then(|row| row.get_str(ID_COLUMN).map(UserId::from)))
}

/// Issues and resolves tickets against the ticket family.
#[derive(Debug)]
pub struct TicketManager<'a> {
    family: &'a dyn RecordFamily,
    max_attempts: u32,
}

impl<'a> TicketManager<'a> {
    /// Creates a manager that tries at most `max_attempts` candidates.
    #[must_use]
    pub fn new(family: &'a dyn RecordFamily, max_attempts: u32) -> Self {
        Self { family, max_attempts }
    }

    /// Issues a fresh ticket for `user_id` that expires after `ttl`.
    ///
    /// Each candidate is checked for an existing live row first; a collision
    /// discards the candidate without writing it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RetryExhausted`] when every candidate
    /// collided, or [`SessionError::Store`] if a read or write fails.
    pub async fn issue(&self, user_id: &UserId, ttl: Duration) -> Result<Ticket> {
        self.issue_with(user_id, ttl, generate_ticket).await
    }

    pub(crate) async fn issue_with(
        &self,
        user_id: &UserId,
        ttl: Duration,
        mut candidates: impl FnMut() -> Ticket + Send,
    ) -> Result<Ticket> {
        for attempt in 1..=self.max_attempts {
            let candidate = candidates();
            if self.family.get(candidate.as_str(), &[ID_COLUMN]).await?.is_some() {
                tracing::debug!(attempt, "ticket candidate already taken; regenerating");
                continue;
            }

            let row = Row::new().with(ID_COLUMN, user_id.as_str());
            self.family
                .set(single_row(candidate.as_str(), row), WriteOptions::with_ttl(ttl))
                .await?;
            return Ok(candidate);
        }

        tracing::warn!(attempts = self.max_attempts, "every ticket candidate collided");
        Err(SessionError::retry_exhausted(self.max_attempts))
    }

    /// Resolves `ticket` to a user id, `None` when unknown or expired.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if the read fails.
    pub async fn resolve(&self, ticket: &Ticket) -> Result<Option<UserId>> {
        lookup_user(self.family, ticket).await
    }
}
