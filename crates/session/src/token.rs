//! Short-lived tokens that relay a ticket to another device.
//!
//! A token row lives in the ticket family under the token string, with a
//! single `ticket` column, and expires after [`TOKEN_TTL`]. Tokens are not
//! consumed on exchange; they stay valid until they expire.

use std::time::Duration;

use proteus_session_storage::{RecordFamily, Row, WriteOptions, single_row};
use rand::Rng;

use crate::{
    error::{Result, SessionError},
    ticket::lookup_user,
    types::{Ticket, Token},
};

/// Token lifetime.
pub const TOKEN_TTL: Duration = Duration::from_secs(300);

/// Characters per token.
pub const TOKEN_LENGTH: usize = 8;

/// Characters a token is drawn from.
pub const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Column of a token row holding the ticket.
pub const TICKET_COLUMN: &str = "ticket";

/// Draws a token from the thread-local RNG.
#[must_use]
pub fn generate_token() -> Token {
    let mut rng = rand::thread_rng();
    let token: String = (0..TOKEN_LENGTH)
        .map(|_| char::from(TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())]))
        .collect();
    Token::from(token)
}

/// Creates and redeems tokens against the ticket family.
#[derive(Debug)]
pub struct TokenExchange<'a> {
    family: &'a dyn RecordFamily,
}

impl<'a> TokenExchange<'a> {
    /// Creates an exchange over the ticket family.
    #[must_use]
    pub fn new(family: &'a dyn RecordFamily) -> Self {
        Self { family }
    }

    /// Mints a token for a live ticket.
    ///
    /// Token candidates are not checked for collisions; a colliding write
    /// overwrites the earlier token.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTicket`] if the ticket is unknown or
    /// expired, or [`SessionError::Store`] if a read or write fails.
    pub async fn create(&self, ticket: &Ticket) -> Result<Token> {
        if lookup_user(self.family, ticket).await?.is_none() {
            return Err(SessionError::InvalidTicket);
        }

        let token = generate_token();
        let row = Row::new().with(TICKET_COLUMN, ticket.as_str());
        self.family
            .set(single_row(token.as_str(), row), WriteOptions::with_ttl(TOKEN_TTL))
            .await?;
        Ok(token)
    }

    /// Returns the ticket a token was minted for.
    ///
    /// The ticket itself is not re-checked; it may have expired since.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidToken`] if the token is unknown or
    /// expired, or [`SessionError::Store`] if the read fails.
    pub async fn exchange(&self, token: &Token) -> Result<Ticket> {
        let row = self.family.get(token.as_str(), &[TICKET_COLUMN]).await?;
        row.and_then(|row| row.get_str(TICKET_COLUMN).map(Ticket::from))
            .ok_or(SessionError::InvalidToken)
    }
}
