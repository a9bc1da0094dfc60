//! The [`SessionStore`] facade.

use std::{sync::Arc, time::Duration};

use proteus_session_storage::{Keyspace, Row};
use tracing::Instrument;

use crate::{
    accessor::SessionAccessor,
    config::SessionConfig,
    error::{ConfigError, Result},
    gate::{Families, ReadinessGate, ReadyOutcome, ReadyState},
    ticket::TicketManager,
    token::TokenExchange,
    types::{Ticket, Token, UserId},
};

struct Inner {
    keyspace: String,
    config: SessionConfig,
    gate: ReadinessGate,
}

/// Session, ticket and token operations over one keyspace.
///
/// Construction starts provisioning in the background. Every operation waits
/// for it to finish: operations issued early are queued and run in arrival
/// order once both column families are confirmed, and all of them fail with
/// the same [`SessionError::Provisioning`](crate::SessionError::Provisioning)
/// if it failed.
///
/// Cloning is cheap; clones share the readiness gate and family handles.
///
/// # Examples
///
/// ```
/// use proteus_session::{SessionConfig, SessionStore, UserId};
/// use proteus_session_storage::{MemoryKeyspace, Row};
///
/// #[tokio::main]
/// async fn main() -> Result<(), proteus_session::SessionError> {
///     let store = SessionStore::new(&MemoryKeyspace::new(), SessionConfig::default())?;
///     let user = UserId::from("100");
///
///     store.set_session(&user, Row::new().with("name", "test")).await?;
///     let ticket = store.create_ticket(&user).await?;
///
///     let token = store.create_token(&ticket).await?;
///     let relayed = store.exchange_token(&token).await?;
///     assert_eq!(store.get_id(&relayed).await?, Some(user));
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("keyspace", &self.inner.keyspace)
            .field("config", &self.inner.config)
            .field("state", &self.inner.gate.state())
            .finish()
    }
}

impl SessionStore {
    /// Binds to `keyspace` and spawns provisioning of both families.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`](crate::SessionError::Config) if
    /// `config` fails validation.
    pub fn new<K>(keyspace: &K, config: SessionConfig) -> Result<Self>
    where
        K: Keyspace + ?Sized,
    {
        config.validate()?;

        let families = Families {
            store: keyspace.family(config.store_family()),
            ticket: keyspace.family(config.ticket_family()),
        };
        let inner = Arc::new(Inner {
            keyspace: keyspace.name().to_owned(),
            config,
            gate: ReadinessGate::new(),
        });

        let span = tracing::info_span!("session_store", keyspace = %inner.keyspace);
        let task = Arc::clone(&inner);
        tokio::spawn(
            async move {
                // Only `provision` resolves this gate.
                let _ = task.gate.provision(families).await;
            }
            .instrument(span),
        );

        Ok(Self { inner })
    }

    /// The validated configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Name of the bound keyspace.
    #[must_use]
    pub fn keyspace(&self) -> &str {
        &self.inner.keyspace
    }

    /// Current provisioning phase.
    #[must_use]
    pub fn state(&self) -> ReadyState {
        self.inner.gate.state()
    }

    /// Waits for provisioning and returns the family handles.
    ///
    /// # Errors
    ///
    /// Returns the provisioning failure, if any.
    pub async fn ready(&self) -> ReadyOutcome {
        self.inner.gate.ensure_ready().await
    }

    /// Registers a callback for the provisioning outcome.
    ///
    /// See [`ReadinessGate::on_ready`].
    pub fn on_ready(&self, callback: impl FnOnce(ReadyOutcome) + Send + 'static) {
        self.inner.gate.on_ready(callback);
    }

    /// Issues a ticket for `user_id` with the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns a provisioning or storage failure, or
    /// [`SessionError::RetryExhausted`](crate::SessionError::RetryExhausted)
    /// if every candidate collided.
    #[tracing::instrument(skip(self))]
    pub async fn create_ticket(&self, user_id: &UserId) -> Result<Ticket> {
        self.create_ticket_with_ttl(user_id, self.inner.config.ticket_ttl()).await
    }

    /// Issues a ticket for `user_id` that expires after `ttl`.
    ///
    /// # Errors
    ///
    /// Same as [`create_ticket`](Self::create_ticket), and
    /// [`ConfigError::ZeroExpire`] when `ttl` is zero.
    #[tracing::instrument(skip(self))]
    pub async fn create_ticket_with_ttl(&self, user_id: &UserId, ttl: Duration) -> Result<Ticket> {
        if ttl.is_zero() {
            return Err(ConfigError::ZeroExpire.into());
        }
        let families = self.ready().await?;
        TicketManager::new(families.ticket.as_ref(), self.inner.config.max_ticket_attempts())
            .issue(user_id, ttl)
            .await
    }

    /// Resolves a ticket to its user id, `None` when unknown or expired.
    ///
    /// # Errors
    ///
    /// Returns a provisioning or storage failure.
    #[tracing::instrument(skip_all)]
    pub async fn get_id(&self, ticket: &Ticket) -> Result<Option<UserId>> {
        let families = self.ready().await?;
        TicketManager::new(families.ticket.as_ref(), self.inner.config.max_ticket_attempts())
            .resolve(ticket)
            .await
    }

    /// Merges `attributes` into the user's session row without expiry.
    ///
    /// # Errors
    ///
    /// Returns a provisioning or storage failure.
    #[tracing::instrument(skip(self, attributes), fields(columns = attributes.len()))]
    pub async fn set_session(&self, user_id: &UserId, attributes: Row) -> Result<()> {
        let families = self.ready().await?;
        SessionAccessor::new(families.store.as_ref(), families.ticket.as_ref())
            .set(user_id, attributes)
            .await
    }

    /// Reads session attributes; an empty `columns` reads every column.
    ///
    /// # Errors
    ///
    /// Returns a provisioning or storage failure.
    #[tracing::instrument(skip(self))]
    pub async fn get_session(&self, user_id: &UserId, columns: &[&str]) -> Result<Option<Row>> {
        let families = self.ready().await?;
        SessionAccessor::new(families.store.as_ref(), families.ticket.as_ref())
            .get(user_id, columns)
            .await
    }

    /// Resolves a ticket and reads the owner's attributes with `id` set.
    ///
    /// Returns `None` only when the ticket does not resolve.
    ///
    /// # Errors
    ///
    /// Returns a provisioning or storage failure.
    #[tracing::instrument(skip(self, ticket))]
    pub async fn get_ticket_session(&self, ticket: &Ticket, columns: &[&str]) -> Result<Option<Row>> {
        let families = self.ready().await?;
        SessionAccessor::new(families.store.as_ref(), families.ticket.as_ref())
            .get_by_ticket(ticket, columns)
            .await
    }

    /// Like [`get_ticket_session`](Self::get_ticket_session), also returning
    /// the ticket's owner.
    #[tracing::instrument(skip(self, ticket))]
    pub(crate) async fn get_ticket_session_with_owner(
        &self,
        ticket: &Ticket,
        columns: &[&str],
    ) -> Result<Option<(UserId, Row)>> {
        let families = self.ready().await?;
        SessionAccessor::new(families.store.as_ref(), families.ticket.as_ref())
            .get_with_owner(ticket, columns)
            .await
    }

    /// Mints a short-lived token for a live ticket.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidTicket`](crate::SessionError::InvalidTicket)
    /// for an unknown or expired ticket, or a provisioning or storage failure.
    #[tracing::instrument(skip_all)]
    pub async fn create_token(&self, ticket: &Ticket) -> Result<Token> {
        let families = self.ready().await?;
        TokenExchange::new(families.ticket.as_ref()).create(ticket).await
    }

    /// Returns the ticket a token was minted for.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidToken`](crate::SessionError::InvalidToken)
    /// for an unknown or expired token, or a provisioning or storage failure.
    #[tracing::instrument(skip_all)]
    pub async fn exchange_token(&self, token: &Token) -> Result<Ticket> {
        let families = self.ready().await?;
        TokenExchange::new(families.ticket.as_ref()).exchange(token).await
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use proteus_session_storage::MemoryKeyspace;

    use super::*;
    use crate::error::SessionError;

    #[tokio::test]
    async fn test_rejects_invalid_deserialized_config() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"storeFamily":"x","ticketFamily":"x"}"#).expect("parses");

        let err = SessionStore::new(&MemoryKeyspace::new(), config).expect_err("rejected");

        assert!(matches!(err, SessionError::Config(ConfigError::SharedFamily { .. })));
    }

    #[tokio::test]
    async fn test_zero_ttl_override_rejected() {
        let keyspace = MemoryKeyspace::new();
        let store = SessionStore::new(&keyspace, SessionConfig::default()).expect("valid config");

        let err = store
            .create_ticket_with_ttl(&UserId::from("u"), Duration::ZERO)
            .await
            .expect_err("zero ttl rejected");
        assert!(matches!(err, SessionError::Config(ConfigError::ZeroExpire)));

        let ticket = store
            .create_ticket_with_ttl(&UserId::from("u"), Duration::from_secs(1))
            .await
            .expect("one second is enough");
        assert_eq!(store.get_id(&ticket).await.expect("lookup"), Some(UserId::from("u")));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = SessionStore::new(&MemoryKeyspace::new(), SessionConfig::default())
            .expect("valid config");
        let clone = store.clone();

        store.ready().await.expect("ready");

        assert_eq!(clone.state(), ReadyState::Ready);
    }

    #[tokio::test]
    async fn test_debug_reports_keyspace() {
        let store = SessionStore::new(&MemoryKeyspace::named("ks"), SessionConfig::default())
            .expect("valid config");
        assert!(format!("{store:?}").contains("\"ks\""));
        assert_eq!(store.keyspace(), "ks");
    }
}
