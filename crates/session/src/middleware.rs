//! Request-level session resolution.
//!
//! [`SessionMiddleware`] turns the value of a request header into a
//! [`RequestSession`]. It is framework-agnostic: adapters hand it the header
//! value (or a lookup closure) and attach the result to their request type.
//!
//! ```
//! use proteus_session::{SessionConfig, SessionMiddleware, SessionStore, UserId};
//! use proteus_session_storage::{MemoryKeyspace, Row};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), proteus_session::SessionError> {
//!     let store = SessionStore::new(&MemoryKeyspace::new(), SessionConfig::default())?;
//!     let user = UserId::from("100");
//!     store.set_session(&user, Row::new().with("name", "test")).await?;
//!     let ticket = store.create_ticket(&user).await?;
//!
//!     let middleware = SessionMiddleware::builder().store(store).columns(vec!["name".into()]).build();
//!     let session = middleware.resolve(Some(ticket.as_str())).await?.expect("known ticket");
//!     assert_eq!(session.user_id, user);
//!     assert_eq!(session.attributes.get_str("name"), Some("test"));
//!     Ok(())
//! }
//! ```

use proteus_session_storage::Row;

use crate::{
    error::Result,
    store::SessionStore,
    token::TICKET_COLUMN,
    types::{Ticket, UserId},
};

/// Header carrying the ticket unless configured otherwise.
pub const DEFAULT_SESSION_HEADER: &str = "X-Proteus-Session";

/// Session attached to a request whose ticket resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSession {
    /// Ticket presented with the request.
    pub ticket: Ticket,
    /// User the ticket resolved to.
    pub user_id: UserId,
    /// Requested session attributes, including `id` and `ticket`.
    pub attributes: Row,
}

/// Resolves the session ticket carried by a request header.
#[derive(Debug, Clone)]
pub struct SessionMiddleware {
    store: SessionStore,
    header: String,
    columns: Vec<String>,
}

#[bon::bon]
impl SessionMiddleware {
    /// Creates a middleware bound to `store`.
    ///
    /// # Optional Fields
    ///
    /// * `header` - Header name carrying the ticket (default: `X-Proteus-Session`).
    /// * `columns` - Attributes loaded per request (default: all).
    #[builder]
    pub fn new(
        store: SessionStore,
        #[builder(into, default = DEFAULT_SESSION_HEADER.to_owned())] header: String,
        #[builder(default)] columns: Vec<String>,
    ) -> Self {
        Self { store, header, columns }
    }

    /// Header name the ticket is read from.
    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Resolves a header value.
    ///
    /// Returns `Ok(None)` when the header is absent, blank, or carries a
    /// ticket that does not resolve; the request then proceeds without a
    /// session.
    ///
    /// # Errors
    ///
    /// Returns a provisioning or storage failure.
    #[tracing::instrument(skip_all, fields(header = %self.header))]
    pub async fn resolve(&self, header_value: Option<&str>) -> Result<Option<RequestSession>> {
        let Some(value) = header_value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(None);
        };
        let ticket = Ticket::from(value);

        let columns: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        let Some((user_id, mut attributes)) =
            self.store.get_ticket_session_with_owner(&ticket, &columns).await?
        else {
            tracing::debug!("session ticket did not resolve");
            return Ok(None);
        };
        attributes.insert(TICKET_COLUMN, ticket.as_str());

        Ok(Some(RequestSession { ticket, user_id, attributes }))
    }

    /// Resolves the configured header through `lookup`.
    ///
    /// `lookup` receives the header name and returns its value, if present.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub async fn resolve_from<'h, F>(&self, lookup: F) -> Result<Option<RequestSession>>
    where
        F: FnOnce(&str) -> Option<&'h str>,
    {
        let value = lookup(&self.header).map(str::to_owned);
        self.resolve(value.as_deref()).await
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use proteus_session_storage::MemoryKeyspace;

    use super::*;
    use crate::config::SessionConfig;

    async fn middleware(columns: Vec<String>) -> (SessionMiddleware, Ticket) {
        let store = SessionStore::new(&MemoryKeyspace::new(), SessionConfig::default())
            .expect("valid config");
        let user = UserId::from("100");
        store
            .set_session(&user, Row::new().with("name", "test").with("value", 100))
            .await
            .expect("set");
        let ticket = store.create_ticket(&user).await.expect("ticket");
        (SessionMiddleware::builder().store(store).columns(columns).build(), ticket)
    }

    #[tokio::test]
    async fn test_default_header() {
        let (middleware, _) = middleware(Vec::new()).await;
        assert_eq!(middleware.header(), DEFAULT_SESSION_HEADER);
    }

    #[tokio::test]
    async fn test_resolves_known_ticket() {
        let (middleware, ticket) = middleware(vec!["name".into()]).await;

        let session = middleware
            .resolve(Some(ticket.as_str()))
            .await
            .expect("resolve")
            .expect("session");

        assert_eq!(session.user_id, UserId::from("100"));
        assert_eq!(session.attributes.get_str("name"), Some("test"));
        assert_eq!(session.attributes.get_str("ticket"), Some(ticket.as_str()));
        assert!(!session.attributes.contains("value"));
    }

    #[tokio::test]
    async fn test_user_id_comes_from_ticket_owner() {
        let (middleware, ticket) = middleware(Vec::new()).await;
        middleware
            .store
            .set_session(&UserId::from("100"), Row::new().with("id", "spoofed"))
            .await
            .expect("set");

        let session = middleware
            .resolve(Some(ticket.as_str()))
            .await
            .expect("resolve")
            .expect("session");

        assert_eq!(session.user_id, UserId::from("100"));
        assert_eq!(session.attributes.get_str("id"), Some("100"));
    }

    #[tokio::test]
    async fn test_missing_or_blank_header_yields_no_session() {
        let (middleware, _) = middleware(Vec::new()).await;

        assert!(middleware.resolve(None).await.expect("resolve").is_none());
        assert!(middleware.resolve(Some("  ")).await.expect("resolve").is_none());
        assert!(middleware.resolve(Some("bogus")).await.expect("resolve").is_none());
    }

    #[tokio::test]
    async fn test_resolve_from_uses_configured_header() {
        let (middleware, ticket) = middleware(Vec::new()).await;
        let middleware = SessionMiddleware::builder()
            .store(middleware.store.clone())
            .header("X-Session")
            .build();
        let headers: HashMap<&str, &str> = HashMap::from([("X-Session", ticket.as_str())]);

        let session = middleware
            .resolve_from(|name| headers.get(name).copied())
            .await
            .expect("resolve");

        assert_eq!(session.map(|s| s.ticket), Some(ticket));
    }
}
