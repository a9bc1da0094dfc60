//! Ticket-based session store for proteus services.
//!
//! Issues opaque tickets bound to a user id, stores per-user session
//! attributes, and mints short-lived tokens that hand a ticket to a second
//! device. Everything lives in two column families of a
//! [`Keyspace`](proteus_session_storage::Keyspace), which are verified (and
//! created when missing) in the background when a [`SessionStore`] is built.
//!
//! # Data Layout
//!
//! | Family            | Row key  | Columns          | Expiry             |
//! |-------------------|----------|------------------|--------------------|
//! | `session_store`   | user id  | any attributes   | none               |
//! | `session_ticket`  | ticket   | `id`             | `expire` (30 days) |
//! | `session_ticket`  | token    | `ticket`         | 300 seconds        |
//!
//! # Quick Start
//!
//! ```
//! use proteus_session::{SessionConfig, SessionStore, UserId};
//! use proteus_session_storage::{MemoryKeyspace, Row};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), proteus_session::SessionError> {
//!     let store = SessionStore::new(&MemoryKeyspace::new(), SessionConfig::default())?;
//!     let user = UserId::from("100");
//!
//!     let ticket = store.create_ticket(&user).await?;
//!     store.set_session(&user, Row::new().with("name", "test").with("value", 100)).await?;
//!
//!     let session = store.get_ticket_session(&ticket, &["name"]).await?;
//!     assert_eq!(session.and_then(|row| row.get_str("id").map(str::to_owned)), Some("100".into()));
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with scripted store constructors and
//!   assertion macros.
//! - **`failpoints`**: Forwards to the storage crate's fail points.

#![deny(unsafe_code)]

pub mod accessor;
pub mod config;
pub mod error;
pub mod gate;
pub mod middleware;
pub mod store;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
pub mod ticket;
pub mod token;
pub mod types;

pub use accessor::SessionAccessor;
pub use config::SessionConfig;
pub use error::{ConfigError, Result, SessionError};
pub use gate::{Families, GateAlreadyResolved, ProvisioningFailure, ReadinessGate, ReadyOutcome, ReadyState};
pub use middleware::{DEFAULT_SESSION_HEADER, RequestSession, SessionMiddleware};
pub use proteus_session_storage::Row;
pub use store::SessionStore;
pub use ticket::{TicketManager, generate_ticket};
pub use token::{TOKEN_TTL, TokenExchange, generate_token};
pub use types::{Ticket, Token, UserId};
