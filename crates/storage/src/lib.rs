//! Column-family record store abstraction for proteus-session.
//!
//! This crate provides the [`Keyspace`] and [`RecordFamily`] traits that the
//! session core talks to, the sparse [`Row`] column map, and an in-memory
//! implementation used for development and tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    proteus-session                          │
//! │     SessionStore │ tickets │ tokens │ session attributes    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                proteus-session-storage                      │
//! │          Keyspace ──► RecordFamily (get, set, create)       │
//! ├──────────────────┬──────────────────────────────────────────┤
//! │  MemoryKeyspace  │   column store adapters (out of tree)    │
//! │ (dev / testing)  │                                          │
//! └──────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use proteus_session_storage::{
//!     FamilySchema, Keyspace, MemoryKeyspace, Row, WriteOptions, single_row,
//! };
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let keyspace = MemoryKeyspace::new();
//!     let tickets = keyspace.family("session_ticket");
//!     tickets.create(&FamilySchema::utf8()).await?;
//!
//!     let row = Row::new().with("id", "100");
//!     tickets.set(single_row("ticket", row), WriteOptions::with_ttl(Duration::from_secs(60))).await?;
//!
//!     let found = tickets.get("ticket", &["id"]).await?;
//!     assert_eq!(found.and_then(|r| r.get_str("id").map(str::to_owned)), Some("100".into()));
//!     Ok(())
//! }
//! ```
//!
//! # Implementing a Backend
//!
//! 1. Implement [`RecordFamily`] for a family handle
//! 2. Implement [`Keyspace`] to hand those handles out by name
//! 3. Map backend-specific errors to [`StorageError`], reporting a missing family as
//!    [`StorageError::NoSuchFamily`] so provisioning can create it
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with scripted doubles and assertion macros.
//! - **`failpoints`**: Activates `fail` crate fail points on the in-memory keyspace.

#![deny(unsafe_code)]

pub mod error;
pub mod family;
pub mod memory;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

pub use error::{BoxError, StorageError, StorageResult};
pub use family::{
    FamilySchema, Keyspace, RecordFamily, Row, RowMutations, SENTINEL_KEY, Validation,
    WriteOptions, single_row,
};
pub use memory::{MemoryFamily, MemoryKeyspace};
