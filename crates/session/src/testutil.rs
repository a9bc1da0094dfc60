//! Shared test utilities for session store testing.
//!
//! Feature-gated behind `testutil`. Builds [`SessionStore`]s over a
//! [`ScriptedKeyspace`] so tests can inject storage failures, fake ticket
//! collisions, and hold provisioning open.
//!
//! ```toml
//! [dev-dependencies]
//! proteus-session = { path = "../session", features = ["testutil"] }
//! ```

use proteus_session_storage::{MemoryKeyspace, testutil::ScriptedKeyspace};

use crate::{config::SessionConfig, store::SessionStore};

/// A store over a fresh scripted keyspace, not yet awaited.
///
/// Neither family exists, so provisioning will create both.
#[must_use]
pub fn scripted_store(config: SessionConfig) -> (SessionStore, ScriptedKeyspace) {
    let keyspace = ScriptedKeyspace::new(MemoryKeyspace::new());
    let store = SessionStore::new(&keyspace, config).expect("valid test config");
    (store, keyspace)
}

/// A store with default configuration whose provisioning has completed.
pub async fn ready_store() -> (SessionStore, ScriptedKeyspace) {
    let (store, keyspace) = scripted_store(SessionConfig::default());
    store.ready().await.expect("provisioning");
    (store, keyspace)
}

/// A store whose provisioning is held at its first family check.
///
/// Call `keyspace.scripted(store.config().store_family()).resume()` to let
/// it finish.
#[must_use]
pub fn held_store(config: SessionConfig) -> (SessionStore, ScriptedKeyspace) {
    let keyspace = ScriptedKeyspace::new(MemoryKeyspace::new());
    keyspace.scripted(config.store_family()).pause();
    let store = SessionStore::new(&keyspace, config).expect("valid test config");
    (store, keyspace)
}

/// Assert that a session result failed with the given variant pattern.
#[macro_export]
macro_rules! assert_session_err {
    ($result:expr, $pattern:pat) => {
        match $result {
            Err($pattern) => {},
            other => panic!(
                "expected Err({}), got: {:?}",
                stringify!($pattern),
                other,
            ),
        }
    };
}

/// Assert that a session result is `Ok`, returning the inner value.
#[macro_export]
macro_rules! assert_session_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got SessionError: {e:?}"),
        }
    };
}
