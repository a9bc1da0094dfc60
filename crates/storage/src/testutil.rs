//! Shared test utilities for record store testing.
//!
//! This module provides a programmable [`ScriptedFamily`] double that wraps a
//! real family and can inject failures, fake key collisions, or hold calls
//! until released, plus [`ScriptedKeyspace`] to hand those doubles out by
//! name. It is feature-gated behind `testutil` to prevent leaking into
//! production builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! proteus-session-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use proteus_session_storage::testutil::{ScriptedKeyspace, make_row};
//! ```

use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{
    error::{StorageError, StorageResult},
    family::{FamilySchema, Keyspace, RecordFamily, Row, RowMutations, WriteOptions},
    memory::MemoryKeyspace,
};

/// Produces a fresh error each time a scripted failure fires.
pub type ErrorFactory = Arc<dyn Fn(&str) -> StorageError + Send + Sync>;

/// A call observed by a [`ScriptedFamily`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    /// `get(key, columns)`.
    Get {
        /// Row key read.
        key: String,
        /// Columns requested.
        columns: Vec<String>,
    },
    /// `set(rows, options)`.
    Set {
        /// Row keys written, in key order.
        keys: Vec<String>,
        /// TTL applied to the write.
        ttl: Option<Duration>,
    },
    /// `create(schema)`.
    Create,
}

#[derive(Default)]
struct Script {
    fail_get: Option<ErrorFactory>,
    fail_set: Option<ErrorFactory>,
    fail_create: Option<ErrorFactory>,
    phantom_rows: usize,
    calls: Vec<RecordedCall>,
}

/// A [`RecordFamily`] double delegating to a real family.
///
/// Clones share the same script, so a test can keep one handle for
/// programming while the code under test holds another.
#[derive(Clone)]
pub struct ScriptedFamily {
    inner: Arc<dyn RecordFamily>,
    script: Arc<Mutex<Script>>,
    paused: watch::Sender<bool>,
}

impl fmt::Debug for ScriptedFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedFamily").field("inner", &self.inner).finish_non_exhaustive()
    }
}

impl ScriptedFamily {
    /// Wraps a family.
    #[must_use]
    pub fn new(inner: Arc<dyn RecordFamily>) -> Self {
        let (paused, _) = watch::channel(false);
        Self { inner, script: Arc::new(Mutex::new(Script::default())), paused }
    }

    /// Every subsequent `get` fails with the produced error.
    pub fn fail_gets(&self, factory: impl Fn(&str) -> StorageError + Send + Sync + 'static) {
        self.script.lock().fail_get = Some(Arc::new(factory));
    }

    /// Every subsequent `set` fails with the produced error.
    pub fn fail_sets(&self, factory: impl Fn(&str) -> StorageError + Send + Sync + 'static) {
        self.script.lock().fail_set = Some(Arc::new(factory));
    }

    /// Every subsequent `create` fails with the produced error.
    pub fn fail_creates(&self, factory: impl Fn(&str) -> StorageError + Send + Sync + 'static) {
        self.script.lock().fail_create = Some(Arc::new(factory));
    }

    /// Removes every scripted failure.
    pub fn heal(&self) {
        let mut script = self.script.lock();
        script.fail_get = None;
        script.fail_set = None;
        script.fail_create = None;
    }

    /// The next `count` reads report an existing row whatever the key,
    /// without touching the wrapped family.
    pub fn phantom_rows(&self, count: usize) {
        self.script.lock().phantom_rows = count;
    }

    /// Holds every `get` until [`resume`](Self::resume) is called.
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    /// Releases held and future calls.
    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Calls observed so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().calls.clone()
    }

    /// Keys passed to `set` so far, in order.
    #[must_use]
    pub fn written_keys(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::Set { keys, .. } => Some(keys),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Keys passed to `get` so far, in order.
    #[must_use]
    pub fn read_keys(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::Get { key, .. } => Some(key),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl RecordFamily for ScriptedFamily {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get(&self, key: &str, columns: &[&str]) -> StorageResult<Option<Row>> {
        let mut paused = self.paused.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = paused.wait_for(|held| !held).await;

        let (failure, phantom) = {
            let mut script = self.script.lock();
            script.calls.push(RecordedCall::Get {
                key: key.to_owned(),
                columns: columns.iter().map(|c| (*c).to_owned()).collect(),
            });
            let phantom = script.phantom_rows > 0;
            if phantom {
                script.phantom_rows -= 1;
            }
            (script.fail_get.clone(), phantom)
        };

        if let Some(factory) = failure {
            return Err(factory(self.inner.name()));
        }
        if phantom {
            return Ok(Some(Row::new().with("id", "phantom").with("ticket", "phantom")));
        }
        self.inner.get(key, columns).await
    }

    async fn set(&self, rows: RowMutations, options: WriteOptions) -> StorageResult<()> {
        let failure = {
            let mut script = self.script.lock();
            script.calls.push(RecordedCall::Set {
                keys: rows.keys().cloned().collect(),
                ttl: options.ttl,
            });
            script.fail_set.clone()
        };

        if let Some(factory) = failure {
            return Err(factory(self.inner.name()));
        }
        self.inner.set(rows, options).await
    }

    async fn create(&self, schema: &FamilySchema) -> StorageResult<()> {
        let failure = {
            let mut script = self.script.lock();
            script.calls.push(RecordedCall::Create);
            script.fail_create.clone()
        };

        if let Some(factory) = failure {
            return Err(factory(self.inner.name()));
        }
        self.inner.create(schema).await
    }
}

/// A [`Keyspace`] over a [`MemoryKeyspace`] that hands out one shared
/// [`ScriptedFamily`] per family name.
#[derive(Clone)]
pub struct ScriptedKeyspace {
    memory: MemoryKeyspace,
    families: Arc<Mutex<HashMap<String, ScriptedFamily>>>,
}

impl ScriptedKeyspace {
    /// Wraps an existing memory keyspace.
    #[must_use]
    pub fn new(memory: MemoryKeyspace) -> Self {
        Self { memory, families: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Wraps a fresh memory keyspace with the named families provisioned.
    pub fn with_families<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(MemoryKeyspace::with_families(names))
    }

    /// The scripted double for `name`, created on first request.
    #[must_use]
    pub fn scripted(&self, name: &str) -> ScriptedFamily {
        self.families
            .lock()
            .entry(name.to_owned())
            .or_insert_with(|| ScriptedFamily::new(Arc::new(self.memory.memory_family(name))))
            .clone()
    }

    /// The underlying memory keyspace.
    #[must_use]
    pub fn memory(&self) -> &MemoryKeyspace {
        &self.memory
    }
}

impl Keyspace for ScriptedKeyspace {
    fn name(&self) -> &str {
        self.memory.name()
    }

    fn family(&self, name: &str) -> Arc<dyn RecordFamily> {
        Arc::new(self.scripted(name))
    }
}

/// Builds a row from `(column, value)` pairs.
#[must_use]
pub fn make_row<'a>(columns: impl IntoIterator<Item = (&'a str, serde_json::Value)>) -> Row {
    columns.into_iter().collect()
}

/// Assert that a [`StorageResult`] is a [`StorageError::NoSuchFamily`].
#[macro_export]
macro_rules! assert_missing_family {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::NoSuchFamily { .. })),
            "expected StorageError::NoSuchFamily, got: {:?}",
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is `Ok`, returning the inner value.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StorageError: {e:?}", $msg),
        }
    };
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::family::single_row;

    #[tokio::test]
    async fn test_scripted_family_records_calls() {
        let keyspace = ScriptedKeyspace::with_families(["f"]);
        let family = keyspace.family("f");

        assert_storage_ok!(
            family
                .set(single_row("k", make_row([("c", json!("v"))])), WriteOptions::persistent())
                .await
        );
        let _ = family.get("k", &["c"]).await;

        let scripted = keyspace.scripted("f");
        assert_eq!(scripted.written_keys(), vec!["k".to_owned()]);
        assert_eq!(scripted.read_keys(), vec!["k".to_owned()]);
    }

    #[tokio::test]
    async fn test_phantom_rows_are_consumed() {
        let keyspace = ScriptedKeyspace::with_families(["f"]);
        let scripted = keyspace.scripted("f");
        scripted.phantom_rows(1);

        assert!(scripted.get("any", &["id"]).await.expect("get").is_some());
        assert!(scripted.get("any", &["id"]).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_scripted_failure_and_heal() {
        let keyspace = ScriptedKeyspace::with_families(["f"]);
        let scripted = keyspace.scripted("f");
        scripted.fail_gets(|_| StorageError::timeout());

        assert!(matches!(scripted.get("k", &[]).await, Err(StorageError::Timeout)));
        scripted.heal();
        assert_storage_ok!(scripted.get("k", &[]).await);
    }

    #[tokio::test]
    async fn test_missing_family_macro() {
        let keyspace = ScriptedKeyspace::new(MemoryKeyspace::new());
        let result = keyspace.family("absent").get("_", &[]).await;
        assert_missing_family!(result);
    }
}
