//! In-memory keyspace implementation.
//!
//! This module provides [`MemoryKeyspace`], an in-memory implementation of
//! [`Keyspace`] suitable for testing and development.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **Sparse columns**: Writes merge into existing rows column by column
//! - **Per-column TTL**: Expired columns are invisible immediately and purged by a background task
//! - **Provisioning**: Families must be created before use, mirroring a real column store
//!
//! # Example
//!
//! ```
//! use proteus_session_storage::{
//!     FamilySchema, Keyspace, MemoryKeyspace, Row, WriteOptions, single_row,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let keyspace = MemoryKeyspace::new();
//!     let family = keyspace.family("session_store");
//!     family.create(&FamilySchema::utf8()).await.unwrap();
//!
//!     let row = Row::new().with("name", "test");
//!     family.set(single_row("100", row), WriteOptions::persistent()).await.unwrap();
//!
//!     let read = family.get("100", &["name"]).await.unwrap().unwrap();
//!     assert_eq!(read.get_str("name"), Some("test"));
//! }
//! ```
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the process exits
//! - Expired columns are purged once per second, so memory is released lazily

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use fail::fail_point;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::{select, sync::watch, time::sleep};

use crate::{
    error::{StorageError, StorageResult},
    family::{FamilySchema, Keyspace, RecordFamily, Row, RowMutations, WriteOptions},
};

/// Interval between purges of expired columns.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// A stored column value with its optional expiry.
#[derive(Debug, Clone)]
struct Cell {
    value: Value,
    expires_at: Option<Instant>,
}

impl Cell {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

type FamilyRows = BTreeMap<String, BTreeMap<String, Cell>>;
type Families = Arc<RwLock<HashMap<String, FamilyRows>>>;

/// Holds the shutdown signal sender. When dropped, the watch channel
/// closes and the cleanup task exits.
struct ShutdownGuard {
    shutdown_tx: watch::Sender<()>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        // The receiver may already be gone.
        let _ = self.shutdown_tx.send(());
    }
}

/// In-memory keyspace holding any number of column families.
///
/// # Cloning
///
/// `MemoryKeyspace` is cheaply cloneable via [`Arc`]. All clones, and every
/// [`MemoryFamily`] handle obtained from them, share the same data.
///
/// # Shutdown
///
/// The background TTL cleanup task stops automatically when all clones and
/// family handles are dropped. [`shutdown`](Self::shutdown) stops it
/// explicitly.
#[derive(Clone)]
pub struct MemoryKeyspace {
    name: Arc<str>,
    families: Families,
    shutdown_guard: Arc<ShutdownGuard>,
}

impl fmt::Debug for MemoryKeyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryKeyspace")
            .field("name", &self.name)
            .field("families", &self.family_names())
            .finish_non_exhaustive()
    }
}

impl MemoryKeyspace {
    /// Creates an empty keyspace named `memory`.
    ///
    /// Spawns the TTL cleanup task, so this must be called from within a
    /// tokio runtime.
    pub fn new() -> Self {
        Self::named("memory")
    }

    /// Creates an empty keyspace with the given name.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let keyspace = Self {
            name: name.into(),
            families: Arc::new(RwLock::new(HashMap::new())),
            shutdown_guard: Arc::new(ShutdownGuard { shutdown_tx }),
        };

        // The task only holds the data, never the guard, so dropping the
        // last keyspace handle is what stops it.
        let families = Arc::clone(&keyspace.families);
        tokio::spawn(async move {
            cleanup_expired_columns(families, shutdown_rx).await;
        });

        keyspace
    }

    /// Creates a keyspace with the given families already provisioned.
    pub fn with_families<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keyspace = Self::new();
        {
            let mut families = keyspace.families.write();
            for name in names {
                families.entry(name.into()).or_default();
            }
        }
        keyspace
    }

    /// Names of the provisioned families, sorted.
    #[must_use]
    pub fn family_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.families.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns `true` if the named family has been provisioned.
    #[must_use]
    pub fn contains_family(&self, name: &str) -> bool {
        self.families.read().contains_key(name)
    }

    /// Typed handle to a family of this keyspace.
    #[must_use]
    pub fn memory_family(&self, name: &str) -> MemoryFamily {
        MemoryFamily { name: name.to_owned(), keyspace: self.clone() }
    }

    /// Signals the background cleanup task to stop.
    ///
    /// Optional: the task also stops when the last handle is dropped.
    pub fn shutdown(&self) {
        let _ = self.shutdown_guard.shutdown_tx.send(());
    }
}

impl Default for MemoryKeyspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyspace for MemoryKeyspace {
    fn name(&self) -> &str {
        &self.name
    }

    fn family(&self, name: &str) -> Arc<dyn RecordFamily> {
        Arc::new(self.memory_family(name))
    }
}

/// Purges expired columns once per [`CLEANUP_INTERVAL`] until shut down.
async fn cleanup_expired_columns(families: Families, mut shutdown_rx: watch::Receiver<()>) {
    loop {
        select! {
            _ = sleep(CLEANUP_INTERVAL) => {}
            _ = shutdown_rx.changed() => {
                return;
            }
        }

        let now = Instant::now();
        let mut guard = families.write();
        for rows in guard.values_mut() {
            rows.retain(|_, columns| {
                columns.retain(|_, cell| cell.is_live(now));
                !columns.is_empty()
            });
        }
    }
}

/// Handle to one family of a [`MemoryKeyspace`].
#[derive(Clone)]
pub struct MemoryFamily {
    name: String,
    keyspace: MemoryKeyspace,
}

impl fmt::Debug for MemoryFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryFamily")
            .field("keyspace", &self.keyspace.name)
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl RecordFamily for MemoryFamily {
    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(skip(self, key, columns), fields(family = %self.name))]
    async fn get(&self, key: &str, columns: &[&str]) -> StorageResult<Option<Row>> {
        fail_point!("memory-family-get", |_| {
            Err(StorageError::internal("injected failure: memory-family-get"))
        });

        let families = self.keyspace.families.read();
        let rows =
            families.get(&self.name).ok_or_else(|| StorageError::no_such_family(&self.name))?;

        let Some(cells) = rows.get(key) else {
            return Ok(None);
        };

        let now = Instant::now();
        let row: Row = if columns.is_empty() {
            cells
                .iter()
                .filter(|(_, cell)| cell.is_live(now))
                .map(|(column, cell)| (column.clone(), cell.value.clone()))
                .collect()
        } else {
            columns
                .iter()
                .filter_map(|column| {
                    cells
                        .get(*column)
                        .filter(|cell| cell.is_live(now))
                        .map(|cell| ((*column).to_owned(), cell.value.clone()))
                })
                .collect()
        };

        Ok(if row.is_empty() { None } else { Some(row) })
    }

    #[tracing::instrument(
        skip(self, rows, options),
        fields(family = %self.name, rows = rows.len(), ttl_secs = options.ttl.map(|t| t.as_secs()))
    )]
    async fn set(&self, rows: RowMutations, options: WriteOptions) -> StorageResult<()> {
        fail_point!("memory-family-set", |_| {
            Err(StorageError::internal("injected failure: memory-family-set"))
        });

        let mut families = self.keyspace.families.write();
        let stored =
            families.get_mut(&self.name).ok_or_else(|| StorageError::no_such_family(&self.name))?;

        // An expiry past the representable range means "never".
        let expires_at = options.ttl.and_then(|ttl| Instant::now().checked_add(ttl));

        for (key, row) in rows {
            let cells = stored.entry(key).or_default();
            for (column, value) in row {
                cells.insert(column, Cell { value, expires_at });
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, schema), fields(family = %self.name))]
    async fn create(&self, schema: &FamilySchema) -> StorageResult<()> {
        fail_point!("memory-family-create", |_| {
            Err(StorageError::internal("injected failure: memory-family-create"))
        });

        let mut families = self.keyspace.families.write();
        if families.contains_key(&self.name) {
            return Err(StorageError::family_exists(&self.name));
        }

        tracing::debug!(
            key_validation = %schema.key_validation,
            comparator = %schema.comparator,
            default_validation = %schema.default_validation,
            "creating column family"
        );
        families.insert(self.name.clone(), FamilyRows::new());
        Ok(())
    }
}
