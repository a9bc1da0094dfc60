//! Column-family record store traits.
//!
//! A [`Keyspace`] hands out [`RecordFamily`] handles by name. Each family is a
//! sparse, column-oriented container: a row key maps to any number of named
//! columns, and a write only touches the columns it names.
//!
//! ```text
//! keyspace "proteus_session"
//! ├── family "session_store"    user id ──► { name: "test", value: 100 }
//! └── family "session_ticket"   ticket  ──► { id: "100" }
//!                               token   ──► { ticket: "..." }   (ttl 300s)
//! ```
//!
//! Values are [`serde_json::Value`]s so that callers can store strings and
//! numbers alike without agreeing on an encoding up front.

use std::{
    collections::{BTreeMap, btree_map},
    fmt,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageResult;

/// Reserved row key read to check whether a family exists.
pub const SENTINEL_KEY: &str = "_";

/// A sparse set of columns belonging to one row.
///
/// Columns are kept in name order, which makes `Debug` output and equality
/// checks stable.
///
/// # Examples
///
/// ```
/// use proteus_session_storage::Row;
///
/// let row = Row::new().with("name", "test").with("value", 100);
/// assert_eq!(row.get_str("name"), Some("test"));
/// assert_eq!(row.get("value"), Some(&serde_json::json!(100)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Value>);

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    /// Inserts a column, returning the previous value if any.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(column.into(), value.into())
    }

    /// Returns the value of a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Returns the value of a column if it is a JSON string.
    #[must_use]
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.0.get(column).and_then(Value::as_str)
    }

    /// Returns `true` if the column is present.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    /// Removes a column.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.0.remove(column)
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates columns in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Consumes the row, returning the underlying column map.
    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl From<BTreeMap<String, Value>> for Row {
    fn from(columns: BTreeMap<String, Value>) -> Self {
        Self(columns)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Rows to write in a single `set` call, keyed by row key.
pub type RowMutations = BTreeMap<String, Row>;

/// Options applied to every column written by one `set` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Expire the written columns after this long. `None` keeps them until
    /// overwritten.
    pub ttl: Option<Duration>,
}

impl WriteOptions {
    /// Write without expiry.
    #[must_use]
    pub fn persistent() -> Self {
        Self { ttl: None }
    }

    /// Write with the given time-to-live.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }
}

/// Validation class for keys, column names or column values.
///
/// The session families only ever hold UTF-8 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Validation {
    /// UTF-8 text.
    #[serde(rename = "UTF8Type")]
    Utf8,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8 => write!(f, "UTF8Type"),
        }
    }
}

/// Schema used when creating a column family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilySchema {
    /// Validation applied to row keys.
    pub key_validation: Validation,
    /// Ordering/validation of column names.
    pub comparator: Validation,
    /// Validation applied to column values.
    pub default_validation: Validation,
}

impl FamilySchema {
    /// All-UTF-8 schema used by the session families.
    #[must_use]
    pub fn utf8() -> Self {
        Self {
            key_validation: Validation::Utf8,
            comparator: Validation::Utf8,
            default_validation: Validation::Utf8,
        }
    }
}

impl Default for FamilySchema {
    fn default() -> Self {
        Self::utf8()
    }
}

/// Handle to one column family.
///
/// Implementations are expected to be thread-safe (`Send + Sync`) and to
/// support concurrent operations on the same handle.
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](RecordFamily::get) | Read selected columns of one row |
/// | [`set`](RecordFamily::set) | Write columns of one or more rows, optionally with TTL |
/// | [`create`](RecordFamily::create) | Provision the family |
#[async_trait]
pub trait RecordFamily: Send + Sync + fmt::Debug {
    /// Name of the family within its keyspace.
    fn name(&self) -> &str;

    /// Reads the named columns of a row.
    ///
    /// An empty `columns` slice selects every column.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(row))` with the live subset of the requested columns
    /// - `Ok(None)` if none of the requested columns exist (or all expired)
    /// - `Err(StorageError::NoSuchFamily)` if the family was never created
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get(&self, key: &str, columns: &[&str]) -> StorageResult<Option<Row>>;

    /// Writes columns for every row in `rows`.
    ///
    /// Columns not named in a row are left untouched. When `options.ttl` is
    /// set, each written column expires independently after that duration.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set(&self, rows: RowMutations, options: WriteOptions) -> StorageResult<()>;

    /// Creates the family with the given schema.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::FamilyExists`](crate::StorageError::FamilyExists)
    /// if the family is already present.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn create(&self, schema: &FamilySchema) -> StorageResult<()>;
}

/// A named collection of column families.
pub trait Keyspace: Send + Sync {
    /// Name of the keyspace.
    fn name(&self) -> &str;

    /// Returns a handle to the named family.
    ///
    /// The handle is returned whether or not the family exists; existence is
    /// discovered on first use.
    fn family(&self, name: &str) -> Arc<dyn RecordFamily>;
}

/// Convenience for building a single-row mutation.
#[must_use]
pub fn single_row(key: impl Into<String>, row: Row) -> RowMutations {
    let mut rows = RowMutations::new();
    rows.insert(key.into(), row);
    rows
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_row_keeps_value_types() {
        let row = Row::new().with("name", "test").with("value", 100);
        assert_eq!(row.get("value"), Some(&json!(100)));
        assert_eq!(row.get_str("value"), None);
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_row_serializes_as_plain_object() {
        let row = Row::new().with("id", "100");
        let json = serde_json::to_string(&row).expect("serialize");
        assert_eq!(json, r#"{"id":"100"}"#);
    }

    #[test]
    fn test_validation_accepts_only_utf8() {
        let parsed: Validation = serde_json::from_str(r#""UTF8Type""#).expect("deserialize");
        assert_eq!(parsed, Validation::Utf8);
        assert_eq!(parsed.to_string(), "UTF8Type");
        assert!(serde_json::from_str::<Validation>(r#""BytesType""#).is_err());
    }

    #[test]
    fn test_schema_uses_utf8_classes() {
        let schema = FamilySchema::utf8();
        let json = serde_json::to_value(schema).expect("serialize");
        assert_eq!(
            json,
            json!({
                "key_validation": "UTF8Type",
                "comparator": "UTF8Type",
                "default_validation": "UTF8Type",
            })
        );
    }

    #[test]
    fn test_single_row() {
        let rows = single_row("k", Row::new().with("c", "v"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows["k"].get_str("c"), Some("v"));
    }
}
