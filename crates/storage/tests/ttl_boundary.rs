//! TTL boundary condition tests for `MemoryKeyspace`.
//!
//! Covers per-column expiry: zero TTL, oversized TTL, expiration boundaries,
//! TTL clearing by a persistent overwrite, and TTL replacement.

#![allow(clippy::expect_used, clippy::panic)]

use std::{sync::Arc, time::Duration};

use proteus_session_storage::{
    Keyspace, MemoryKeyspace, RecordFamily, Row, WriteOptions, single_row,
};

fn provisioned() -> (MemoryKeyspace, Arc<dyn RecordFamily>) {
    let keyspace = MemoryKeyspace::with_families(["ttl"]);
    let family = keyspace.family("ttl");
    (keyspace, family)
}

async fn write(family: &Arc<dyn RecordFamily>, key: &str, row: Row, options: WriteOptions) {
    family.set(single_row(key, row), options).await.expect("set should succeed");
}

// ============================================================================
// Zero / Oversized TTL
// ============================================================================

/// A column written with `Duration::ZERO` is expired on the very next read.
#[tokio::test]
async fn test_zero_ttl_is_immediately_expired() {
    let (_keyspace, family) = provisioned();

    write(&family, "zero", Row::new().with("id", "100"), WriteOptions::with_ttl(Duration::ZERO))
        .await;

    let result = family.get("zero", &["id"]).await.expect("get should not error");
    assert_eq!(result, None, "a zero-TTL column must be invisible on the next read");
}

/// A TTL beyond the representable `Instant` range is treated as no expiry
/// rather than panicking.
#[tokio::test]
async fn test_max_ttl_does_not_overflow() {
    let (_keyspace, family) = provisioned();

    write(&family, "forever", Row::new().with("id", "100"), WriteOptions::with_ttl(Duration::MAX))
        .await;

    let result = family.get("forever", &["id"]).await.expect("get");
    assert_eq!(result, Some(Row::new().with("id", "100")));
}

// ============================================================================
// Expiration Boundary
// ============================================================================

/// A column is readable right after the write and gone once the TTL elapses.
#[tokio::test]
async fn test_expiration_boundary_before_and_after() {
    let (_keyspace, family) = provisioned();

    write(
        &family,
        "boundary",
        Row::new().with("ticket", "abc"),
        WriteOptions::with_ttl(Duration::from_millis(100)),
    )
    .await;

    let before = family.get("boundary", &["ticket"]).await.expect("get");
    assert!(before.is_some(), "column should be readable immediately after the write");

    tokio::time::sleep(Duration::from_millis(200)).await;

    let after = family.get("boundary", &["ticket"]).await.expect("get");
    assert_eq!(after, None, "column should be expired after TTL elapses");
}

/// Columns of the same row written with different TTLs expire independently.
#[tokio::test]
async fn test_columns_expire_independently() {
    let (_keyspace, family) = provisioned();

    write(&family, "row", Row::new().with("short", 1), WriteOptions::with_ttl(Duration::from_millis(100)))
        .await;
    write(&family, "row", Row::new().with("long", 2), WriteOptions::with_ttl(Duration::from_millis(800)))
        .await;

    tokio::time::sleep(Duration::from_millis(200)).await;

    let row = family.get("row", &["short", "long"]).await.expect("get").expect("row");
    assert_eq!(row, Row::new().with("long", 2));
}

// ============================================================================
// TTL Clearing and Replacement
// ============================================================================

/// Overwriting a TTL column with a persistent write makes it permanent.
#[tokio::test]
async fn test_persistent_overwrite_clears_expiration() {
    let (_keyspace, family) = provisioned();

    write(&family, "k", Row::new().with("c", "temporary"), WriteOptions::with_ttl(Duration::from_millis(100)))
        .await;
    write(&family, "k", Row::new().with("c", "permanent"), WriteOptions::persistent()).await;

    tokio::time::sleep(Duration::from_millis(200)).await;

    let row = family.get("k", &["c"]).await.expect("get");
    assert_eq!(row, Some(Row::new().with("c", "permanent")));
}

/// A second TTL write replaces the first expiry, whether longer or shorter.
#[tokio::test]
async fn test_ttl_replacement() {
    let (_keyspace, family) = provisioned();

    write(&family, "extend", Row::new().with("c", 1), WriteOptions::with_ttl(Duration::from_millis(100)))
        .await;
    write(&family, "extend", Row::new().with("c", 2), WriteOptions::with_ttl(Duration::from_secs(2)))
        .await;
    write(&family, "shorten", Row::new().with("c", 1), WriteOptions::with_ttl(Duration::from_secs(2)))
        .await;
    write(&family, "shorten", Row::new().with("c", 2), WriteOptions::with_ttl(Duration::from_millis(100)))
        .await;

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(family.get("extend", &["c"]).await.expect("get"), Some(Row::new().with("c", 2)));
    assert_eq!(family.get("shorten", &["c"]).await.expect("get"), None);
}

// ============================================================================
// Background Cleanup Interaction
// ============================================================================

/// The cleanup task purges expired columns but keeps live ones.
#[tokio::test]
async fn test_cleanup_task_purges_only_expired_columns() {
    let (_keyspace, family) = provisioned();

    write(&family, "gone", Row::new().with("c", "v"), WriteOptions::with_ttl(Duration::from_millis(100)))
        .await;
    write(&family, "kept", Row::new().with("c", "v"), WriteOptions::with_ttl(Duration::from_secs(60)))
        .await;

    // The cleanup task runs once per second.
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(family.get("gone", &[]).await.expect("get"), None);
    assert!(family.get("kept", &[]).await.expect("get").is_some());
}
