//! Tests for HistoryCounter
//!
//! These tests verify:
//! - Versions issued for a new item
//! - History is append-only, one entry per version
//! - Current version always equals the highest history version
//! - Bootstrap of items written before versioning
//! - get_last / get_version reads

use std::sync::Arc;

use kvcounter::item::item;
use kvcounter::store::{KeySchema, KeyValueStore, MemoryStore, WriteRequest};
use kvcounter::{AttributeValue, CounterConfig, HistoryCounter, Item};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.create_table("widgets", KeySchema::partition("widgetID")).unwrap();
    store
        .create_table("widgetHistory", KeySchema::composite("widgetID", "version"))
        .unwrap();
    store
}

fn history_config(widget_id: &str) -> CounterConfig {
    CounterConfig::builder()
        .counter_table("widgets")
        .counter_key(item([("widgetID", widget_id)]))
        .table("widgetHistory")
        .attribute("version")
        .build()
}

fn setup_counter() -> (Arc<MemoryStore>, HistoryCounter<MemoryStore>) {
    let store = setup_store();
    let counter = HistoryCounter::new(store.clone(), history_config("spoon")).unwrap();
    (store, counter)
}

fn record(widget_id: &str, version: i64, name: &str) -> Item {
    item([
        ("widgetID", AttributeValue::from(widget_id)),
        ("version", AttributeValue::N(version)),
        ("name", AttributeValue::from(name)),
    ])
}

async fn current(store: &MemoryStore, widget_id: &str) -> Option<Item> {
    store
        .get("widgets", &item([("widgetID", widget_id)]), None)
        .await
        .unwrap()
}

/// Versions in history for one widget, ascending
fn history_versions(store: &MemoryStore, widget_id: &str) -> Vec<i64> {
    store
        .scan_table("widgetHistory")
        .unwrap()
        .into_iter()
        .filter(|r| r.get("widgetID") == Some(&AttributeValue::from(widget_id)))
        .filter_map(|r| r.get("version").and_then(AttributeValue::as_i64))
        .collect()
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[tokio::test]
async fn test_first_put_creates_version_one() {
    let (store, counter) = setup_counter();

    let version = counter.put(item([("name", "spoon")])).await.unwrap();

    assert_eq!(version, 1);
    assert_eq!(current(&store, "spoon").await, Some(record("spoon", 1, "spoon")));
    assert_eq!(counter.get_version(1).await.unwrap(), Some(record("spoon", 1, "spoon")));
}

#[tokio::test]
async fn test_each_put_appends_history() {
    let (store, counter) = setup_counter();

    for (expected, name) in [(1, "spoon"), (2, "silver spoon"), (3, "gold spoon")] {
        assert_eq!(counter.put(item([("name", name)])).await.unwrap(), expected);
    }

    assert_eq!(history_versions(&store, "spoon"), vec![1, 2, 3]);
    assert_eq!(counter.get_version(1).await.unwrap(), Some(record("spoon", 1, "spoon")));
    assert_eq!(counter.get_version(2).await.unwrap(), Some(record("spoon", 2, "silver spoon")));
    assert_eq!(current(&store, "spoon").await, Some(record("spoon", 3, "gold spoon")));
}

#[tokio::test]
async fn test_current_version_matches_latest_history() {
    let (store, counter) = setup_counter();

    for i in 0..10 {
        counter.put(item([("name", format!("rev-{i}"))])).await.unwrap();

        let versions = history_versions(&store, "spoon");
        let latest = current(&store, "spoon").await.unwrap();
        assert_eq!(latest.get("version").and_then(AttributeValue::as_i64), versions.last().copied());
    }
}

#[tokio::test]
async fn test_key_attributes_cannot_be_overridden() {
    let (store, counter) = setup_counter();

    counter
        .put(item([("widgetID", "fork"), ("name", "spoon")]))
        .await
        .unwrap();

    assert!(current(&store, "fork").await.is_none());
    assert_eq!(current(&store, "spoon").await, Some(record("spoon", 1, "spoon")));
}

#[tokio::test]
async fn test_items_are_versioned_independently() {
    let store = setup_store();
    let spoon = HistoryCounter::new(store.clone(), history_config("spoon")).unwrap();
    let fork = HistoryCounter::new(store.clone(), history_config("fork")).unwrap();

    spoon.put(item([("name", "spoon")])).await.unwrap();
    spoon.put(item([("name", "spoon")])).await.unwrap();
    assert_eq!(fork.put(item([("name", "fork")])).await.unwrap(), 1);

    assert_eq!(history_versions(&store, "spoon"), vec![1, 2]);
    assert_eq!(history_versions(&store, "fork"), vec![1]);
}

#[tokio::test]
async fn test_resume_from_existing_version() {
    let (store, counter) = setup_counter();
    store
        .put(WriteRequest::new("widgets", record("spoon", 7, "old")))
        .await
        .unwrap();

    let version = counter.put(item([("name", "new")])).await.unwrap();

    assert_eq!(version, 8);
    assert_eq!(current(&store, "spoon").await, Some(record("spoon", 8, "new")));
    assert_eq!(history_versions(&store, "spoon"), vec![8]);
}

// =============================================================================
// Bootstrap Tests
// =============================================================================

#[tokio::test]
async fn test_bootstrap_unversioned_item() {
    let (store, counter) = setup_counter();
    store
        .put(WriteRequest::new(
            "widgets",
            item([("widgetID", "spoon"), ("name", "legacy")]),
        ))
        .await
        .unwrap();

    let version = counter.put(item([("name", "spoon")])).await.unwrap();

    assert_eq!(version, 2);
    assert_eq!(history_versions(&store, "spoon"), vec![1, 2]);
    assert_eq!(counter.get_version(1).await.unwrap(), Some(record("spoon", 1, "legacy")));
    assert_eq!(counter.get_version(2).await.unwrap(), Some(record("spoon", 2, "spoon")));
    assert_eq!(current(&store, "spoon").await, Some(record("spoon", 2, "spoon")));
}

#[tokio::test]
async fn test_bootstrap_with_custom_initial_value() {
    let store = setup_store();
    store
        .put(WriteRequest::new(
            "widgets",
            item([("widgetID", "spoon"), ("name", "legacy")]),
        ))
        .await
        .unwrap();
    let config = CounterConfig::builder()
        .counter_table("widgets")
        .counter_key(item([("widgetID", "spoon")]))
        .table("widgetHistory")
        .attribute("version")
        .initial_value(10)
        .build();
    let counter = HistoryCounter::new(store.clone(), config).unwrap();

    assert_eq!(counter.put(item([("name", "spoon")])).await.unwrap(), 11);
    assert_eq!(history_versions(&store, "spoon"), vec![10, 11]);
}

#[tokio::test]
async fn test_bootstrap_happens_once() {
    let (store, counter) = setup_counter();
    store
        .put(WriteRequest::new(
            "widgets",
            item([("widgetID", "spoon"), ("name", "legacy")]),
        ))
        .await
        .unwrap();

    counter.put(item([("name", "a")])).await.unwrap();
    assert_eq!(counter.put(item([("name", "b")])).await.unwrap(), 3);

    assert_eq!(history_versions(&store, "spoon"), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_copy_attributes_flag_does_not_change_history() {
    let mut results = Vec::new();
    for copy_attributes in [false, true] {
        let store = setup_store();
        store
            .put(WriteRequest::new(
                "widgets",
                item([("widgetID", "spoon"), ("name", "legacy")]),
            ))
            .await
            .unwrap();
        let mut config = history_config("spoon");
        config.copy_attributes = copy_attributes;
        let counter = HistoryCounter::new(store.clone(), config).unwrap();

        let version = counter.put(item([("name", "spoon")])).await.unwrap();

        results.push((
            version,
            store.scan_table("widgetHistory").unwrap(),
            current(&store, "spoon").await,
        ));
    }

    assert_eq!(results[0], results[1]);
    assert_eq!(results[0].0, 2);
    assert_eq!(results[0].2, Some(record("spoon", 2, "spoon")));
}

// =============================================================================
// get_last Tests
// =============================================================================

#[tokio::test]
async fn test_get_last_fresh_and_unversioned() {
    let (store, counter) = setup_counter();
    assert_eq!(counter.get_last().await.unwrap(), None);

    store
        .put(WriteRequest::new(
            "widgets",
            item([("widgetID", "spoon"), ("name", "legacy")]),
        ))
        .await
        .unwrap();
    assert_eq!(counter.get_last().await.unwrap(), None);
}

#[tokio::test]
async fn test_get_last_is_idempotent() {
    let (store, counter) = setup_counter();
    counter.put(item([("name", "spoon")])).await.unwrap();
    counter.put(item([("name", "spoon")])).await.unwrap();
    let before = store.stats();

    assert_eq!(counter.get_last().await.unwrap(), Some(2));
    assert_eq!(counter.get_last().await.unwrap(), Some(2));
    assert_eq!(store.stats(), before);
    assert_eq!(history_versions(&store, "spoon"), vec![1, 2]);
}
