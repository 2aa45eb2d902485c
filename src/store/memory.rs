//! In-memory store
//!
//! BTreeMap-backed tables with RwLock for concurrency.
//!
//! Every operation yields to the scheduler once before touching the tables,
//! so concurrent callers interleave between their read and their commit the
//! way they would against a remote store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{CancellationReason, Error, Result};
use crate::item::{self, Item};

use super::{KeySchema, KeyValueStore, WriteRequest};

/// Limits enforced by the in-memory store
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Largest encoded item accepted (in bytes)
    pub max_item_size: usize,

    /// Most writes accepted in one transaction
    pub max_transaction_items: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_item_size: 400 * 1024, // 400 KB
            max_transaction_items: 100,
        }
    }
}

impl MemoryStoreConfig {
    /// Create a new config builder
    pub fn builder() -> MemoryStoreConfigBuilder {
        MemoryStoreConfigBuilder::default()
    }
}

/// Builder for MemoryStoreConfig
#[derive(Default)]
pub struct MemoryStoreConfigBuilder {
    config: MemoryStoreConfig,
}

impl MemoryStoreConfigBuilder {
    /// Set the item size limit (in bytes)
    pub fn max_item_size(mut self, bytes: usize) -> Self {
        self.config.max_item_size = bytes;
        self
    }

    /// Set the maximum number of writes per transaction
    pub fn max_transaction_items(mut self, count: usize) -> Self {
        self.config.max_transaction_items = count;
        self
    }

    pub fn build(self) -> MemoryStoreConfig {
        self.config
    }
}

/// Snapshot of store activity counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Point writes applied
    pub puts: u64,

    /// Transactions applied
    pub transactions: u64,

    /// Transactions cancelled by a failed condition
    pub cancelled_transactions: u64,

    /// Point writes rejected by a failed condition
    pub failed_conditions: u64,
}

struct Table {
    schema: KeySchema,
    records: BTreeMap<Item, Item>,
}

impl Table {
    fn key_of(&self, name: &str, item: &Item) -> Result<Item> {
        item::key_of(name, item, self.schema.attributes())
    }
}

/// In-memory key-value store
///
/// ## Concurrency:
/// - `tables`: Protected by RwLock, never held across an await
/// - Stats: Atomic counters (lock-free)
/// - Conditions and writes of one call are evaluated under one write lock,
///   which makes each `put` and each `transact_write` atomic
pub struct MemoryStore {
    config: MemoryStoreConfig,

    /// Table name -> table
    tables: RwLock<HashMap<String, Table>>,

    /// When set, every write fails with `ThroughputExceeded`
    throttled: AtomicBool,

    puts: AtomicU64,
    transactions: AtomicU64,
    cancelled_transactions: AtomicU64,
    failed_conditions: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store with default limits
    pub fn new() -> Self {
        Self::with_config(MemoryStoreConfig::default())
    }

    /// Create an empty store with the given limits
    pub fn with_config(config: MemoryStoreConfig) -> Self {
        Self {
            config,
            tables: RwLock::new(HashMap::new()),
            throttled: AtomicBool::new(false),
            puts: AtomicU64::new(0),
            transactions: AtomicU64::new(0),
            cancelled_transactions: AtomicU64::new(0),
            failed_conditions: AtomicU64::new(0),
        }
    }

    /// Register a table
    pub fn create_table(&self, name: impl Into<String>, schema: KeySchema) -> Result<()> {
        let name = name.into();
        let mut tables = self.tables.write();
        if tables.contains_key(&name) {
            return Err(Error::Config(format!("table '{name}' already exists")));
        }
        tables.insert(
            name,
            Table {
                schema,
                records: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Make every subsequent write fail with `ThroughputExceeded` (or stop)
    pub fn set_throttled(&self, throttled: bool) {
        self.throttled.store(throttled, Ordering::Relaxed);
    }

    /// All items of a table in key order
    pub fn scan_table(&self, name: &str) -> Result<Vec<Item>> {
        let tables = self.tables.read();
        let table = tables
            .get(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))?;
        Ok(table.records.values().cloned().collect())
    }

    /// Number of items in a table
    pub fn item_count(&self, name: &str) -> Result<usize> {
        let tables = self.tables.read();
        let table = tables
            .get(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))?;
        Ok(table.records.len())
    }

    /// Current activity counters
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            puts: self.puts.load(Ordering::Relaxed),
            transactions: self.transactions.load(Ordering::Relaxed),
            cancelled_transactions: self.cancelled_transactions.load(Ordering::Relaxed),
            failed_conditions: self.failed_conditions.load(Ordering::Relaxed),
        }
    }

    fn check_throttle(&self, table: &str) -> Result<()> {
        if self.throttled.load(Ordering::Relaxed) {
            return Err(Error::ThroughputExceeded {
                table: table.to_string(),
            });
        }
        Ok(())
    }

    fn check_size(&self, item: &Item) -> Result<()> {
        let size = bincode::serialized_size(item)? as usize;
        if size > self.config.max_item_size {
            return Err(Error::ItemTooLarge {
                size,
                limit: self.config.max_item_size,
            });
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, table: &str, key: &Item, projection: Option<&[String]>) -> Result<Option<Item>> {
        tokio::task::yield_now().await;

        let tables = self.tables.read();
        let t = tables
            .get(table)
            .ok_or_else(|| Error::TableNotFound(table.to_string()))?;
        let key = t.key_of(table, key)?;

        Ok(t.records.get(&key).map(|stored| match projection {
            Some(attributes) => item::project(stored, attributes),
            None => stored.clone(),
        }))
    }

    async fn put(&self, request: WriteRequest) -> Result<()> {
        tokio::task::yield_now().await;

        // Step 1: Capacity checks (nothing is applied on failure)
        self.check_throttle(&request.table)?;
        self.check_size(&request.item)?;

        // Step 2: Evaluate condition and apply under one lock
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(&request.table)
            .ok_or_else(|| Error::TableNotFound(request.table.clone()))?;
        let key = table.key_of(&request.table, &request.item)?;

        if let Some(condition) = &request.condition {
            if !condition.evaluate(table.records.get(&key)) {
                self.failed_conditions.fetch_add(1, Ordering::Relaxed);
                return Err(Error::ConditionalCheckFailed {
                    table: request.table,
                });
            }
        }

        table.records.insert(key, request.item);
        self.puts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn transact_write(&self, requests: Vec<WriteRequest>) -> Result<()> {
        tokio::task::yield_now().await;

        // Step 1: Validate shape and capacity
        if requests.is_empty() {
            return Err(Error::InvalidTransaction("no writes".to_string()));
        }
        if requests.len() > self.config.max_transaction_items {
            return Err(Error::TransactionTooLarge {
                count: requests.len(),
                limit: self.config.max_transaction_items,
            });
        }
        for request in &requests {
            self.check_throttle(&request.table)?;
            self.check_size(&request.item)?;
        }

        let mut tables = self.tables.write();

        // Step 2: Resolve keys; one write per item
        let mut keys = Vec::with_capacity(requests.len());
        let mut seen = HashSet::new();
        for request in &requests {
            let table = tables
                .get(&request.table)
                .ok_or_else(|| Error::TableNotFound(request.table.clone()))?;
            let key = table.key_of(&request.table, &request.item)?;
            if !seen.insert((request.table.clone(), key.clone())) {
                return Err(Error::InvalidTransaction(format!(
                    "multiple writes to the same item in table '{}'",
                    request.table
                )));
            }
            keys.push(key);
        }

        // Step 3: Evaluate every condition against the pre-transaction state
        let mut reasons = Vec::with_capacity(requests.len());
        for (request, key) in requests.iter().zip(&keys) {
            let current = tables.get(&request.table).and_then(|t| t.records.get(key));
            let passed = request
                .condition
                .as_ref()
                .map_or(true, |condition| condition.evaluate(current));
            reasons.push(if passed {
                CancellationReason::None
            } else {
                CancellationReason::ConditionalCheckFailed
            });
        }

        if reasons.contains(&CancellationReason::ConditionalCheckFailed) {
            self.cancelled_transactions.fetch_add(1, Ordering::Relaxed);
            return Err(Error::TransactionCanceled { reasons });
        }

        // Step 4: Apply all writes
        for (request, key) in requests.into_iter().zip(keys) {
            if let Some(table) = tables.get_mut(&request.table) {
                table.records.insert(key, request.item);
            }
        }
        self.transactions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::item::item;

    fn store_with_table() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table("widgets", KeySchema::partition("id")).unwrap();
        store
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = store_with_table();
        let widget = item([("id", "a"), ("name", "spoon")]);

        store.put(WriteRequest::new("widgets", widget.clone())).await.unwrap();

        let got = store.get("widgets", &item([("id", "a")]), None).await.unwrap();
        assert_eq!(got, Some(widget));
    }

    #[tokio::test]
    async fn test_get_projection() {
        let store = store_with_table();
        store
            .put(WriteRequest::new("widgets", item([("id", "a"), ("name", "spoon")])))
            .await
            .unwrap();

        let got = store
            .get("widgets", &item([("id", "a")]), Some(["name".to_string()].as_slice()))
            .await
            .unwrap();
        assert_eq!(got, Some(item([("name", "spoon")])));
    }

    #[tokio::test]
    async fn test_put_condition_failure() {
        let store = store_with_table();
        let request = WriteRequest::new("widgets", item([("id", "a")]))
            .with_condition(Condition::not_exists("id"));

        store.put(request.clone()).await.unwrap();
        let err = store.put(request).await.unwrap_err();

        assert!(matches!(err, Error::ConditionalCheckFailed { .. }));
        assert_eq!(store.stats().failed_conditions, 1);
        assert_eq!(store.stats().puts, 1);
    }

    #[tokio::test]
    async fn test_transaction_is_all_or_nothing() {
        let store = store_with_table();
        store.put(WriteRequest::new("widgets", item([("id", "b")]))).await.unwrap();

        let err = store
            .transact_write(vec![
                WriteRequest::new("widgets", item([("id", "a")])).with_condition(Condition::not_exists("id")),
                WriteRequest::new("widgets", item([("id", "b")])).with_condition(Condition::not_exists("id")),
            ])
            .await
            .unwrap_err();

        match err {
            Error::TransactionCanceled { reasons } => assert_eq!(
                reasons,
                vec![CancellationReason::None, CancellationReason::ConditionalCheckFailed]
            ),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.item_count("widgets").unwrap(), 1);
        assert_eq!(store.stats().cancelled_transactions, 1);
    }

    #[tokio::test]
    async fn test_transaction_rejects_duplicate_items() {
        let store = store_with_table();
        let err = store
            .transact_write(vec![
                WriteRequest::new("widgets", item([("id", "a")])),
                WriteRequest::new("widgets", item([("id", "a"), ("x", "y")])),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransaction(_)));
    }

    #[tokio::test]
    async fn test_transaction_limit() {
        let store = MemoryStore::with_config(MemoryStoreConfig::builder().max_transaction_items(1).build());
        store.create_table("widgets", KeySchema::partition("id")).unwrap();

        let err = store
            .transact_write(vec![
                WriteRequest::new("widgets", item([("id", "a")])),
                WriteRequest::new("widgets", item([("id", "b")])),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TransactionTooLarge { count: 2, limit: 1 }));
    }

    #[tokio::test]
    async fn test_item_too_large() {
        let store = MemoryStore::with_config(MemoryStoreConfig::builder().max_item_size(64).build());
        store.create_table("widgets", KeySchema::partition("id")).unwrap();

        let big = item([("id", "a".to_string()), ("blob", "x".repeat(1000))]);
        let err = store.put(WriteRequest::new("widgets", big)).await.unwrap_err();
        assert!(matches!(err, Error::ItemTooLarge { .. }));
        assert_eq!(store.item_count("widgets").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_throttled_writes() {
        let store = store_with_table();
        store.set_throttled(true);
        let err = store
            .put(WriteRequest::new("widgets", item([("id", "a")])))
            .await
            .unwrap_err();
        assert!(err.is_capacity());

        store.set_throttled(false);
        store.put(WriteRequest::new("widgets", item([("id", "a")]))).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_key_and_table() {
        let store = store_with_table();
        let err = store
            .put(WriteRequest::new("widgets", item([("name", "spoon")])))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingKeyAttribute { .. }));

        let err = store.get("nope", &item([("id", "a")]), None).await.unwrap_err();
        assert!(matches!(err, Error::TableNotFound(_)));
    }

    #[test]
    fn test_create_table_twice() {
        let store = store_with_table();
        assert!(store.create_table("widgets", KeySchema::partition("id")).is_err());
    }
}
