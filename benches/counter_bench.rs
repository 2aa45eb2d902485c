//! Benchmarks for kvcounter put throughput

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use kvcounter::item::item;
use kvcounter::store::{KeySchema, MemoryStore};
use kvcounter::{CounterConfig, HistoryCounter, PlainCounter};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn plain_put(c: &mut Criterion) {
    let rt = runtime();
    let store = Arc::new(MemoryStore::new());
    store
        .create_table("autoincrement", KeySchema::partition("tableName"))
        .unwrap();
    store.create_table("widgets", KeySchema::partition("widgetID")).unwrap();

    let config = CounterConfig::builder()
        .counter_table("autoincrement")
        .counter_key(item([("tableName", "widgets")]))
        .table("widgets")
        .attribute("widgetID")
        .build();
    let counter = PlainCounter::new(store, config).unwrap();

    c.bench_function("plain_put", |b| {
        b.iter(|| rt.block_on(counter.put(item([("name", "spoon")]))).unwrap())
    });
}

fn history_put(c: &mut Criterion) {
    let rt = runtime();
    let store = Arc::new(MemoryStore::new());
    store.create_table("widgets", KeySchema::partition("widgetID")).unwrap();
    store
        .create_table("widgetHistory", KeySchema::composite("widgetID", "version"))
        .unwrap();

    let config = CounterConfig::builder()
        .counter_table("widgets")
        .counter_key(item([("widgetID", "spoon")]))
        .table("widgetHistory")
        .attribute("version")
        .build();
    let counter = HistoryCounter::new(store, config).unwrap();

    c.bench_function("history_put", |b| {
        b.iter(|| rt.block_on(counter.put(item([("name", "spoon")]))).unwrap())
    });
}

criterion_group!(benches, plain_put, history_put);
criterion_main!(benches);
