//! kvcounter contention demo
//!
//! Runs concurrent callers against one counter in an in-memory store and
//! reports the values they were issued.

use std::collections::BTreeSet;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use kvcounter::item::item;
use kvcounter::store::{KeySchema, MemoryStore};
use kvcounter::{CounterConfig, HistoryCounter, PlainCounter};
use tracing_subscriber::{fmt, EnvFilter};

/// Which counter to exercise
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Variant {
    /// Independent counter record
    Plain,
    /// Versioned item with history
    History,
}

/// kvcounter demo
#[derive(Parser, Debug)]
#[command(name = "kvcounter")]
#[command(about = "Concurrent auto-increment over a conditional-write key-value store")]
#[command(version)]
struct Args {
    /// Counter variant
    #[arg(short, long, value_enum, default_value = "plain")]
    variant: Variant,

    /// Number of concurrent callers
    #[arg(short, long, default_value = "8")]
    callers: usize,

    /// Puts issued by each caller
    #[arg(short, long, default_value = "10")]
    puts: usize,

    /// First value issued
    #[arg(short, long, default_value = "1")]
    initial_value: u64,

    /// Commit without transactions (expect failures under contention)
    #[arg(long)]
    dangerously: bool,
}

#[tokio::main]
async fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kvcounter=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("kvcounter v{}", kvcounter::VERSION);
    tracing::info!(
        variant = ?args.variant,
        callers = args.callers,
        puts = args.puts,
        dangerously = args.dangerously,
        "starting run"
    );

    if let Err(e) = run(&args).await {
        tracing::error!("Run failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: &Args) -> kvcounter::Result<()> {
    let store = Arc::new(MemoryStore::new());

    let builder = CounterConfig::builder()
        .initial_value(args.initial_value)
        .dangerously(args.dangerously);

    let put: Arc<dyn Fn(usize, usize) -> BoxedPut + Send + Sync> = match args.variant {
        Variant::Plain => {
            store.create_table("autoincrement", KeySchema::partition("tableName"))?;
            store.create_table("widgets", KeySchema::partition("widgetID"))?;
            let config = builder
                .counter_table("autoincrement")
                .counter_key(item([("tableName", "widgets")]))
                .table("widgets")
                .attribute("widgetID")
                .build();
            let counter = Arc::new(PlainCounter::new(store.clone(), config)?);
            Arc::new(move |caller: usize, n: usize| -> BoxedPut {
                let counter = counter.clone();
                Box::pin(async move { counter.put(item([("name", format!("widget-{caller}-{n}"))])).await })
            })
        }
        Variant::History => {
            store.create_table("widgets", KeySchema::partition("widgetID"))?;
            store.create_table("widgetHistory", KeySchema::composite("widgetID", "version"))?;
            let config = builder
                .counter_table("widgets")
                .counter_key(item([("widgetID", "demo")]))
                .table("widgetHistory")
                .attribute("version")
                .build();
            let counter = Arc::new(HistoryCounter::new(store.clone(), config)?);
            Arc::new(move |caller: usize, n: usize| -> BoxedPut {
                let counter = counter.clone();
                Box::pin(async move { counter.put(item([("note", format!("edit-{caller}-{n}"))])).await })
            })
        }
    };

    let handles: Vec<_> = (0..args.callers)
        .map(|caller| {
            let put = put.clone();
            let puts = args.puts;
            tokio::spawn(async move {
                let mut results = Vec::with_capacity(puts);
                for n in 0..puts {
                    results.push(put(caller, n).await);
                }
                results
            })
        })
        .collect();

    let mut issued = BTreeSet::new();
    let mut failures = 0usize;
    for handle in handles {
        let results = match handle.await {
            Ok(results) => results,
            Err(e) => {
                tracing::error!("Caller task failed: {}", e);
                failures += args.puts;
                continue;
            }
        };
        for result in results {
            match result {
                Ok(value) => {
                    if !issued.insert(value) {
                        tracing::warn!(value, "value issued twice");
                    }
                }
                Err(e) => {
                    tracing::warn!("put failed: {}", e);
                    failures += 1;
                }
            }
        }
    }

    let stats = store.stats();
    tracing::info!(
        issued = issued.len(),
        failures,
        first = ?issued.first(),
        last = ?issued.last(),
        transactions = stats.transactions,
        cancelled = stats.cancelled_transactions,
        failed_conditions = stats.failed_conditions,
        "run complete"
    );

    Ok(())
}

type BoxedPut = std::pin::Pin<Box<dyn std::future::Future<Output = kvcounter::Result<u64>> + Send>>;
