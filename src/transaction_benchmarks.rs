// src/transaction_benchmarks.rs
// Throughput sanity checks for the transaction commit path. These aren't
// criterion benchmarks (see benches/benchmarks.rs for that) — just fast
// regression tests that a batch of commits completes in a bounded amount of
// wall-clock time, to catch an accidental O(n^2) in the hot path.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::json;
use tempfile::TempDir;

use crate::database::DatabaseCore;
use crate::storage::StorageEngine;

fn open_db() -> (TempDir, DatabaseCore<StorageEngine>) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("bench.mlite");
    let db = DatabaseCore::<StorageEngine>::open(&db_path).unwrap();
    (temp_dir, db)
}

#[test]
fn bench_auto_commit_inserts() {
    let (_temp, db) = open_db();
    let n = 500;

    let start = Instant::now();
    for i in 0..n {
        let mut fields = HashMap::new();
        fields.insert("i".to_string(), json!(i));
        db.insert_one_safe("bench", fields).unwrap();
    }
    let elapsed = start.elapsed();

    let collection = db.collection("bench").unwrap();
    assert_eq!(collection.count_documents(&json!({})).unwrap(), n as u64);
    assert!(
        elapsed.as_secs() < 30,
        "{} auto-committed inserts took {:?}, expected well under 30s",
        n,
        elapsed
    );
}

#[test]
fn bench_explicit_transaction_batch() {
    let (_temp, db) = open_db();
    let n = 500;

    let start = Instant::now();
    let tx_id = db.begin_transaction();
    for i in 0..n {
        let mut fields = HashMap::new();
        fields.insert("i".to_string(), json!(i));
        db.insert_one_tx("bench", fields, tx_id).unwrap();
    }
    db.commit_transaction(tx_id).unwrap();
    let elapsed = start.elapsed();

    let collection = db.collection("bench").unwrap();
    assert_eq!(collection.count_documents(&json!({})).unwrap(), n as u64);
    assert!(
        elapsed.as_secs() < 30,
        "{} document batch commit took {:?}, expected well under 30s",
        n,
        elapsed
    );
}

#[test]
fn bench_many_small_transactions_faster_than_linear_blowup() {
    let (_temp, db) = open_db();
    let n = 200;

    let start = Instant::now();
    for i in 0..n {
        let tx_id = db.begin_transaction();
        let mut fields = HashMap::new();
        fields.insert("i".to_string(), json!(i));
        db.insert_one_tx("bench", fields, tx_id).unwrap();
        db.commit_transaction(tx_id).unwrap();
    }
    let elapsed = start.elapsed();

    let collection = db.collection("bench").unwrap();
    assert_eq!(collection.count_documents(&json!({})).unwrap(), n as u64);
    assert!(
        elapsed.as_secs() < 30,
        "{} single-document transactions took {:?}, expected well under 30s",
        n,
        elapsed
    );
}
