// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! End-to-end replay tests over composite values
//!
//! Exercises the full caller -> executor -> store path with the kinds of
//! workloads the cache exists for: array-and-bag-valued functions whose
//! traced bodies must run exactly once per distinct call, including across a
//! durable store reopen.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use xptcache::{Bag, CheckpointExecutor, FileStore, MemoryStore, Value};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// NUL-terminated byte blob, the framing the workloads under test use.
fn cblob(s: &str) -> Value {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    Value::Blob(bytes)
}

/// Arguments of the `arrayf` scenario: an int and a list of two blobs.
fn arrayf_args() -> Vec<Value> {
    vec![
        Value::Int(10),
        Value::List(vec![cblob("hello"), cblob("world")]),
    ]
}

/// Body of the `arrayf` scenario. From `(b, B)` computes:
/// - `A[i]` = size of blob `B[i]` as a float
/// - `abag` = bag of the blob sizes
/// - `a` = `b` + rounded mean of `A`
///
/// For `(10, [blob("hello\0"), blob("world\0")])` that is
/// `(16, [6.0, 6.0], bag{6, 6})`.
fn arrayf_body(args: &[Value]) -> Vec<Value> {
    let b = args[0].as_int().expect("int arg");
    let blobs = args[1].as_list().expect("list arg");

    let sizes: Vec<f64> = blobs
        .iter()
        .map(|v| v.as_blob().expect("blob element").len() as f64)
        .collect();
    let mean = sizes.iter().sum::<f64>() / sizes.len() as f64;

    let a = b + mean.round() as i64;
    let big_a = Value::List(sizes.iter().copied().map(Value::Float).collect());
    let abag: Bag = sizes.iter().map(|s| Value::Int(*s as i64)).collect();

    vec![Value::Int(a), big_a, Value::Bag(abag)]
}

fn assert_arrayf_outputs(outputs: &[Value]) {
    assert_eq!(outputs.len(), 3);
    assert_eq!(outputs[0].as_int(), Some(16));
    let big_a = outputs[1].as_list().expect("list output");
    assert_eq!(big_a[0].as_float(), Some(6.0));
    assert_eq!(outputs[2].as_bag().expect("bag output").len(), 2);
}

#[tokio::test]
async fn replays_array_and_bag_outputs_without_rerunning_body() {
    init_tracing();
    let executor = CheckpointExecutor::new(Arc::new(MemoryStore::new()));
    let traces = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        // Arguments rebuilt from scratch each time: equality is structural
        let args = arrayf_args();
        let body_args = args.clone();
        let traced = Arc::clone(&traces);
        let outputs = executor
            .invoke("arrayf", &args, || async move {
                traced.fetch_add(1, Ordering::SeqCst);
                Ok(arrayf_body(&body_args))
            })
            .await
            .unwrap();
        assert_arrayf_outputs(&outputs);
    }

    assert_eq!(traces.load(Ordering::SeqCst), 1, "body traced exactly once");
}

#[tokio::test]
async fn bag_arguments_hit_regardless_of_insertion_order() {
    let executor = CheckpointExecutor::new(Arc::new(MemoryStore::new()));
    let traces = Arc::new(AtomicUsize::new(0));

    // The same multiset built in two insertion orders
    let forward: Bag = [Value::Int(1), Value::Int(2), Value::Int(2)].into_iter().collect();
    let backward: Bag = [Value::Int(2), Value::Int(2), Value::Int(1)].into_iter().collect();

    let mut results = Vec::new();
    for ibag in [forward, backward] {
        // g takes a list of bags; both entries are the same bag value
        let args = vec![Value::List(vec![
            Value::Bag(ibag.clone()),
            Value::Bag(ibag.clone()),
        ])];
        let traced = Arc::clone(&traces);
        let outputs = executor
            .invoke("g", &args, || async move {
                traced.fetch_add(1, Ordering::SeqCst);
                let first_size = ibag.len() as i64;
                let mut o = Bag::new();
                o.insert(Value::List(vec![Value::str(first_size.to_string())]));
                for chunk in [["1", "2", "3"], ["4", "5", "6"], ["7", "8", "9"]] {
                    o.insert(Value::List(chunk.iter().map(|s| Value::str(*s)).collect()));
                }
                Ok(vec![Value::Bag(o)])
            })
            .await
            .unwrap();
        results.push(outputs);
    }

    assert_eq!(traces.load(Ordering::SeqCst), 1, "second call replayed");
    assert_eq!(results[0], results[1]);

    let o = results[0][0].as_bag().expect("bag output");
    assert_eq!(o.len(), 4);
    assert!(o
        .iter()
        .any(|v| v.as_list().is_some_and(|l| l == [Value::str("3")].as_slice())));
}

#[tokio::test]
async fn replays_from_durable_store_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let traces = Arc::new(AtomicUsize::new(0));

    // First process lifetime: execute and persist
    {
        let store = Arc::new(FileStore::new_async(dir.path()).await.unwrap());
        let executor = CheckpointExecutor::new(store);
        let args = arrayf_args();
        let body_args = args.clone();
        let traced = Arc::clone(&traces);
        executor
            .invoke("arrayf", &args, || async move {
                traced.fetch_add(1, Ordering::SeqCst);
                Ok(arrayf_body(&body_args))
            })
            .await
            .unwrap();
    }

    // Second lifetime over the same directory: replay, never execute
    let store = Arc::new(FileStore::new_async(dir.path()).await.unwrap());
    let executor = CheckpointExecutor::new(store);
    let outputs = executor
        .invoke("arrayf", &arrayf_args(), || async {
            panic!("body must not run after restart")
        })
        .await
        .unwrap();

    assert_arrayf_outputs(&outputs);
    assert_eq!(traces.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn single_flight_over_durable_store() {
    const CALLERS: usize = 6;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::new_async(dir.path()).await.unwrap());
    let executor = CheckpointExecutor::new(store);
    let executions = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(tokio::sync::Barrier::new(CALLERS));

    let mut handles = Vec::new();
    for _ in 0..CALLERS {
        let executor = executor.clone();
        let executions = Arc::clone(&executions);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let args = arrayf_args();
            let body_args = args.clone();
            executor
                .invoke("arrayf", &args, || async move {
                    executions.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    Ok(arrayf_body(&body_args))
                })
                .await
        }));
    }

    for handle in handles {
        let outputs = handle.await.unwrap().unwrap();
        assert_arrayf_outputs(&outputs);
    }
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn distinct_arguments_execute_separately() {
    let executor = CheckpointExecutor::new(Arc::new(MemoryStore::new()));
    let traces = Arc::new(AtomicUsize::new(0));

    for b in [10i64, 11] {
        let args = vec![
            Value::Int(b),
            Value::List(vec![cblob("hello"), cblob("world")]),
        ];
        let body_args = args.clone();
        let traced = Arc::clone(&traces);
        let outputs = executor
            .invoke("arrayf", &args, || async move {
                traced.fetch_add(1, Ordering::SeqCst);
                Ok(arrayf_body(&body_args))
            })
            .await
            .unwrap();
        assert_eq!(outputs[0].as_int(), Some(b + 6));
    }

    assert_eq!(traces.load(Ordering::SeqCst), 2);
}
