//! Integration tests for the feedback store
//!
//! Covers boundary validation, durability across reopen, and concurrent
//! writers racing on the same and on different backends.

use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

use maestro_engine::error::EngineError;
use maestro_engine::feedback::FeedbackStore;

#[test]
fn test_out_of_range_ratings_rejected_without_side_effects() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("feedback.jsonl");
    let store = FeedbackStore::open(&path).unwrap();

    store.record("task", "phi3", 5, None).unwrap();
    let log_before = std::fs::read_to_string(&path).unwrap();

    for bad in [0, 6] {
        let err = store.record("task", "phi3", bad, None).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    // Neither the aggregates nor the durable log moved
    let aggregate = store.aggregates_for("phi3");
    assert_eq!(aggregate.count, 1);
    assert_eq!(aggregate.mean_rating, 5.0);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), log_before);
}

#[test]
fn test_aggregates_survive_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("feedback.jsonl");

    {
        let store = FeedbackStore::open(&path).unwrap();
        store.record("first", "gemma3", 3, None).unwrap();
        store.record("second", "gemma3", 5, Some("nice".to_string())).unwrap();
        store.record("third", "phi3", 2, None).unwrap();
    }

    let reopened = FeedbackStore::open(&path).unwrap();
    assert_eq!(reopened.total_entries(), 3);

    let gemma = reopened.aggregates_for("gemma3");
    assert_eq!(gemma.count, 2);
    assert_eq!(gemma.mean_rating, 4.0);

    let phi = reopened.aggregates_for("phi3");
    assert_eq!(phi.count, 1);
    assert_eq!(phi.mean_rating, 2.0);
}

#[test]
fn test_concurrent_records_on_same_backend_lose_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("feedback.jsonl");
    let store = Arc::new(FeedbackStore::open(&path).unwrap());

    let threads: u64 = 8;
    let per_thread: u64 = 25;

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..per_thread {
                    store.record("racy task", "qwen3", 4, None).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let aggregate = store.aggregates_for("qwen3");
    assert_eq!(aggregate.count, threads * per_thread);
    assert_eq!(aggregate.mean_rating, 4.0);

    // Every record made it to the durable log as well
    let lines = std::fs::read_to_string(&path).unwrap().lines().count();
    assert_eq!(lines as u64, threads * per_thread);
}

#[test]
fn test_concurrent_records_on_different_backends_stay_isolated() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FeedbackStore::open(&dir.path().join("feedback.jsonl")).unwrap());

    let backends = ["phi3", "gemma3", "qwen3"];
    let per_backend: u64 = 40;

    let handles: Vec<_> = backends
        .iter()
        .enumerate()
        .map(|(i, backend)| {
            let store = store.clone();
            let backend: &'static str = *backend;
            let rating = (i as i64 % 5) + 1;
            thread::spawn(move || {
                for _ in 0..per_backend {
                    store.record("task", backend, rating, None).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    for (i, backend) in backends.iter().enumerate() {
        let aggregate = store.aggregates_for(backend);
        assert_eq!(aggregate.count, per_backend);
        assert_eq!(aggregate.mean_rating, ((i as i64 % 5) + 1) as f64);
    }
    assert_eq!(store.total_entries(), per_backend * backends.len() as u64);
}

#[test]
fn test_log_lines_are_human_readable_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("feedback.jsonl");
    let store = FeedbackStore::open(&path).unwrap();

    store
        .record("review my essay", "gemma3", 4, Some("helpful".to_string()))
        .unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let line = contents.lines().next().unwrap();
    let value: serde_json::Value = serde_json::from_str(line).unwrap();

    assert_eq!(value["backend"], "gemma3");
    assert_eq!(value["rating"], 4);
    assert_eq!(value["comment"], "helpful");
    assert!(value["timestamp"].is_string());
}
