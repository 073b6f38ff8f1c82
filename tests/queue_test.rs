//! Integration tests for the in-memory lease queue.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use batchq::model::WorkRecord;
use batchq::model::params::{LEASE_TOKEN, MESSAGE_ID};
use batchq::queue::{LEASE_TIMEOUT, MemoryWorkQueue, WorkQueue};

// ---------------------------------------------------------------------------
// Basic lifecycle: send → lease → delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_lease_delete_round_trip() {
    let queue = MemoryWorkQueue::new();

    let item = WorkRecord::new("job-1", "resize").with_param("Width", "640");
    let sent = queue.send(item).await.unwrap();
    assert!(sent.message_id().is_some());
    assert!(sent.lease_token().is_none());
    assert_eq!(queue.queued_len("resize"), 1);

    let leased = queue.lease_next("resize").await.unwrap().expect("item");
    assert_eq!(leased.key, "job-1");
    assert_eq!(leased.extra_params.get("Width"), Some("640"));
    assert_eq!(leased.message_id(), sent.message_id());
    assert!(leased.lease_token().is_some());
    assert_eq!(queue.queued_len("resize"), 0);
    assert_eq!(queue.leased_len("resize"), 1);

    queue.delete(&leased).await.unwrap();
    assert_eq!(queue.leased_len("resize"), 0);
    assert!(!queue.contains("resize", "job-1"));
}

#[tokio::test]
async fn lease_on_empty_or_unknown_type_returns_none() {
    let queue = MemoryWorkQueue::new();
    assert!(queue.lease_next("nothing-here").await.unwrap().is_none());

    queue.send(WorkRecord::new("a", "resize")).await.unwrap();
    assert!(queue.lease_next("transcode").await.unwrap().is_none());
}

#[tokio::test]
async fn lanes_are_fifo_per_worker_type() {
    let queue = MemoryWorkQueue::new();
    for key in ["a", "b", "c"] {
        queue.send(WorkRecord::new(key, "resize")).await.unwrap();
    }
    queue.send(WorkRecord::new("x", "transcode")).await.unwrap();

    let mut order = Vec::new();
    while let Some(item) = queue.lease_next("resize").await.unwrap() {
        order.push(item.key);
    }
    assert_eq!(order, ["a", "b", "c"]);
    assert_eq!(queue.queued_len("transcode"), 1);
}

#[tokio::test]
async fn send_assigns_fresh_delivery_id_and_strips_lease_token() {
    let queue = MemoryWorkQueue::new();
    let item = WorkRecord::new("a", "resize")
        .with_param(MESSAGE_ID, "old-id")
        .with_param(LEASE_TOKEN, "old-token");

    let sent = queue.send(item).await.unwrap();
    assert_ne!(sent.message_id(), Some("old-id"));
    assert!(sent.lease_token().is_none());
}

// ---------------------------------------------------------------------------
// Release and redelivery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn released_item_is_leased_again() {
    let queue = MemoryWorkQueue::new();
    queue.send(WorkRecord::new("a", "resize")).await.unwrap();

    let first = queue.lease_next("resize").await.unwrap().unwrap();
    queue.release(&first).await.unwrap();
    assert_eq!(queue.queued_len("resize"), 1);
    assert_eq!(queue.leased_len("resize"), 0);

    let second = queue.lease_next("resize").await.unwrap().unwrap();
    assert_eq!(second.key, "a");
    assert_eq!(second.message_id(), first.message_id());
    assert_ne!(second.lease_token(), first.lease_token());
}

#[tokio::test]
async fn delete_and_release_of_unleased_items_are_no_ops() {
    let queue = MemoryWorkQueue::new();
    let sent = queue.send(WorkRecord::new("a", "resize")).await.unwrap();

    // Never leased: no token, nothing in the lease set.
    queue.delete(&sent).await.unwrap();
    queue.release(&sent).await.unwrap();
    assert_eq!(queue.queued_len("resize"), 1);

    let leased = queue.lease_next("resize").await.unwrap().unwrap();
    queue.delete(&leased).await.unwrap();
    queue.delete(&leased).await.unwrap();
    queue.release(&leased).await.unwrap();
    assert_eq!(queue.queued_len("resize"), 0);
    assert_eq!(queue.leased_len("resize"), 0);
}

#[tokio::test]
async fn stale_lease_holder_cannot_touch_the_new_lease() {
    let queue = MemoryWorkQueue::with_lease_timeout(Duration::ZERO);
    queue.send(WorkRecord::new("a", "resize")).await.unwrap();

    let stale = queue.lease_next("resize").await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    // The expired lease is reclaimed on this call and handed out again.
    let current = queue.lease_next("resize").await.unwrap().unwrap();
    assert_ne!(stale.lease_token(), current.lease_token());

    queue.delete(&stale).await.unwrap();
    assert!(queue.contains("resize", "a"));
}

// ---------------------------------------------------------------------------
// Lease expiry
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn expired_lease_returns_item_to_queue() {
    let queue = MemoryWorkQueue::new();
    queue.send(WorkRecord::new("a", "resize")).await.unwrap();
    let _held = queue.lease_next("resize").await.unwrap().unwrap();

    tokio::time::advance(LEASE_TIMEOUT - Duration::from_secs(1)).await;
    assert!(queue.lease_next("resize").await.unwrap().is_none());

    tokio::time::advance(Duration::from_secs(2)).await;
    let again = queue
        .lease_next("resize")
        .await
        .unwrap()
        .expect("reclaimed");
    assert_eq!(again.key, "a");
}

#[tokio::test(start_paused = true)]
async fn reclaim_runs_on_every_operation() {
    let queue = MemoryWorkQueue::new();
    queue.send(WorkRecord::new("a", "resize")).await.unwrap();
    let _held = queue.lease_next("resize").await.unwrap().unwrap();

    tokio::time::advance(Duration::from_secs(301)).await;
    // Any call sweeps, even one for another worker type.
    queue.send(WorkRecord::new("b", "transcode")).await.unwrap();
    assert_eq!(queue.queued_len("resize"), 1);
    assert_eq!(queue.leased_len("resize"), 0);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_leases_never_hand_out_an_item_twice() {
    let queue = Arc::new(MemoryWorkQueue::new());
    for n in 0..200 {
        queue
            .send(WorkRecord::new(format!("job-{n}"), "resize"))
            .await
            .unwrap();
    }

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let queue = Arc::clone(&queue);
        tasks.push(tokio::spawn(async move {
            let mut keys = Vec::new();
            while let Some(item) = queue.lease_next("resize").await.unwrap() {
                keys.push(item.key);
            }
            keys
        }));
    }

    let mut seen = HashSet::new();
    for task in tasks {
        for key in task.await.unwrap() {
            assert!(seen.insert(key.clone()), "{key} leased twice");
        }
    }
    assert_eq!(seen.len(), 200);
}
