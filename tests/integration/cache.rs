//! Memo caches under realistic access patterns.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use crate::common::{make_hash, ok, test_config, ScriptedPrimitive};
use tagstorm::{CoalescingMemoCache, ImageHash, MemoCache, TagStormClient, WorkerContext};

#[test]
fn test_lru_order_follows_access_not_insertion() {
    let mut cache = MemoCache::new(3);
    for k in 1..=3 {
        cache.get_or_compute(k, |k| k * 10);
    }
    // Touch 1 so that 2 becomes the eviction candidate
    assert_eq!(cache.get(&1), Some(&10));
    cache.get_or_compute(4, |k| k * 10);

    assert!(cache.contains(&1));
    assert!(!cache.contains(&2));
    assert!(cache.contains(&3));
    assert!(cache.contains(&4));
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_hit_rate_over_skewed_workload() {
    let mut cache = MemoCache::new(8);
    let computed = AtomicUsize::new(0);
    // 4 hot keys touched 25 times each, all fit
    for round in 0..100u32 {
        let key = round % 4;
        cache.get_or_compute(key, |k| {
            computed.fetch_add(1, Ordering::Relaxed);
            k + 1
        });
    }
    assert_eq!(computed.load(Ordering::Relaxed), 4);
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (96, 4));
    assert!((stats.hit_rate() - 0.96).abs() < 1e-9);
}

#[test]
fn test_failed_compute_retried_next_time() {
    let mut cache: MemoCache<&str, u32> = MemoCache::new(4);
    assert_eq!(
        cache.get_or_try_compute("k", |_| Err::<u32, _>("flaky")),
        Err("flaky")
    );
    assert!(cache.is_empty());
    assert_eq!(cache.get_or_try_compute("k", |_| Ok::<_, &str>(5)), Ok(5));
    assert_eq!(cache.peek(&"k"), Some(&5));
}

#[test]
fn test_coalescing_distinct_keys_do_not_serialize() {
    let cache = Arc::new(CoalescingMemoCache::new(16));
    let barrier = Arc::new(Barrier::new(4));

    thread::scope(|s| {
        for key in 0..4u32 {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            s.spawn(move || {
                cache.get_or_compute(key, |k| {
                    // Every compute waits for all four to be inside compute
                    // at once; a global lock would deadlock here.
                    barrier.wait();
                    k * 2
                })
            });
        }
    });

    assert_eq!(cache.len(), 4);
    assert_eq!(cache.peek(&3), Some(6));
    assert_eq!(cache.stats().misses, 4);
}

#[test]
fn test_coalescing_same_key_single_flight() {
    let cache = Arc::new(CoalescingMemoCache::new(4));
    let calls = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(6));

    let values: Vec<String> = thread::scope(|s| {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let start = Arc::clone(&start);
                s.spawn(move || {
                    start.wait();
                    cache.get_or_compute("embedding", |k| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        format!("{k}-vec")
                    })
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(values.iter().all(|v| v == "embedding-vec"));
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses), (5, 1));
}

#[test]
fn test_coalescing_capacity_zero_always_computes() {
    let cache = CoalescingMemoCache::new(0);
    let calls = AtomicUsize::new(0);
    for _ in 0..3 {
        cache.get_or_compute(1u8, |_| calls.fetch_add(1, Ordering::Relaxed));
    }
    assert_eq!(calls.load(Ordering::Relaxed), 3);
    assert!(cache.is_empty());
    assert_eq!(cache.stats().misses, 3);
}

#[test]
fn test_failed_compute_does_not_block_other_keys() {
    let cache: Arc<CoalescingMemoCache<u32, u32>> = Arc::new(CoalescingMemoCache::new(8));
    let (first_started, first_running) = mpsc::channel();
    let (fail_first, first_may_fail) = mpsc::channel::<()>();
    let (second_started, second_running) = mpsc::channel();
    let (finish_second, second_may_finish) = mpsc::channel::<()>();

    let first = thread::spawn({
        let cache = Arc::clone(&cache);
        move || {
            cache.get_or_try_compute(1, |_| {
                first_started.send(()).unwrap();
                first_may_fail.recv().unwrap();
                Err("upstream down")
            })
        }
    });
    first_running.recv().unwrap();

    // Queues on key 1's slot behind the first caller
    let second = thread::spawn({
        let cache = Arc::clone(&cache);
        move || {
            cache.get_or_compute(1, |_| {
                second_started.send(()).unwrap();
                second_may_finish.recv().unwrap();
                7
            })
        }
    });
    thread::sleep(Duration::from_millis(50));
    fail_first.send(()).unwrap();
    second_running.recv().unwrap();

    // The second compute is in flight; an unrelated key must not wait on it
    let (done, unrelated) = mpsc::channel();
    let third = thread::spawn({
        let cache = Arc::clone(&cache);
        move || done.send(cache.get_or_compute(99, |k| k + 1)).unwrap()
    });
    assert_eq!(unrelated.recv_timeout(Duration::from_secs(2)), Ok(100));

    finish_second.send(()).unwrap();
    assert_eq!(first.join().unwrap(), Err("upstream down"));
    assert_eq!(second.join().unwrap(), 7);
    third.join().unwrap();

    // The retry's value is cached even though the first slot was freed
    assert_eq!(cache.peek(&1), Some(7));
    assert_eq!(cache.get_or_compute(1, |_| 0), 7);
}

#[test]
fn test_peek_skips_value_still_computing() {
    let cache: Arc<CoalescingMemoCache<u32, u32>> = Arc::new(CoalescingMemoCache::new(4));
    let (started, running) = mpsc::channel();
    let (finish, may_finish) = mpsc::channel::<()>();

    let worker = thread::spawn({
        let cache = Arc::clone(&cache);
        move || {
            cache.get_or_compute(5, |k| {
                started.send(()).unwrap();
                may_finish.recv().unwrap();
                k * 2
            })
        }
    });
    running.recv().unwrap();

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.peek(&5), None);
    assert!(!cache.contains(&5));

    finish.send(()).unwrap();
    assert_eq!(worker.join().unwrap(), 10);
    assert_eq!(cache.peek(&5), Some(10));
}

#[tokio::test]
async fn test_one_context_per_worker() {
    let primitive = ScriptedPrimitive::new()
        .respond(ok(vec![1; 10]))
        .respond(ok(vec![1; 20]));
    let client = Arc::new(TagStormClient::with_primitive(
        test_config("http://tagstorm.test"),
        primitive.clone(),
    ));

    let mut a: WorkerContext<_, usize> = WorkerContext::new(Arc::clone(&client), 4);
    let mut b: WorkerContext<_, usize> = WorkerContext::new(Arc::clone(&client), 4);
    let hash: ImageHash = make_hash(9);
    let len = |bytes: &[u8]| Ok::<_, std::convert::Infallible>(bytes.len());

    assert_eq!(a.embedding_from_image(hash, len).await.unwrap(), 10);
    assert_eq!(a.embedding_from_image(hash, len).await.unwrap(), 10);
    // Separate cache: b fetches for itself
    assert_eq!(b.embedding_from_image(hash, len).await.unwrap(), 20);

    assert_eq!(primitive.calls(), 2);
    assert_eq!(a.cache_stats().hits, 1);
    assert_eq!(b.cache_stats().hits, 0);
}
