//! Concurrency tests for the single-flight build cache
//!
//! Builds are artificially delayed so that every caller arrives while the
//! first build is still running.

use brrtserve::build_cache::{BuildCache, BuildError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

const CALLERS: usize = 8;

#[test]
fn test_concurrent_callers_share_one_build() {
    let cache: Arc<BuildCache<String>> = Arc::new(BuildCache::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(CALLERS));

    let workers: Vec<_> = (0..CALLERS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get_or_build("/resources/my/lib/themes/base/library.css", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(300));
                    Ok(Some("compiled".to_string()))
                })
            })
        })
        .collect();

    let outcomes: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcomes.len(), CALLERS);
    for outcome in outcomes {
        assert_eq!(outcome, Ok(Some("compiled".to_string())));
    }
    assert_eq!(cache.in_flight(), 0);
}

#[test]
fn test_distinct_keys_build_independently() {
    let cache: Arc<BuildCache<String>> = Arc::new(BuildCache::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(4));

    let workers: Vec<_> = ["a.css", "b.css", "a.css", "b.css"]
        .into_iter()
        .map(|key| {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let outcome = cache.get_or_build(key, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(300));
                    Ok(Some(key.to_string()))
                });
                (key, outcome)
            })
        })
        .collect();

    for worker in workers {
        let (key, outcome) = worker.join().unwrap();
        assert_eq!(outcome, Ok(Some(key.to_string())));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_failure_is_shared_then_retried() {
    let cache: Arc<BuildCache<String>> = Arc::new(BuildCache::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(3));

    let workers: Vec<_> = (0..3)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get_or_build("broken.css", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(300));
                    Err(BuildError::failed("broken.css", "unbalanced braces"))
                })
            })
        })
        .collect();

    for worker in workers {
        let err = worker.join().unwrap().unwrap_err();
        assert_eq!(err.to_string(), "Build of broken.css failed: unbalanced braces");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Settled failures are not remembered
    let retried = cache.get_or_build("broken.css", || Ok(Some("fixed".to_string())));
    assert_eq!(retried, Ok(Some("fixed".to_string())));
}

#[test]
fn test_invalidate_detaches_running_build() {
    const KEY: &str = "/resources/my/lib/themes/base/css_variables.css";
    const FOLLOWERS: usize = 3;
    let cache: Arc<BuildCache<String>> = Arc::new(BuildCache::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let (started_tx, started_rx) = mpsc::channel();

    let leader = {
        let cache = Arc::clone(&cache);
        let calls = Arc::clone(&calls);
        thread::spawn(move || {
            cache.get_or_build(KEY, || {
                calls.fetch_add(1, Ordering::SeqCst);
                started_tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(500));
                Ok(Some("first".to_string()))
            })
        })
    };
    started_rx.recv().unwrap();

    let followers: Vec<_> = (0..FOLLOWERS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            thread::spawn(move || {
                cache.get_or_build(KEY, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some("follower built".to_string()))
                })
            })
        })
        .collect();
    // Let the followers park on the running build
    thread::sleep(Duration::from_millis(100));

    assert!(cache.invalidate(KEY));
    assert_eq!(cache.in_flight(), 0);

    let fresh = cache.get_or_build(KEY, || {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some("second".to_string()))
    });
    assert_eq!(fresh, Ok(Some("second".to_string())));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert_eq!(leader.join().unwrap(), Ok(Some("first".to_string())));
    for follower in followers {
        assert_eq!(follower.join().unwrap(), Ok(Some("first".to_string())));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.in_flight(), 0);
    assert!(!cache.invalidate(KEY));
}
