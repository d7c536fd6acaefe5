//! Integration tests for rcp_utils: lock registry, clock, random source and UDS server

use rcp_utils::organ::{Organ, Stimulus, UtilsOrgan};
use rcp_utils::{api, server, ClockMode, MutexId, MutexRegistry, RandomSource, Seeder, TimeSource, UtilsConfig};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::{UnixListener, UnixStream};

/// Helper to create a test stimulus
fn create_stimulus(op: &str, input: serde_json::Value) -> Stimulus {
    Stimulus {
        op: op.to_string(),
        input,
        context: HashMap::new(),
    }
}

/// Seeder that counts how often it is asked for a seed
struct CountingSeeder {
    calls: AtomicUsize,
}

impl Seeder for CountingSeeder {
    fn seed(&self) -> u64 {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Widen the window in which a racing initializer could slip in
        thread::sleep(Duration::from_millis(5));
        99
    }
}

#[test]
fn test_connection_lock_loses_no_updates() {
    const THREADS: usize = 8;
    const ITERATIONS: u64 = 2_000;

    let registry = Arc::new(MutexRegistry::new());
    // Non-atomic read-modify-write; only the named lock makes it safe
    let counter = Arc::new(AtomicU64::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..ITERATIONS {
                    registry.lock(MutexId::Connection);
                    let value = counter.load(Ordering::Relaxed);
                    thread::yield_now();
                    counter.store(value + 1, Ordering::Relaxed);
                    registry.unlock(MutexId::Connection);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(counter.load(Ordering::Relaxed), THREADS as u64 * ITERATIONS);
}

#[test]
fn test_named_locks_are_independent() {
    let registry = Arc::new(MutexRegistry::new());
    registry.lock(MutexId::Connection);

    let (tx, rx) = mpsc::channel();
    let other = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            registry.lock(MutexId::Discovery);
            tx.send(()).unwrap();
            registry.unlock(MutexId::Discovery);
        })
    };

    rx.recv_timeout(Duration::from_secs(5))
        .expect("discovery lock blocked behind connection lock");
    other.join().unwrap();

    assert!(registry.is_locked(MutexId::Connection));
    registry.unlock(MutexId::Connection);
}

#[test]
fn test_unknown_mutex_id_is_noop() {
    let registry = MutexRegistry::new();

    // Held lock stays held, free lock stays free
    registry.lock(MutexId::Discovery);
    for raw in [2, 3, -1, i32::MAX, i32::MIN] {
        registry.lock_raw(raw);
        registry.unlock_raw(raw);
    }

    assert!(registry.is_locked(MutexId::Discovery));
    assert!(!registry.is_locked(MutexId::Connection));

    registry.unlock_raw(MutexId::Discovery.as_raw());
    assert!(!registry.is_locked(MutexId::Discovery));
}

#[test]
fn test_elapsed_millis_monotonic_across_threads() {
    let clock = Arc::new(TimeSource::new(ClockMode::Live));
    let baseline = clock.elapsed_millis();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let clock = Arc::clone(&clock);
            thread::spawn(move || {
                let mut last = baseline;
                for _ in 0..500 {
                    let now = clock.elapsed_millis();
                    assert!(now >= last, "clock went backwards: {} < {}", now, last);
                    last = now;
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_frozen_clock_concurrent_first_call() {
    // Epoch and "now" are both captured by whichever call comes first, after
    // which every reading is that same frozen value.
    let clock = Arc::new(TimeSource::new(ClockMode::Frozen));
    let barrier = Arc::new(Barrier::new(16));

    let readings: Vec<u32> = (0..16)
        .map(|_| {
            let clock = Arc::clone(&clock);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                clock.elapsed_millis()
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let first = clock.elapsed_millis();
    assert!(readings.iter().all(|&r| r == first));
}

#[test]
fn test_random_source_seeds_exactly_once() {
    const THREADS: usize = 100;

    let seeder = Arc::new(CountingSeeder { calls: AtomicUsize::new(0) });
    let source = Arc::new(RandomSource::with_seeder(seeder.clone()));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let source = Arc::clone(&source);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                source.next()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap() >= 0);
    }

    assert_eq!(seeder.calls.load(Ordering::SeqCst), 1);
    assert!(source.is_seeded());
}

#[test]
fn test_waiter_observes_completed_critical_section() {
    let registry = Arc::new(MutexRegistry::new());
    let log = Arc::new(std::sync::Mutex::new(Vec::new()));

    registry.lock(MutexId::Connection);

    let (started_tx, started_rx) = mpsc::channel();
    let thread_b = {
        let registry = Arc::clone(&registry);
        let log = Arc::clone(&log);
        thread::spawn(move || {
            started_tx.send(()).unwrap();
            registry.lock(MutexId::Connection);
            let seen = log.lock().unwrap().clone();
            log.lock().unwrap().push("b");
            registry.unlock(MutexId::Connection);
            seen
        })
    };

    started_rx.recv().unwrap();
    // A's critical section spans several steps while B is blocked
    for step in ["a1", "a2", "a3"] {
        log.lock().unwrap().push(step);
        thread::sleep(Duration::from_millis(10));
    }
    registry.unlock(MutexId::Connection);

    let seen_by_b = thread_b.join().unwrap();
    assert_eq!(seen_by_b, vec!["a1", "a2", "a3"]);
    assert_eq!(*log.lock().unwrap(), vec!["a1", "a2", "a3", "b"]);
}

#[tokio::test]
async fn test_organ_describe() {
    let organ = UtilsOrgan::new();
    let card = organ.describe();

    assert_eq!(card.name, "rcp_utils");
    assert_eq!(card.division, "camera");
    assert!(card.execution_modes.contains(&"server".to_string()));
    assert_eq!(card.functions.len(), 5);
}

#[tokio::test]
async fn test_organ_tracks_requests() {
    let organ = UtilsOrgan::new();

    organ.stimulate(create_stimulus("rcp.timestamp", json!({}))).await.unwrap();
    organ.stimulate(create_stimulus("rcp.rand", json!({"count": 3}))).await.unwrap();
    organ.stimulate(create_stimulus("invalid.operation", json!({}))).await.unwrap();

    let response = organ.stimulate(create_stimulus("metrics", json!({}))).await.unwrap();
    assert!(response.ok);
    assert_eq!(response.output["total_requests"], 3);
    assert_eq!(response.output["failed_requests"], 1);
    assert_eq!(response.output["random_draws"], 3);
    assert_eq!(response.output["timestamp_queries"], 1);
}

#[tokio::test]
async fn test_server_round_trip() {
    let dir = TempDir::new().unwrap();
    let socket_path = dir.path().join("rcp_utils.sock");

    let config = UtilsConfig {
        socket_path: socket_path.clone(),
        clock_mode: ClockMode::Live,
        seed: Some(5),
    };
    let organ = Arc::new(UtilsOrgan::from_config(&config));
    let listener = UnixListener::bind(&socket_path).unwrap();
    let server_task = tokio::spawn(server::serve(listener, organ));

    let mut stream = UnixStream::connect(&socket_path).await.unwrap();

    let health = server::request(&mut stream, &create_stimulus("health", json!({}))).await.unwrap();
    assert!(health.ok);
    assert_eq!(health.output["status"], "healthy");
    assert_eq!(health.output["organ"], "rcp_utils");

    let rand = server::request(&mut stream, &create_stimulus("rcp.rand", json!({}))).await.unwrap();
    assert!(rand.ok);
    assert!(rand.output["value"].as_i64().unwrap() >= 0);

    let status = server::request(&mut stream, &create_stimulus("rcp.mutex.status", json!({"mutex": "connection"})))
        .await
        .unwrap();
    assert_eq!(status.output["locked"], false);

    let unsupported = server::request(&mut stream, &create_stimulus("raw.preview", json!({}))).await.unwrap();
    assert!(!unsupported.ok);

    drop(stream);
    server_task.abort();
}

#[tokio::test]
async fn test_server_rejects_oversized_frame() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let dir = TempDir::new().unwrap();
    let socket_path = dir.path().join("oversized.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();
    let server_task = tokio::spawn(server::serve(listener, Arc::new(UtilsOrgan::new())));

    let mut stream = UnixStream::connect(&socket_path).await.unwrap();
    let len = (server::MAX_FRAME_LEN as u32 + 1).to_be_bytes();
    stream.write_all(&len).await.unwrap();

    // Server drops the connection without answering
    let mut buf = [0u8; 4];
    let read = stream.read(&mut buf).await.unwrap_or(0);
    assert_eq!(read, 0);

    server_task.abort();
}

#[tokio::test]
async fn test_daemon_organ_reports_api_locks() {
    let organ = UtilsOrgan::process_wide(&UtilsConfig::default());
    assert!(Arc::ptr_eq(&organ.registry(), &api::registry()));

    api::lock(MutexId::Connection);
    let held = organ.stimulate(create_stimulus("rcp.mutex.status", json!({}))).await.unwrap();
    api::unlock(MutexId::Connection);

    assert!(held.ok);
    assert_eq!(held.output["connection"]["locked"], true);
    assert_eq!(held.output["discovery"]["locked"], false);

    let released = organ
        .stimulate(create_stimulus("rcp.mutex.status", json!({"mutex": "connection"})))
        .await
        .unwrap();
    assert_eq!(released.output["locked"], false);
}
