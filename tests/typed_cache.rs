use paintcache::listener::EvictionCause;
use paintcache::{ManualClock, TypedCache};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

fn cache_with_clock(ttl: Duration) -> (TypedCache<String, u32>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let cache = TypedCache::builder()
        .time_to_idle(ttl)
        .clock(clock.clone())
        .build();
    (cache, clock)
}

fn key(s: &str) -> String {
    s.to_string()
}

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

#[test]
fn get_extends_life_and_expiry_hides_value() {
    let (cache, clock) = cache_with_clock(Duration::from_millis(100));
    cache.insert(key("hello"), 5);

    clock.advance(Duration::from_millis(50));
    assert_eq!(cache.get(&key("hello")).as_deref(), Some(&5));

    // 110ms after insertion but only 60ms after the last hit.
    clock.advance(Duration::from_millis(60));
    assert_eq!(cache.get(&key("hello")).as_deref(), Some(&5));

    clock.advance(Duration::from_millis(100));
    assert_eq!(cache.get(&key("hello")), None);
    // Still resident until a sweep takes it.
    assert!(cache.contains(&key("hello")));
}

#[test]
fn peek_does_not_extend_life() {
    let (cache, clock) = cache_with_clock(Duration::from_millis(100));
    cache.insert(key("k"), 1);
    clock.advance(Duration::from_millis(80));
    assert!(cache.peek(&key("k")).is_some());
    clock.advance(Duration::from_millis(20));
    assert!(cache.peek(&key("k")).is_none());
}

#[test]
fn sweep_removes_only_expired() {
    let (cache, clock) = cache_with_clock(Duration::from_secs(1));
    cache.insert(key("old"), 1);
    clock.advance(Duration::from_millis(600));
    cache.insert(key("new"), 2);
    clock.advance(Duration::from_millis(600));

    let swept = cache.sweep_expired(clock_now(&clock));
    assert_eq!(swept.len(), 1);
    assert_eq!(swept[0].0, "old");
    assert_eq!(cache.len(), 1);
    assert!(cache.peek(&key("new")).is_some());
}

fn clock_now(clock: &ManualClock) -> paintcache::Timestamp {
    use paintcache::Clock;
    clock.now()
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

#[test]
fn concurrent_get_or_create_runs_factory_once() {
    let (cache, _clock) = cache_with_clock(Duration::from_secs(60));
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.get_or_create(key("shared"), || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    42
                })
            })
        })
        .collect();

    let values: Vec<Arc<u32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
}

#[test]
fn declined_creation_is_retried() {
    let (cache, _clock) = cache_with_clock(Duration::from_secs(60));
    assert_eq!(cache.try_get_or_create(key("t"), || None), None);
    assert!(!cache.contains(&key("t")));
    assert_eq!(cache.try_get_or_create(key("t"), || Some(3)).as_deref(), Some(&3));
}

#[test]
fn expired_value_is_recreated_not_reused() {
    let (cache, clock) = cache_with_clock(Duration::from_millis(10));
    let first = cache.get_or_create(key("k"), || 1);
    clock.advance(Duration::from_millis(10));
    let second = cache.get_or_create(key("k"), || 2);
    assert_eq!((*first, *second), (1, 2));
}

// ---------------------------------------------------------------------------
// Iteration
// ---------------------------------------------------------------------------

#[test]
fn range_allows_removal_while_visiting() {
    let (cache, _clock) = cache_with_clock(Duration::from_secs(60));
    for i in 0..100u32 {
        cache.insert(format!("k{i}"), i);
    }
    let mut visited = 0;
    cache.range(|k, v| {
        visited += 1;
        if **v % 2 == 0 {
            cache.remove(k);
        }
        true
    });
    assert_eq!(visited, 100);
    assert_eq!(cache.len(), 50);
}

#[test]
fn range_stops_when_visitor_says_so() {
    let (cache, _clock) = cache_with_clock(Duration::from_secs(60));
    for i in 0..10u32 {
        cache.insert(format!("k{i}"), i);
    }
    let mut visited = 0;
    cache.range(|_, _| {
        visited += 1;
        visited < 3
    });
    assert_eq!(visited, 3);
}

// ---------------------------------------------------------------------------
// Listener and statistics
// ---------------------------------------------------------------------------

#[test]
fn listener_sees_every_cause() {
    let clock = Arc::new(ManualClock::new());
    let log: Arc<Mutex<Vec<(String, EvictionCause)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let cache: TypedCache<String, u32> = TypedCache::builder()
        .time_to_idle(Duration::from_secs(1))
        .clock(clock.clone())
        .eviction_listener(move |k: &String, _v, cause| sink.lock().unwrap().push((k.clone(), cause)))
        .build();

    cache.insert(key("a"), 1);
    cache.insert(key("a"), 2);
    cache.remove(&key("a"));
    cache.insert(key("b"), 1);
    clock.advance(Duration::from_secs(2));
    cache.sweep_expired(clock_now(&clock));
    cache.insert(key("c"), 1);
    cache.clear();

    let log = log.lock().unwrap();
    assert_eq!(
        *log,
        vec![
            (key("a"), EvictionCause::Replaced),
            (key("a"), EvictionCause::Explicit),
            (key("b"), EvictionCause::Expired),
            (key("c"), EvictionCause::Cleared),
        ]
    );
}

#[test]
fn stats_track_hits_misses_and_evictions() {
    let (cache, clock) = cache_with_clock(Duration::from_secs(1));
    cache.insert(key("k"), 1);
    cache.get(&key("k"));
    cache.get(&key("k"));
    cache.get(&key("missing"));
    clock.advance(Duration::from_secs(1));
    cache.sweep_expired(clock_now(&clock));

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.removed, 0);
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.lookups(), 3);
}

#[test]
fn stats_tell_expiry_apart_from_removal_and_replacement() {
    let (cache, clock) = cache_with_clock(Duration::from_secs(1));
    cache.insert(key("a"), 1);
    cache.insert(key("a"), 2);
    cache.insert(key("b"), 3);
    cache.remove(&key("b"));
    cache.insert(key("c"), 4);
    clock.advance(Duration::from_secs(1));
    // Creation over an expired entry displaces it.
    cache.get_or_create(key("a"), || 5);
    cache.clear();

    let stats = cache.stats();
    assert_eq!(stats.replaced, 1);
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.removed, 3);
    assert_eq!(stats.misses, 1);
}
