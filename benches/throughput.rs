//! Throughput benchmarks for the render caches.
//!
//! Run with:
//!     cargo bench --bench throughput

use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use paintcache::entries::TextStyle;
use paintcache::object::Size;
use paintcache::{CacheConfig, CacheManager, ManualClock, Timestamp, TypedCache};

/// Entries each cache is pre-filled with.
const ENTRIES: u64 = 10_000;

/// Operations executed per criterion iteration (hot-loop size).
const OPS: u64 = 1_000;

fn filled(clock: &Arc<ManualClock>) -> TypedCache<u64, u64> {
    let cache = TypedCache::builder()
        .time_to_idle(Duration::from_secs(60))
        .clock(clock.clone())
        .build();
    for i in 0..ENTRIES {
        cache.insert(i, i * 2);
    }
    cache
}

// ---------------------------------------------------------------------------
// Group 1: get_hit, every key live, each hit renews its deadline
// ---------------------------------------------------------------------------

fn bench_get_hit(c: &mut Criterion) {
    let clock = Arc::new(ManualClock::new());
    let cache = filled(&clock);

    let mut group = c.benchmark_group("get_hit");
    group.throughput(Throughput::Elements(OPS));
    group.bench_function("get", |b| {
        b.iter(|| {
            for i in 0..OPS {
                black_box(cache.get(black_box(&i)));
            }
        })
    });
    group.bench_function("peek", |b| {
        b.iter(|| {
            for i in 0..OPS {
                black_box(cache.peek(black_box(&i)));
            }
        })
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// Group 2: get_or_create, the paint path's renderer/texture lookup
// ---------------------------------------------------------------------------

fn bench_get_or_create(c: &mut Criterion) {
    let clock = Arc::new(ManualClock::new());
    let cache = filled(&clock);

    let mut group = c.benchmark_group("get_or_create");
    group.throughput(Throughput::Elements(OPS));
    group.bench_function("hit", |b| {
        b.iter(|| {
            for i in 0..OPS {
                black_box(cache.get_or_create(black_box(i), || i));
            }
        })
    });
    group.bench_function("miss_then_remove", |b| {
        b.iter(|| {
            for i in ENTRIES..ENTRIES + OPS {
                black_box(cache.get_or_create(black_box(i), || i));
                cache.remove(&i);
            }
        })
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// Group 3: sweep, share of expired entries varies
// ---------------------------------------------------------------------------

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep_expired");
    group.throughput(Throughput::Elements(ENTRIES));

    for expired_pct in [0u64, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(expired_pct), &expired_pct, |b, &pct| {
            b.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let clock = Arc::new(ManualClock::new());
                    let cache: TypedCache<u64, u64> = TypedCache::builder()
                        .time_to_idle(Duration::from_secs(60))
                        .clock(clock.clone())
                        .build();
                    let stale = ENTRIES * pct / 100;
                    for i in 0..stale {
                        cache.insert(i, i);
                    }
                    clock.advance(Duration::from_secs(30));
                    for i in stale..ENTRIES {
                        cache.insert(i, i);
                    }
                    let now = Timestamp::from_duration(Duration::from_secs(61));

                    let start = Instant::now();
                    black_box(cache.sweep_expired(now));
                    total += start.elapsed();
                }
                total
            })
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Group 4: font metrics, 8 threads measuring text concurrently
// ---------------------------------------------------------------------------

fn bench_concurrent_font_metrics(c: &mut Criterion) {
    const THREADS: usize = 8;
    const OPS_PER_THREAD: u64 = 2_000;
    const WORDS: u64 = 512;

    let cache = Arc::new(CacheManager::new(CacheConfig::default()));
    let words: Arc<Vec<String>> = Arc::new((0..WORDS).map(|i| format!("word{i}")).collect());

    let mut group = c.benchmark_group("font_metrics_8t_50r_50w");
    group.throughput(Throughput::Elements(THREADS as u64 * OPS_PER_THREAD));
    group.bench_function("manager", |b| {
        b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                let barrier = Arc::new(Barrier::new(THREADS + 1));
                let handles: Vec<_> = (0..THREADS)
                    .map(|t| {
                        let cache = Arc::clone(&cache);
                        let words = Arc::clone(&words);
                        let bar = Arc::clone(&barrier);
                        std::thread::spawn(move || {
                            bar.wait();
                            let start = Instant::now();
                            let base = t as u64 * OPS_PER_THREAD;
                            for j in 0..OPS_PER_THREAD {
                                let word = &words[((base + j * 7_919) % WORDS) as usize];
                                if j % 2 == 0 {
                                    cache.set_font_metrics(
                                        word,
                                        14.0,
                                        TextStyle::default(),
                                        None,
                                        Size::new(40.0, 16.0),
                                        12.0,
                                    );
                                } else {
                                    black_box(cache.font_metrics(word, 14.0, TextStyle::default(), None));
                                }
                            }
                            start.elapsed()
                        })
                    })
                    .collect();
                barrier.wait();
                let elapsed = handles
                    .into_iter()
                    .map(|h| h.join().unwrap())
                    .max()
                    .unwrap_or_default();
                total += elapsed;
            }
            total
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_get_hit,
    bench_get_or_create,
    bench_sweep,
    bench_concurrent_font_metrics,
);
criterion_main!(benches);
