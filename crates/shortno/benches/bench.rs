use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use shortno::{Allocator, MemoryStore, ShortnoStore, SqliteStore};
use std::{sync::Arc, time::Instant};
use tokio::runtime::Builder;

// Number of claims per benchmark iteration.
const TOTAL_IDS: usize = 4096;

fn seed(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{i:010}")).collect()
}

/// Benchmarks serialized claims from a freshly seeded store.
fn bench_allocate<S, F>(c: &mut Criterion, group_name: &str, concurrency: usize, make_store: F)
where
    S: ShortnoStore,
    F: Fn() -> S,
{
    let rt = Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");

    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_IDS as u64));

    group.bench_function(format!("elems/{TOTAL_IDS}/tasks/{concurrency}"), |b| {
        b.to_async(&rt).iter_custom(|iters| {
            let stores: Vec<_> = (0..iters).map(|_| Arc::new(make_store())).collect();
            async move {
                let mut elapsed = core::time::Duration::ZERO;
                for store in stores {
                    store.insert_batch(&seed(TOTAL_IDS)).await.unwrap();
                    let allocator = Arc::new(Allocator::new(store, None));

                    let start = Instant::now();
                    let tasks: Vec<_> = (0..concurrency)
                        .map(|_| {
                            let allocator = Arc::clone(&allocator);
                            tokio::spawn(async move {
                                for _ in 0..TOTAL_IDS / concurrency {
                                    black_box(allocator.allocate().await.unwrap());
                                }
                            })
                        })
                        .collect();
                    for task in tasks {
                        task.await.unwrap();
                    }
                    elapsed += start.elapsed();
                }
                elapsed
            }
        });
    });

    group.finish();
}

fn benches(c: &mut Criterion) {
    for concurrency in [1, 8] {
        bench_allocate(c, "memory/allocate", concurrency, MemoryStore::new);
        bench_allocate(c, "sqlite/allocate", concurrency, || {
            SqliteStore::open_in_memory().expect("failed to open store")
        });
    }
}

criterion_group!(allocate, benches);
criterion_main!(allocate);
