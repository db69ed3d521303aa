use connector_pool::{FnFactory, ObjectPool, PoolConfiguration};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn config(max_objects: usize) -> PoolConfiguration {
    PoolConfiguration::new()
        .with_max_objects(max_objects)
        .with_max_idle(max_objects)
        .with_min_idle(0)
        .with_max_wait(Duration::from_secs(5))
}

fn borrow_return(c: &mut Criterion) {
    let pool = ObjectPool::new(FnFactory::new(|| Ok(vec![0u8; 1024])), config(8)).unwrap();

    c.bench_function("borrow_return_single_thread", |b| {
        b.iter(|| {
            let entry = pool.borrow().unwrap();
            black_box(entry.len());
        })
    });
}

fn contended(c: &mut Criterion) {
    let pool = Arc::new(ObjectPool::new(FnFactory::new(|| Ok(0u64)), config(4)).unwrap());

    c.bench_function("borrow_return_8_threads", |b| {
        b.iter(|| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let pool = Arc::clone(&pool);
                    thread::spawn(move || {
                        for _ in 0..100 {
                            let mut entry = pool.borrow().unwrap();
                            *entry += 1;
                        }
                    })
                })
                .collect();
            for worker in workers {
                worker.join().unwrap();
            }
        })
    });
}

criterion_group!(benches, borrow_return, contended);
criterion_main!(benches);
