use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use thiserror::Error;

use nested::{service_error, Collection, Event, Monitor, State};

#[derive(Debug, Error)]
#[error("bench failure")]
struct BenchFailure;

fn monitor_with_observers(observers: usize) -> (Monitor, Arc<AtomicU64>) {
    let monitor = Monitor::named("bench");
    let delivered = Arc::new(AtomicU64::new(0));
    for _ in 0..observers {
        let delivered = Arc::clone(&delivered);
        monitor.register(move |_: &Event| {
            delivered.fetch_add(1, Ordering::Relaxed);
        });
    }
    (monitor, delivered)
}

fn bench_transition_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("monitor/transition");
    for observers in [0usize, 1, 4, 16] {
        group.throughput(Throughput::Elements(observers.max(1) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(observers), &observers, |b, &n| {
            let (monitor, _delivered) = monitor_with_observers(n);
            let err = service_error(BenchFailure);
            b.iter(|| {
                monitor.set_error(Arc::clone(&err));
                monitor.set_ready();
            });
        });
    }
    group.finish();
}

fn bench_noop_transition(c: &mut Criterion) {
    let (monitor, _delivered) = monitor_with_observers(4);
    monitor.set_ready();
    c.bench_function("monitor/noop", |b| {
        b.iter(|| monitor.set_state(State::Ready, None));
    });
}

fn bench_collection_recompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection/recompute");
    for members in [2usize, 8, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(members), &members, |b, &n| {
            let collection = Collection::named("bench");
            let services: Vec<Arc<Monitor>> = (0..n).map(|_| Arc::new(Monitor::new())).collect();
            for (i, service) in services.iter().enumerate() {
                collection.add(format!("service-{i}"), service.clone());
                service.set_ready();
            }
            collection.run();
            let err = service_error(BenchFailure);
            b.iter(|| {
                services[0].set_error(Arc::clone(&err));
                services[0].set_ready();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_transition_fanout, bench_noop_transition, bench_collection_recompute);
criterion_main!(benches);
