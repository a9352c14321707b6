#![allow(deprecated)]

//! Correlation store and endpoint benchmarks

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::Duration;

use rendezvous::{CorrelationKey, CorrelationStore, ExchangeContext, Producer, ReplyConsumer};
use rendezvous_testing::{command_message, mock_endpoint};
use serde_json::json;

fn store_benchmark(c: &mut Criterion) {
    let store: Arc<CorrelationStore<u64>> = Arc::new(CorrelationStore::new());
    let key = CorrelationKey::from("bench");

    let mut group = c.benchmark_group("correlation_store");
    group.throughput(Throughput::Elements(1));

    group.bench_function("store_then_try_find", |b| {
        b.iter(|| {
            store.store(key.clone(), 42);
            black_box(store.try_find(&key))
        });
    });

    group.bench_function("try_find_miss", |b| {
        let missing = CorrelationKey::from("missing");
        b.iter(|| black_box(store.try_find(&missing)));
    });

    group.finish();
}

fn store_contention_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation_store_pending");

    for pending in [10usize, 1_000, 100_000] {
        let store: CorrelationStore<u64> = CorrelationStore::new();
        for i in 0..pending {
            store.store(CorrelationKey::new(format!("pending-{}", i)), i as u64);
        }
        let key = CorrelationKey::from("hot");

        group.bench_with_input(BenchmarkId::from_parameter(pending), &pending, |b, _| {
            b.iter(|| {
                store.store(key.clone(), 1);
                black_box(store.try_find(&key))
            });
        });
    }

    group.finish();
}

fn endpoint_round_trip_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (endpoint, backend) = mock_endpoint("bench-client").unwrap();
    let message = command_message("images:pull", json!({ "image": "busybox" }));

    let mut group = c.benchmark_group("endpoint");
    group.throughput(Throughput::Elements(1));

    group.bench_function("send_receive", |b| {
        b.to_async(&rt).iter(|| async {
            let mut context = ExchangeContext::new();
            endpoint.send(&message, &mut context).await.unwrap();
            black_box(
                endpoint
                    .receive_timeout(&mut context, Duration::from_secs(1))
                    .await
                    .unwrap(),
            )
        });
    });

    group.finish();
    backend.clear_calls();
}

criterion_group!(
    benches,
    store_benchmark,
    store_contention_benchmark,
    endpoint_round_trip_benchmark
);
criterion_main!(benches);
