use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::runtime::Runtime;

use fibre_flow::{batching, bounded, consume_each, Cause, Receiver, Scope};

const TOTAL_ITEMS: usize = 10_000;

// --- Benchmark Logic ---

async fn fan_in(producers: usize, capacity: usize) {
  let per_producer = TOTAL_ITEMS / producers;
  let mut receivers: Vec<Receiver<u64>> = Vec::with_capacity(producers);
  for _ in 0..producers {
    let (tx, rx) = bounded::<u64>(capacity);
    receivers.push(rx);
    tokio::spawn(async move {
      for i in 0..per_producer {
        if tx.send(i as u64).await.is_err() {
          break;
        }
      }
    });
  }

  let mut received = 0usize;
  let res: Result<(), Cause> = consume_each(receivers, |_| {
    received += 1;
    async { Ok(()) }
  })
  .await;
  assert!(res.is_ok());
  assert_eq!(received, per_producer * producers);
}

async fn batch_pipeline(capacity: usize) {
  let scope = Scope::new();
  let (tx, source) = bounded::<u64>(capacity);
  let (sink, batches) = bounded::<Vec<u64>>(1);
  batching(&scope, source, sink);

  tokio::spawn(async move {
    for i in 0..TOTAL_ITEMS {
      if tx.send(i as u64).await.is_err() {
        break;
      }
    }
  });

  let mut received = 0usize;
  while let Ok(batch) = batches.recv().await {
    received += batch.len();
  }
  assert_eq!(received, TOTAL_ITEMS);
  let _ = scope.join().await;
}

// --- Criterion Setup ---

fn bench_fan_in(c: &mut Criterion) {
  let rt = Runtime::new().expect("tokio runtime");
  let mut group = c.benchmark_group("consume_each_fan_in");
  group.throughput(Throughput::Elements(TOTAL_ITEMS as u64));
  for producers in [1usize, 4, 16] {
    group.bench_with_input(BenchmarkId::from_parameter(producers), &producers, |b, &producers| {
      b.to_async(&rt).iter(|| fan_in(producers, 64));
    });
  }
  group.finish();
}

fn bench_batching(c: &mut Criterion) {
  let rt = Runtime::new().expect("tokio runtime");
  let mut group = c.benchmark_group("batching");
  group.throughput(Throughput::Elements(TOTAL_ITEMS as u64));
  for capacity in [1usize, 64, 1024] {
    group.bench_with_input(BenchmarkId::new("source_capacity", capacity), &capacity, |b, &capacity| {
      b.to_async(&rt).iter(|| batch_pipeline(capacity));
    });
  }
  group.finish();
}

criterion_group!(benches, bench_fan_in, bench_batching);
criterion_main!(benches);
