use bench_matrix::{
  criterion_runner::async_suite::AsyncBenchmarkSuite, AbstractCombination, MatrixCellValue,
};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::{
  future::Future,
  pin::Pin,
  time::{Duration, Instant},
};
use tokio::runtime::Runtime;

use fibre_handoff::Subject;

const ITEM_VALUE: u64 = 42;

#[derive(Debug, Clone)]
struct HandoffBenchConfig {
  num_items: usize, // Values pushed through one subject per iteration
}

#[derive(Default, Debug)]
struct BenchContext {
  items_processed_total: usize,
}

fn extract_handoff_config(combo: &AbstractCombination) -> Result<HandoffBenchConfig, String> {
  Ok(HandoffBenchConfig {
    num_items: combo.get_u64(0)? as usize,
  })
}

fn setup_fn_handoff_async(
  _runtime: &Runtime,
  _cfg: &HandoffBenchConfig,
) -> Pin<Box<dyn Future<Output = Result<(BenchContext, ()), String>> + Send>> {
  Box::pin(async move { Ok((BenchContext::default(), ())) })
}

// A subject can only be iterated once, so each iteration builds its own.
// Producer awaits every delivery while a spawned consumer drains the stream.
fn benchmark_logic_handoff_async(
  mut ctx: BenchContext,
  state: (),
  cfg: &HandoffBenchConfig,
) -> Pin<Box<dyn Future<Output = (BenchContext, (), Duration)> + Send>> {
  let cfg_clone = cfg.clone();
  Box::pin(async move {
    let start_time = Instant::now();
    let subject = Subject::new();
    let mut subscription = subject.subscribe();
    let consumer = tokio::spawn(async move {
      let mut received = 0usize;
      while let Some(item) = subscription.pull().await {
        item.expect("Handoff pull failed");
        received += 1;
      }
      received
    });
    for _ in 0..cfg_clone.num_items {
      subject
        .push(ITEM_VALUE)
        .expect("Handoff push failed")
        .await
        .expect("Handoff delivery failed");
    }
    subject.finish().expect("Handoff finish failed");
    let received = consumer.await.expect("Consumer task panicked");
    assert_eq!(received, cfg_clone.num_items);
    let duration = start_time.elapsed();
    ctx.items_processed_total += cfg_clone.num_items;
    (ctx, state, duration)
  })
}

fn teardown_handoff_async(
  _ctx: BenchContext,
  _state: (),
  _runtime: &Runtime,
  _cfg: &HandoffBenchConfig,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
  Box::pin(async move {})
}

fn handoff_async_benches(c: &mut Criterion) {
  let rt = Runtime::new().unwrap();
  let parameter_axes = vec![
    vec![
      MatrixCellValue::Unsigned(100),
      MatrixCellValue::Unsigned(1000),
    ], // NumItems
  ];
  let parameter_names = vec!["Items".to_string()];

  AsyncBenchmarkSuite::new(
    c,
    &rt,
    "SubjectAsync".to_string(),
    Some(parameter_names),
    parameter_axes,
    Box::new(extract_handoff_config),
    setup_fn_handoff_async,
    benchmark_logic_handoff_async,
    teardown_handoff_async,
  )
  .throughput(|cfg: &HandoffBenchConfig| Throughput::Elements(cfg.num_items as u64))
  .run();
}

criterion_group!(benches, handoff_async_benches);
criterion_main!(benches);
