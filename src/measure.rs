use std::future::Future;

use crate::engine::SnapshotEngine;
use crate::snapshot::Delta;

/// Bracket `operation` with two captures and return its result together
/// with the allocation delta observed across it.
pub fn measure<T>(
  engine: &SnapshotEngine,
  operation: impl FnOnce() -> T,
) -> (T, Delta) {
  let start = engine.capture();
  let result = operation();
  let end = engine.capture();
  (result, Delta::between(&start, &end))
}

/// Suspendable variant of [`measure`]. The two captures bracket the future
/// regardless of how long it runs or how many times it suspends.
pub async fn measure_async<T>(
  engine: &SnapshotEngine,
  operation: impl Future<Output = T>,
) -> (T, Delta) {
  let start = engine.capture();
  let result = operation.await;
  let end = engine.capture();
  (result, Delta::between(&start, &end))
}

/// Fallible variant of [`measure`].
///
/// On failure the end snapshot is not captured and no delta is computed;
/// the error propagates unchanged and no partial measurement exists.
pub fn try_measure<T, E>(
  engine: &SnapshotEngine,
  operation: impl FnOnce() -> Result<T, E>,
) -> Result<(T, Delta), E> {
  let start = engine.capture();
  let result = operation()?;
  let end = engine.capture();
  Ok((result, Delta::between(&start, &end)))
}

/// Fallible, suspendable variant of [`measure`]. Failure semantics match
/// [`try_measure`].
pub async fn try_measure_async<T, E>(
  engine: &SnapshotEngine,
  operation: impl Future<Output = Result<T, E>>,
) -> Result<(T, Delta), E> {
  let start = engine.capture();
  let result = operation.await?;
  let end = engine.capture();
  Ok((result, Delta::between(&start, &end)))
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use futures::executor::block_on;

  use super::*;
  use crate::snapshot::Snapshot;
  use crate::source::ScriptedSource;

  fn scripted_engine(snapshots: Vec<Snapshot>) -> SnapshotEngine {
    SnapshotEngine::with_source(Arc::new(ScriptedSource::new(snapshots)))
  }

  #[test]
  fn measure_returns_result_and_delta() {
    let engine = scripted_engine(vec![
      Snapshot::new(10, 2, 1000),
      Snapshot::new(15, 4, 2000),
    ]);

    let (result, delta) = measure(&engine, || "done");
    assert_eq!(result, "done");
    assert_eq!(delta.allocations, 5);
    assert_eq!(delta.deallocations, 2);
    assert_eq!(delta.bytes_allocated, 1000);
  }

  #[test]
  fn try_measure_propagates_failure_without_a_delta() {
    let engine = scripted_engine(vec![
      Snapshot::new(10, 0, 100),
      Snapshot::new(99, 0, 999),
    ]);

    let outcome: Result<((), Delta), &str> =
      try_measure(&engine, || Err("boom"));
    assert_eq!(outcome.unwrap_err(), "boom");

    // Only the start capture happened, so the script is still on its
    // second entry.
    assert_eq!(engine.capture(), Snapshot::new(99, 0, 999));
  }

  #[test]
  fn try_measure_success_carries_the_delta() {
    let engine = scripted_engine(vec![
      Snapshot::new(0, 0, 0),
      Snapshot::new(3, 1, 240),
    ]);

    let (value, delta) =
      try_measure(&engine, || Ok::<_, ()>(41 + 1)).expect("measured");
    assert_eq!(value, 42);
    assert_eq!(delta.bytes_allocated, 240);
    assert_eq!(delta.net_allocations(), 2);
  }

  #[test]
  fn measure_async_brackets_the_future() {
    let engine = scripted_engine(vec![
      Snapshot::new(1, 0, 10),
      Snapshot::new(2, 0, 30),
    ]);

    let (result, delta) = block_on(measure_async(&engine, async { 7 }));
    assert_eq!(result, 7);
    assert_eq!(delta.bytes_allocated, 20);
  }

  #[test]
  fn try_measure_async_propagates_failure() {
    let engine = scripted_engine(vec![Snapshot::ZERO]);

    let outcome: Result<(u32, Delta), &str> =
      block_on(try_measure_async(&engine, async { Err("late") }));
    assert_eq!(outcome.unwrap_err(), "late");
  }
}
