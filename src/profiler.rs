use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::cell::ConcurrentCell;
use crate::engine::SnapshotEngine;
use crate::histogram::Histogram;
use crate::measure;
use crate::snapshot::Delta;

/// Default bucket count for [`AllocationProfiler::histogram`].
pub const DEFAULT_HISTOGRAM_BUCKETS: usize = 10;

#[derive(Debug)]
struct ProfilerInner {
  engine: SnapshotEngine,
  measurements: ConcurrentCell<Vec<Delta>>,
}

/// Accumulates one allocation delta per profiled operation and derives
/// statistics over them.
///
/// Clones share state. Concurrent `profile` calls run their operations in
/// parallel; only the O(1) bookkeeping append at the end is serialized.
#[derive(Clone, Debug)]
pub struct AllocationProfiler {
  inner: Arc<ProfilerInner>,
}

impl AllocationProfiler {
  #[must_use]
  pub fn count(&self) -> usize {
    self.inner.measurements.with(|measurements| measurements.len())
  }

  /// Histogram over the byte counts of all measurements. See
  /// [`Histogram::from_values`] for the bucketing contract;
  /// [`DEFAULT_HISTOGRAM_BUCKETS`] is the conventional bucket count.
  #[must_use]
  pub fn histogram(&self, bucket_count: usize) -> Histogram {
    let values = self.field_values(|delta| delta.bytes_allocated);
    Histogram::from_values(&values, bucket_count)
  }

  /// [`histogram`](AllocationProfiler::histogram) with the conventional
  /// [`DEFAULT_HISTOGRAM_BUCKETS`] bucket count.
  #[must_use]
  pub fn histogram_default(&self) -> Histogram {
    self.histogram(DEFAULT_HISTOGRAM_BUCKETS)
  }

  /// Arithmetic mean of allocation counts; 0.0 when empty.
  #[must_use]
  pub fn mean_allocations(&self) -> f64 {
    self.mean_of(|delta| delta.allocations)
  }

  /// Arithmetic mean of byte counts; 0.0 when empty.
  #[must_use]
  pub fn mean_bytes(&self) -> f64 {
    self.mean_of(|delta| delta.bytes_allocated)
  }

  /// All recorded deltas, oldest first.
  #[must_use]
  pub fn measurements(&self) -> Vec<Delta> {
    self.inner.measurements.get()
  }

  #[must_use]
  pub fn median_allocations(&self) -> i64 {
    self.percentile_allocations(50.0)
  }

  #[must_use]
  pub fn median_bytes(&self) -> i64 {
    self.percentile_bytes(50.0)
  }

  #[must_use]
  pub fn new() -> Self {
    Self::with_engine(SnapshotEngine::new())
  }

  /// Nearest-rank percentile of allocation counts; see
  /// [`percentile_bytes`](AllocationProfiler::percentile_bytes) for the
  /// rounding contract.
  #[must_use]
  pub fn percentile_allocations(&self, p: f64) -> i64 {
    percentile_of(self.field_values(|delta| delta.allocations), p)
  }

  /// Nearest-rank percentile of byte counts.
  ///
  /// The values are sorted ascending and indexed at
  /// `floor(count * p / 100)`, clamped to `count - 1`. This is a
  /// nearest-rank percentile, not an interpolated one; an empty profiler
  /// reports 0. `p` is clamped into `[0, 100]`.
  #[must_use]
  pub fn percentile_bytes(&self, p: f64) -> i64 {
    percentile_of(self.field_values(|delta| delta.bytes_allocated), p)
  }

  /// Run `operation` under the measurement wrapper and record its delta.
  /// The operation's result is returned and may be discarded.
  pub fn profile<T>(&self, operation: impl FnOnce() -> T) -> T {
    let (result, delta) = measure::measure(&self.inner.engine, operation);
    self.push(delta);
    result
  }

  /// Suspendable variant of [`profile`](AllocationProfiler::profile).
  pub async fn profile_async<T>(
    &self,
    operation: impl Future<Output = T>,
  ) -> T {
    let (result, delta) =
      measure::measure_async(&self.inner.engine, operation).await;
    self.push(delta);
    result
  }

  /// Discard all measurements atomically.
  pub fn reset(&self) {
    let dropped = self.inner.measurements.replace(Vec::new());
    debug!(measurements = dropped.len(), "profiler reset");
  }

  /// Fallible variant of [`profile`](AllocationProfiler::profile): on
  /// failure nothing is recorded and the error propagates unchanged.
  ///
  /// # Errors
  ///
  /// Whatever `operation` fails with.
  pub fn try_profile<T, E>(
    &self,
    operation: impl FnOnce() -> Result<T, E>,
  ) -> Result<T, E> {
    let (result, delta) =
      measure::try_measure(&self.inner.engine, operation)?;
    self.push(delta);
    Ok(result)
  }

  #[must_use]
  pub fn with_engine(engine: SnapshotEngine) -> Self {
    engine.start_tracking();

    Self {
      inner: Arc::new(ProfilerInner {
        engine,
        measurements: ConcurrentCell::new(Vec::new()),
      }),
    }
  }

  fn field_values(&self, field: impl Fn(&Delta) -> i64) -> Vec<i64> {
    self
      .inner
      .measurements
      .with(|measurements| measurements.iter().map(field).collect())
  }

  fn mean_of(&self, field: impl Fn(&Delta) -> i64) -> f64 {
    let values = self.field_values(field);
    if values.is_empty() {
      return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let sum: f64 = values.iter().map(|&value| value as f64).sum();
    sum / values.len() as f64
  }

  fn push(&self, delta: Delta) {
    self
      .inner
      .measurements
      .with(|measurements| measurements.push(delta));
  }
}

impl Default for AllocationProfiler {
  fn default() -> Self {
    Self::new()
  }
}

fn percentile_of(mut values: Vec<i64>, p: f64) -> i64 {
  if values.is_empty() {
    return 0;
  }

  values.sort_unstable();

  let p = p.clamp(0.0, 100.0);
  #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
  let index = (values.len() as f64 * p / 100.0).floor() as usize;
  values[index.min(values.len() - 1)]
}
