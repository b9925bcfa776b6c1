use std::sync::Arc;

use crate::cell::ConcurrentCell;
use crate::engine::SnapshotEngine;
use crate::snapshot::{Delta, Snapshot};

#[derive(Debug, Default)]
struct PeakState {
  peak_allocations: i64,
  peak_bytes: i64,
  samples: Vec<Delta>,
}

#[derive(Debug)]
struct PeakInner {
  baseline: Snapshot,
  engine: SnapshotEngine,
  state: ConcurrentCell<PeakState>,
}

/// Tracks running allocation maxima relative to a fixed baseline.
///
/// Peaks are non-decreasing across the tracker's lifetime except across an
/// explicit [`reset`](PeakMemoryTracker::reset). Clones share state.
#[derive(Clone, Debug)]
pub struct PeakMemoryTracker {
  inner: Arc<PeakInner>,
}

impl PeakMemoryTracker {
  /// Drift from the baseline to now, computed from a fresh capture and
  /// never cached.
  #[must_use]
  pub fn current(&self) -> Delta {
    Delta::between(&self.inner.baseline, &self.inner.engine.capture())
  }

  #[must_use]
  pub fn new() -> Self {
    Self::with_engine(SnapshotEngine::new())
  }

  /// Both peaks packed as a snapshot `(peak_allocations, 0, peak_bytes)`.
  /// Deallocations are not meaningful for a peak and are fixed at zero.
  #[must_use]
  pub fn peak(&self) -> Snapshot {
    self
      .inner
      .state
      .with(|state| Snapshot::new(state.peak_allocations, 0, state.peak_bytes))
  }

  #[must_use]
  pub fn peak_allocations(&self) -> i64 {
    self.inner.state.with(|state| state.peak_allocations)
  }

  #[must_use]
  pub fn peak_bytes(&self) -> i64 {
    self.inner.state.with(|state| state.peak_bytes)
  }

  /// Clear the samples and zero both peaks. The baseline is kept.
  pub fn reset(&self) {
    self.inner.state.with(|state| {
      state.peak_allocations = 0;
      state.peak_bytes = 0;
      state.samples.clear();
    });
  }

  /// Capture the current snapshot, append its delta from the baseline to
  /// the sample sequence, and fold it into the running peaks. All effects
  /// are atomic relative to concurrent `sample`/`reset` callers.
  pub fn sample(&self) -> Delta {
    self.inner.state.with(|state| {
      let snapshot = self.inner.engine.capture();
      let delta = Delta::between(&self.inner.baseline, &snapshot);

      state.peak_allocations = state.peak_allocations.max(delta.allocations);
      state.peak_bytes = state.peak_bytes.max(delta.bytes_allocated);
      state.samples.push(delta);

      delta
    })
  }

  /// Deltas recorded by [`sample`](PeakMemoryTracker::sample), oldest
  /// first.
  #[must_use]
  pub fn samples(&self) -> Vec<Delta> {
    self.inner.state.with(|state| state.samples.clone())
  }

  /// Run `operation` against a fresh tracker so it can call `sample` at
  /// points of interest, then return its result together with the peak
  /// packed as a snapshot.
  pub fn track<T>(
    operation: impl FnOnce(&PeakMemoryTracker) -> T,
  ) -> (T, Snapshot) {
    Self::track_with_engine(SnapshotEngine::new(), operation)
  }

  /// [`track`](PeakMemoryTracker::track) with an injected engine.
  pub fn track_with_engine<T>(
    engine: SnapshotEngine,
    operation: impl FnOnce(&PeakMemoryTracker) -> T,
  ) -> (T, Snapshot) {
    let tracker = Self::with_engine(engine);
    let result = operation(&tracker);
    (result, tracker.peak())
  }

  #[must_use]
  pub fn with_engine(engine: SnapshotEngine) -> Self {
    engine.start_tracking();
    let baseline = engine.capture();

    Self {
      inner: Arc::new(PeakInner {
        baseline,
        engine,
        state: ConcurrentCell::new(PeakState::default()),
      }),
    }
  }
}

impl Default for PeakMemoryTracker {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use std::thread;

  use super::*;
  use crate::source::ScriptedSource;

  fn tracker(snapshots: Vec<Snapshot>) -> PeakMemoryTracker {
    PeakMemoryTracker::with_engine(SnapshotEngine::with_source(Arc::new(
      ScriptedSource::new(snapshots),
    )))
  }

  #[test]
  fn peaks_follow_the_maximum_sample() {
    let tracker = tracker(vec![
      Snapshot::new(0, 0, 0),    // baseline
      Snapshot::new(4, 0, 400),  // sample 1
      Snapshot::new(9, 0, 1200), // sample 2
      Snapshot::new(6, 0, 300),  // sample 3, below the peak
    ]);

    tracker.sample();
    tracker.sample();
    tracker.sample();

    assert_eq!(tracker.peak_bytes(), 1200);
    assert_eq!(tracker.peak_allocations(), 9);
    assert_eq!(tracker.samples().len(), 3);

    let max_bytes = tracker
      .samples()
      .iter()
      .map(|delta| delta.bytes_allocated)
      .max();
    assert_eq!(max_bytes, Some(tracker.peak_bytes()));
  }

  #[test]
  fn peaks_are_non_decreasing_between_resets() {
    let tracker = tracker(vec![
      Snapshot::ZERO,
      Snapshot::new(10, 0, 1000),
      Snapshot::new(2, 0, 50),
      Snapshot::new(5, 0, 700),
    ]);

    let mut previous = 0;
    for _ in 0..3 {
      tracker.sample();
      let peak = tracker.peak_bytes();
      assert!(peak >= previous);
      previous = peak;
    }
  }

  #[test]
  fn negative_drift_never_lowers_a_peak() {
    let tracker = tracker(vec![
      Snapshot::new(100, 0, 10_000), // baseline
      Snapshot::new(40, 0, 2_000),   // background reclamation
    ]);

    let delta = tracker.sample();
    assert_eq!(delta.bytes_allocated, -8_000);
    assert_eq!(tracker.peak_bytes(), 0);
    assert_eq!(tracker.peak_allocations(), 0);
  }

  #[test]
  fn reset_clears_samples_and_peaks_but_not_the_baseline() {
    let tracker = tracker(vec![
      Snapshot::new(1, 0, 100), // baseline
      Snapshot::new(5, 0, 900),
      Snapshot::new(3, 0, 500), // sampled after the reset
    ]);

    tracker.sample();
    tracker.reset();

    assert!(tracker.samples().is_empty());
    assert_eq!(tracker.peak_bytes(), 0);
    assert_eq!(tracker.peak_allocations(), 0);

    // Deltas still use the original baseline.
    let delta = tracker.sample();
    assert_eq!(delta.allocations, 2);
    assert_eq!(delta.bytes_allocated, 400);
  }

  #[test]
  fn track_packs_the_peak_as_a_snapshot() {
    let engine = SnapshotEngine::with_source(Arc::new(ScriptedSource::new(
      vec![
        Snapshot::ZERO,
        Snapshot::new(7, 3, 640),
      ],
    )));

    let (result, peak) = PeakMemoryTracker::track_with_engine(
      engine,
      |tracker| {
        tracker.sample();
        "done"
      },
    );

    assert_eq!(result, "done");
    assert_eq!(peak, Snapshot::new(7, 0, 640));
  }

  #[test]
  fn concurrent_samples_are_all_recorded() {
    let script: Vec<Snapshot> =
      (0..=32).map(|i| Snapshot::new(i, 0, i * 10)).collect();
    let tracker = tracker(script);

    let mut handles = Vec::new();
    for _ in 0..8 {
      let tracker = tracker.clone();
      handles.push(thread::spawn(move || {
        for _ in 0..4 {
          tracker.sample();
        }
      }));
    }
    for handle in handles {
      handle.join().expect("sampler panicked");
    }

    assert_eq!(tracker.samples().len(), 32);
    assert_eq!(tracker.peak_bytes(), 320);
  }
}
