use std::sync::Arc;

use crate::snapshot::{Delta, Snapshot};
use crate::source::{default_source, CounterSource};

/// Cheap-to-clone handle over the active counter source.
///
/// `capture` is side-effect free from the caller's perspective, but note
/// that on a hook-based source the first capture before
/// [`start_tracking`](SnapshotEngine::start_tracking) reflects stale or
/// zero counters; callers that need accurate deltas on such a source must
/// start tracking first. Every instrument constructor in this crate does
/// so.
#[derive(Clone, Debug)]
pub struct SnapshotEngine {
  source: Arc<dyn CounterSource>,
}

impl SnapshotEngine {
  #[must_use]
  pub fn builder() -> SnapshotEngineBuilder {
    SnapshotEngineBuilder::new()
  }

  /// Current cumulative counters from the active source.
  #[must_use]
  pub fn capture(&self) -> Snapshot {
    self.source.capture()
  }

  /// Field-wise `end - start`.
  #[must_use]
  pub fn delta(&self, start: &Snapshot, end: &Snapshot) -> Delta {
    Delta::between(start, end)
  }

  /// Engine over the process-default source, selected at build time.
  #[must_use]
  pub fn new() -> Self {
    Self {
      source: default_source(),
    }
  }

  pub fn reset_tracking(&self) {
    self.source.reset_tracking();
  }

  pub fn start_tracking(&self) {
    self.source.start_tracking();
  }

  pub fn stop_tracking(&self) -> Snapshot {
    self.source.stop_tracking()
  }

  /// Engine over an explicitly injected source.
  #[must_use]
  pub fn with_source(source: Arc<dyn CounterSource>) -> Self {
    Self { source }
  }
}

impl Default for SnapshotEngine {
  fn default() -> Self {
    Self::new()
  }
}

/// Thin builder mirroring the instrument constructors: no arguments are
/// required, a source may be injected for tests.
#[derive(Debug, Default)]
pub struct SnapshotEngineBuilder {
  source: Option<Arc<dyn CounterSource>>,
}

impl SnapshotEngineBuilder {
  #[must_use]
  pub fn finish(self) -> SnapshotEngine {
    match self.source {
      Some(source) => SnapshotEngine::with_source(source),
      None => SnapshotEngine::new(),
    }
  }

  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub fn source(mut self, source: Arc<dyn CounterSource>) -> Self {
    self.source = Some(source);
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::{NullSource, ScriptedSource};

  #[test]
  fn capture_delegates_to_injected_source() {
    let engine = SnapshotEngine::with_source(Arc::new(ScriptedSource::new(
      vec![Snapshot::new(4, 1, 64)],
    )));

    assert_eq!(engine.capture(), Snapshot::new(4, 1, 64));
  }

  #[test]
  fn delta_subtracts_field_wise() {
    let engine = SnapshotEngine::with_source(Arc::new(NullSource::new()));
    let start = Snapshot::new(1, 0, 100);
    let end = Snapshot::new(5, 2, 350);

    let delta = engine.delta(&start, &end);
    assert_eq!(delta.allocations, 4);
    assert_eq!(delta.deallocations, 2);
    assert_eq!(delta.bytes_allocated, 250);
  }

  #[test]
  fn builder_defaults_to_process_source() {
    // Only checks that construction succeeds; what the default source
    // reports depends on the platform and on whether the tracking
    // allocator is installed.
    let _ = SnapshotEngine::builder().finish();
  }

  #[test]
  fn builder_injects_source() {
    let engine = SnapshotEngine::builder()
      .source(Arc::new(NullSource::new()))
      .finish();

    assert_eq!(engine.capture(), Snapshot::ZERO);
  }
}
