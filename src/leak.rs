use std::fmt::{self, Display, Formatter};
use std::panic::Location;

use crate::engine::SnapshotEngine;
use crate::snapshot::{Delta, Snapshot};

/// Raised by [`LeakDetector::assert_no_leaks`] when net allocations have
/// drifted from the baseline.
///
/// Recoverable: callers choose whether to treat it as fatal. The recorded
/// location identifies the assertion call site and is diagnostic metadata
/// only.
#[derive(Debug, Clone, Copy)]
pub struct LeakDetected {
  pub location: &'static Location<'static>,
  pub net_allocations: i64,
  pub net_bytes: i64,
}

impl Display for LeakDetected {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "leak detected at {}: {} net allocations, {} net bytes",
      self.location, self.net_allocations, self.net_bytes
    )
  }
}

impl std::error::Error for LeakDetected {}

/// Reports net allocation drift since its construction.
///
/// The baseline is captured once and never changes, so the detector is
/// thread-safe without any lock. On a hook-based source, construction
/// enables tracking before the baseline is taken.
#[derive(Clone, Debug)]
pub struct LeakDetector {
  baseline: Snapshot,
  engine: SnapshotEngine,
}

impl LeakDetector {
  /// Fail when net allocations differ from the baseline in either
  /// direction; succeed silently otherwise.
  ///
  /// # Errors
  ///
  /// Returns [`LeakDetected`] carrying the numeric drift and this call
  /// site whenever `net_allocations() != 0`.
  #[track_caller]
  pub fn assert_no_leaks(&self) -> Result<(), LeakDetected> {
    let delta = self.delta();
    if delta.net_allocations() != 0 {
      return Err(LeakDetected {
        location: Location::caller(),
        net_allocations: delta.net_allocations(),
        net_bytes: delta.bytes_allocated,
      });
    }
    Ok(())
  }

  /// Drift since construction, recomputed fresh on every call.
  #[must_use]
  pub fn delta(&self) -> Delta {
    Delta::between(&self.baseline, &self.engine.capture())
  }

  #[must_use]
  pub fn has_leaks(&self) -> bool {
    self.delta().net_allocations() > 0
  }

  #[must_use]
  pub fn net_allocations(&self) -> i64 {
    self.delta().net_allocations()
  }

  #[must_use]
  pub fn net_bytes(&self) -> i64 {
    self.delta().bytes_allocated
  }

  #[must_use]
  pub fn new() -> Self {
    Self::with_engine(SnapshotEngine::new())
  }

  #[must_use]
  pub fn with_engine(engine: SnapshotEngine) -> Self {
    engine.start_tracking();
    let baseline = engine.capture();
    Self { baseline, engine }
  }
}

impl Default for LeakDetector {
  fn default() -> Self {
    Self::new()
  }
}
