use serde::Serialize;

/// Immutable cumulative counter reading taken at one instant.
///
/// Two snapshots are interchangeable whenever all three fields match; a
/// snapshot carries no identity beyond its values.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize)]
pub struct Snapshot {
  /// Cumulative allocation count since the counter epoch.
  pub allocations: i64,
  /// Cumulative bytes allocated since the counter epoch.
  pub bytes_allocated: i64,
  /// Cumulative deallocation count since the counter epoch. Always zero on
  /// sources that cannot observe frees.
  pub deallocations: i64,
}

impl Snapshot {
  pub const ZERO: Self = Self {
    allocations: 0,
    bytes_allocated: 0,
    deallocations: 0,
  };

  /// Difference between this snapshot and an `earlier` one.
  #[must_use]
  pub fn delta_since(&self, earlier: &Snapshot) -> Delta {
    Delta::between(earlier, self)
  }

  /// Allocations minus deallocations. Negative values are possible when the
  /// counter source resets mid-measurement.
  #[must_use]
  pub fn net_allocations(&self) -> i64 {
    self.allocations.saturating_sub(self.deallocations)
  }

  #[must_use]
  pub fn new(
    allocations: i64,
    deallocations: i64,
    bytes_allocated: i64,
  ) -> Self {
    Self {
      allocations,
      bytes_allocated,
      deallocations,
    }
  }
}

/// Field-wise difference between two snapshots.
///
/// Structurally identical to [`Snapshot`] but interpreted differently: every
/// field may legitimately be negative, because the underlying counter source
/// is not transactionally consistent across the delta window (background
/// reclamation, counter resets). Nothing in this crate clamps a delta to
/// zero.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize)]
pub struct Delta {
  pub allocations: i64,
  pub bytes_allocated: i64,
  pub deallocations: i64,
}

impl Delta {
  pub const ZERO: Self = Self {
    allocations: 0,
    bytes_allocated: 0,
    deallocations: 0,
  };

  /// Field-wise `end - start`. Total: no failure mode, no range
  /// restriction.
  #[must_use]
  pub fn between(start: &Snapshot, end: &Snapshot) -> Self {
    Self {
      allocations: end.allocations.saturating_sub(start.allocations),
      bytes_allocated: end
        .bytes_allocated
        .saturating_sub(start.bytes_allocated),
      deallocations: end.deallocations.saturating_sub(start.deallocations),
    }
  }

  /// Allocations minus deallocations, the leak signal.
  #[must_use]
  pub fn net_allocations(&self) -> i64 {
    self.allocations.saturating_sub(self.deallocations)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn self_delta_is_zero() {
    let snapshot = Snapshot::new(17, 4, 2048);
    assert_eq!(snapshot.delta_since(&snapshot), Delta::ZERO);
  }

  #[test]
  fn delta_is_field_wise_subtraction() {
    let start = Snapshot::new(10, 3, 500);
    let end = Snapshot::new(25, 9, 1300);

    let delta = Delta::between(&start, &end);
    assert_eq!(delta.allocations, 15);
    assert_eq!(delta.deallocations, 6);
    assert_eq!(delta.bytes_allocated, 800);
  }

  #[test]
  fn deltas_may_be_negative() {
    let start = Snapshot::new(100, 0, 4096);
    let end = Snapshot::new(60, 0, 1024);

    let delta = Delta::between(&start, &end);
    assert_eq!(delta.allocations, -40);
    assert_eq!(delta.bytes_allocated, -3072);
  }

  #[test]
  fn net_allocations_can_go_negative() {
    let delta = Delta {
      allocations: 2,
      bytes_allocated: 0,
      deallocations: 5,
    };
    assert_eq!(delta.net_allocations(), -3);
  }

  #[test]
  fn snapshots_with_equal_fields_are_interchangeable() {
    assert_eq!(Snapshot::new(1, 2, 3), Snapshot::new(1, 2, 3));
    assert_ne!(Snapshot::new(1, 2, 3), Snapshot::new(1, 2, 4));
  }
}
