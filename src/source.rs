use std::alloc::{GlobalAlloc, Layout, System};
use std::fmt::Debug;
use std::sync::{
  atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
  Arc,
};

use tracing::debug;

use crate::snapshot::Snapshot;

/// Raw allocation counters, as produced by whatever platform mechanism was
/// linked into the process.
///
/// Implementations fall into two families that are never mixed at runtime:
///
/// - *Hook-based interception* ([`HookSource`]): counters increment on every
///   observed allocation and deallocation, but only after
///   [`start_tracking`](CounterSource::start_tracking) has been called.
///   Counts are monotonically non-decreasing while tracking is enabled.
/// - *Snapshot statistics* (`ZoneStatisticsSource` on macOS): every capture
///   reflects instantaneous global allocator state. Frees are not
///   observable, so `deallocations` is always zero, and byte deltas may be
///   negative under background reclamation.
///
/// When no mechanism is available, [`NullSource`] reports the zero snapshot
/// and every derived instrument degrades to reporting zero drift.
pub trait CounterSource: Debug + Send + Sync {
  /// Current cumulative counters.
  fn capture(&self) -> Snapshot;

  /// Zero the counters. Whether tracking is enabled is left unchanged.
  fn reset_tracking(&self) {}

  /// Begin counting. Idempotent: calling this while tracking is already
  /// enabled has no effect.
  fn start_tracking(&self) {}

  /// Capture the final cumulative counters, then stop counting. A later
  /// [`start_tracking`](CounterSource::start_tracking) resumes from the
  /// current values without clearing them.
  fn stop_tracking(&self) -> Snapshot {
    self.capture()
  }
}

static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);
static BYTES_ALLOCATED: AtomicU64 = AtomicU64::new(0);
static DEALLOCATIONS: AtomicU64 = AtomicU64::new(0);
static TRACKING: AtomicBool = AtomicBool::new(false);

fn note_alloc(size: usize) {
  if TRACKING.load(Ordering::Relaxed) {
    ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
    BYTES_ALLOCATED.fetch_add(size as u64, Ordering::Relaxed);
  }
}

fn note_dealloc() {
  if TRACKING.load(Ordering::Relaxed) {
    DEALLOCATIONS.fetch_add(1, Ordering::Relaxed);
  }
}

/// Allocator wrapper that feeds the process-global counters read by
/// [`HookSource`].
///
/// The embedding binary opts in by installing it:
///
/// ```rust,ignore
/// #[global_allocator]
/// static ALLOCATOR: heapwatch::TrackingAllocator =
///   heapwatch::TrackingAllocator;
/// ```
///
/// If it is never installed the counters stay at zero and every instrument
/// silently reports zero drift.
pub struct TrackingAllocator;

unsafe impl GlobalAlloc for TrackingAllocator {
  unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
    // SAFETY: delegates to the system allocator with the provided layout.
    let ptr = unsafe { System.alloc(layout) };
    if !ptr.is_null() {
      note_alloc(layout.size());
    }
    ptr
  }

  unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
    // SAFETY: delegates to the system allocator with the provided layout.
    let ptr = unsafe { System.alloc_zeroed(layout) };
    if !ptr.is_null() {
      note_alloc(layout.size());
    }
    ptr
  }

  unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
    // SAFETY: pointer and layout come from a matching allocation.
    unsafe { System.dealloc(ptr, layout) };
    note_dealloc();
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    // SAFETY: pointer and layout come from a matching allocation; new_size
    // is caller-provided per the GlobalAlloc contract.
    let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
    if !new_ptr.is_null() {
      // Gross-bytes model: only growth counts, a shrink frees nothing new.
      note_alloc(new_size.saturating_sub(layout.size()));
    }
    new_ptr
  }
}

/// Hook-based interception source backed by the counters maintained by
/// [`TrackingAllocator`].
///
/// The counters are process-global: every `HookSource` observes the same
/// heap, which is intentional since there is only one heap to observe.
#[derive(Debug, Default)]
pub struct HookSource;

impl HookSource {
  #[must_use]
  pub fn new() -> Self {
    Self
  }
}

impl CounterSource for HookSource {
  fn capture(&self) -> Snapshot {
    Snapshot::new(
      to_i64(ALLOCATIONS.load(Ordering::Relaxed)),
      to_i64(DEALLOCATIONS.load(Ordering::Relaxed)),
      to_i64(BYTES_ALLOCATED.load(Ordering::Relaxed)),
    )
  }

  fn reset_tracking(&self) {
    ALLOCATIONS.store(0, Ordering::Relaxed);
    DEALLOCATIONS.store(0, Ordering::Relaxed);
    BYTES_ALLOCATED.store(0, Ordering::Relaxed);
  }

  fn start_tracking(&self) {
    TRACKING.store(true, Ordering::Release);
  }

  fn stop_tracking(&self) -> Snapshot {
    let snapshot = self.capture();
    TRACKING.store(false, Ordering::Release);
    snapshot
  }
}

fn to_i64(value: u64) -> i64 {
  i64::try_from(value).unwrap_or(i64::MAX)
}

/// Source used when heap observation is unavailable or deliberately
/// disabled; every capture is the zero snapshot.
#[derive(Debug, Default)]
pub struct NullSource;

impl NullSource {
  #[must_use]
  pub fn new() -> Self {
    Self
  }
}

impl CounterSource for NullSource {
  fn capture(&self) -> Snapshot {
    Snapshot::ZERO
  }
}

/// Plays back a predetermined sequence of snapshots, repeating the final
/// entry once the sequence is exhausted.
///
/// Primarily intended for tests that need deterministic deltas without
/// touching the real allocator; an empty sequence behaves like
/// [`NullSource`].
#[derive(Debug)]
pub struct ScriptedSource {
  cursor: AtomicUsize,
  snapshots: Vec<Snapshot>,
}

impl ScriptedSource {
  #[must_use]
  pub fn new(snapshots: Vec<Snapshot>) -> Self {
    Self {
      cursor: AtomicUsize::new(0),
      snapshots,
    }
  }
}

impl CounterSource for ScriptedSource {
  fn capture(&self) -> Snapshot {
    let index = self.cursor.fetch_add(1, Ordering::Relaxed);
    let index = index.min(self.snapshots.len().saturating_sub(1));
    self.snapshots.get(index).copied().unwrap_or(Snapshot::ZERO)
  }
}

#[cfg(target_os = "macos")]
mod zone {
  use libc::{c_uint, c_void, size_t};

  use super::CounterSource;
  use crate::snapshot::Snapshot;

  #[allow(non_camel_case_types)]
  #[repr(C)]
  struct malloc_statistics_t {
    blocks_in_use: c_uint,
    size_in_use: size_t,
    max_size_in_use: size_t,
    size_allocated: size_t,
  }

  extern "C" {
    fn malloc_default_zone() -> *mut c_void;
    fn malloc_zone_statistics(
      zone: *mut c_void,
      stats: *mut malloc_statistics_t,
    );
  }

  /// Snapshot-statistics source that queries live aggregate state from the
  /// default malloc zone.
  ///
  /// Captures reflect the whole process, including memory not attributable
  /// to the measured code path. Frees are not observable, so
  /// `deallocations` is always zero and byte deltas may be negative when
  /// the allocator reclaims in the background.
  #[derive(Debug, Default)]
  pub struct ZoneStatisticsSource;

  impl ZoneStatisticsSource {
    #[must_use]
    pub fn new() -> Self {
      Self
    }
  }

  impl CounterSource for ZoneStatisticsSource {
    fn capture(&self) -> Snapshot {
      let mut stats = malloc_statistics_t {
        blocks_in_use: 0,
        size_in_use: 0,
        max_size_in_use: 0,
        size_allocated: 0,
      };

      // SAFETY: the default zone outlives the process and the statistics
      // struct matches the ABI layout malloc_zone_statistics expects.
      unsafe {
        malloc_zone_statistics(malloc_default_zone(), &mut stats);
      }

      Snapshot::new(
        i64::from(stats.blocks_in_use),
        0,
        i64::try_from(stats.size_in_use).unwrap_or(i64::MAX),
      )
    }
  }
}

#[cfg(target_os = "macos")]
pub use zone::ZoneStatisticsSource;

/// Process-default counter source, selected at build time.
///
/// On macOS this is the allocator-zone statistics source; everywhere else it
/// is the hook-based source, which only produces non-zero counters once the
/// embedding binary installs [`TrackingAllocator`]. The rest of the crate
/// never branches on platform identity, only on which source this function
/// returns.
#[must_use]
pub fn default_source() -> Arc<dyn CounterSource> {
  #[cfg(target_os = "macos")]
  {
    debug!("using allocator zone statistics counter source");
    Arc::new(ZoneStatisticsSource::new())
  }
  #[cfg(not(target_os = "macos"))]
  {
    debug!("using hook-based interception counter source");
    Arc::new(HookSource::new())
  }
}
