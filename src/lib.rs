//! Point-in-time and delta-based observation of a process's heap activity.
//!
//! The crate is built around one primitive, the counter [`Snapshot`], and
//! the field-wise [`Delta`] between two of them. Three instruments derive
//! observability signals from that primitive:
//!
//! - [`LeakDetector`] reports net allocation drift since its construction.
//! - [`PeakMemoryTracker`] keeps running maxima over sampled deltas.
//! - [`AllocationProfiler`] accumulates one delta per profiled operation
//!   and derives mean, median, nearest-rank percentiles, and a
//!   [`Histogram`].
//!
//! Raw counters come from a [`CounterSource`] selected at build time: a
//! hook-based interception source fed by [`TrackingAllocator`], or an
//! allocator-zone statistics source on macOS. When no source is available
//! every capture is the zero snapshot and all instruments degrade to
//! reporting zero drift without erroring. The intended audience is test
//! suites, CI regression gates, and lightweight monitoring that need
//! allocation budgets without a full profiler.

mod cell;
mod engine;
mod histogram;
mod leak;
mod measure;
mod peak;
mod profiler;
mod report;
mod snapshot;
mod source;

pub use {
  cell::ConcurrentCell,
  engine::{SnapshotEngine, SnapshotEngineBuilder},
  histogram::{Bucket, Histogram},
  leak::{LeakDetected, LeakDetector},
  measure::{measure, measure_async, try_measure, try_measure_async},
  peak::PeakMemoryTracker,
  profiler::{AllocationProfiler, DEFAULT_HISTOGRAM_BUCKETS},
  report::{ExportError, ProfileReport},
  snapshot::{Delta, Snapshot},
  source::{
    default_source, CounterSource, HookSource, NullSource, ScriptedSource,
    TrackingAllocator,
  },
};

#[cfg(target_os = "macos")]
pub use source::ZoneStatisticsSource;
