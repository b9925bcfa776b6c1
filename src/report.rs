use std::fmt::{self, Display, Formatter};
use std::io::{self, Write};

use serde::Serialize;

use crate::histogram::Histogram;
use crate::profiler::{AllocationProfiler, DEFAULT_HISTOGRAM_BUCKETS};

/// Errors that can occur when exporting a profile report.
#[derive(Debug)]
pub enum ExportError {
  Io(io::Error),
  Json(serde_json::Error),
}

impl Display for ExportError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      Self::Io(err) => write!(f, "i/o error during export: {err}"),
      Self::Json(err) => {
        write!(f, "failed to encode report as json: {err}")
      }
    }
  }
}

impl std::error::Error for ExportError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Self::Io(err) => Some(err),
      Self::Json(err) => Some(err),
    }
  }
}

impl From<io::Error> for ExportError {
  fn from(value: io::Error) -> Self {
    Self::Io(value)
  }
}

impl From<serde_json::Error> for ExportError {
  fn from(value: serde_json::Error) -> Self {
    Self::Json(value)
  }
}

/// Serializable summary of a profiler's accumulated measurements.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileReport {
  pub count: usize,
  pub histogram: Histogram,
  pub mean_allocations: f64,
  pub mean_bytes: f64,
  pub median_bytes: i64,
  pub p90_bytes: i64,
  pub p95_bytes: i64,
  pub p99_bytes: i64,
}

impl ProfileReport {
  /// Serialize the report as a single JSON line.
  ///
  /// # Errors
  ///
  /// Returns an error if serialization fails or the writer reports a
  /// failure.
  pub fn export_json<W: Write>(
    &self,
    mut writer: W,
  ) -> Result<(), ExportError> {
    serde_json::to_writer(&mut writer, self)?;
    writer.write_all(b"\n")?;
    Ok(())
  }

  /// Summarize the profiler's current measurements. Statistics follow the
  /// profiler's contracts: degenerate zeros when empty, nearest-rank
  /// percentiles, [`DEFAULT_HISTOGRAM_BUCKETS`] histogram buckets.
  #[must_use]
  pub fn from_profiler(profiler: &AllocationProfiler) -> Self {
    Self {
      count: profiler.count(),
      histogram: profiler.histogram(DEFAULT_HISTOGRAM_BUCKETS),
      mean_allocations: profiler.mean_allocations(),
      mean_bytes: profiler.mean_bytes(),
      median_bytes: profiler.median_bytes(),
      p90_bytes: profiler.percentile_bytes(90.0),
      p95_bytes: profiler.percentile_bytes(95.0),
      p99_bytes: profiler.percentile_bytes(99.0),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::engine::SnapshotEngine;
  use crate::snapshot::Snapshot;
  use crate::source::ScriptedSource;

  fn profiler_with_two_operations() -> AllocationProfiler {
    let profiler =
      AllocationProfiler::with_engine(SnapshotEngine::with_source(
        Arc::new(ScriptedSource::new(vec![
          Snapshot::new(0, 0, 0),
          Snapshot::new(2, 0, 100),
          Snapshot::new(2, 0, 100),
          Snapshot::new(6, 0, 400),
        ])),
      ));

    profiler.profile(|| ());
    profiler.profile(|| ());
    profiler
  }

  #[test]
  fn summarizes_the_profiler() {
    let report = ProfileReport::from_profiler(&profiler_with_two_operations());

    assert_eq!(report.count, 2);
    assert!((report.mean_bytes - 200.0).abs() < f64::EPSILON);
    assert!((report.mean_allocations - 3.0).abs() < f64::EPSILON);
    assert_eq!(report.median_bytes, 300);
    assert_eq!(report.p99_bytes, 300);
    assert_eq!(report.histogram.len(), DEFAULT_HISTOGRAM_BUCKETS);
  }

  #[test]
  fn exports_one_json_line() {
    let report = ProfileReport::from_profiler(&profiler_with_two_operations());

    let mut encoded = Vec::new();
    report.export_json(&mut encoded).expect("export failed");
    assert_eq!(encoded.last(), Some(&b'\n'));

    let parsed: serde_json::Value =
      serde_json::from_slice(&encoded).expect("invalid json");
    assert_eq!(parsed["count"], 2);
    assert_eq!(parsed["median_bytes"], 300);
    assert_eq!(
      parsed["histogram"]["buckets"].as_array().map(Vec::len),
      Some(DEFAULT_HISTOGRAM_BUCKETS)
    );
  }

  #[test]
  fn empty_profiler_exports_degenerate_report() {
    let profiler = AllocationProfiler::with_engine(
      SnapshotEngine::with_source(Arc::new(ScriptedSource::new(Vec::new()))),
    );

    let report = ProfileReport::from_profiler(&profiler);
    assert_eq!(report.count, 0);
    assert!(report.histogram.is_empty());
    assert_eq!(report.median_bytes, 0);
  }
}
