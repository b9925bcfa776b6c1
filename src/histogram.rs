use serde::Serialize;

/// One half-open histogram bucket `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bucket {
  /// Number of input values falling in `[lower, upper)`.
  pub count: usize,
  /// `100 * count / total` for the input the histogram was built from.
  pub frequency: f64,
  /// Inclusive lower bound.
  pub lower: i64,
  /// Exclusive upper bound.
  pub upper: i64,
}

/// Fixed-width bucketing of a sequence of integers.
///
/// Pure and stateless beyond its inputs: building a histogram never fails,
/// an empty input or a zero bucket count yields zero buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Histogram {
  buckets: Vec<Bucket>,
}

impl Histogram {
  #[must_use]
  pub fn buckets(&self) -> &[Bucket] {
    &self.buckets
  }

  /// Bucket `values` into `bucket_count` fixed-width buckets.
  ///
  /// The bucket width is `max(1, range / bucket_count)` using integer
  /// division, so the nominal buckets may not cover the true range; the
  /// last bucket's exclusive upper bound is therefore widened to
  /// `max + 1` (and always past its own lower bound) so that every input
  /// value lands in exactly one bucket. When `max + 1` would overflow,
  /// the last bucket's bound saturates and the bucket admits the maximum
  /// value itself instead. Buckets come out ascending by lower bound,
  /// counts sum to `values.len()`, and frequencies sum to 100 within
  /// floating-point tolerance for non-empty input.
  #[must_use]
  pub fn from_values(values: &[i64], bucket_count: usize) -> Self {
    if values.is_empty() || bucket_count == 0 {
      return Self::default();
    }

    let mut min_value = values[0];
    let mut max_value = values[0];
    for &value in values {
      min_value = min_value.min(value);
      max_value = max_value.max(value);
    }

    let range = max_value.saturating_sub(min_value);
    let bucket_size = (range / bucket_count as i64).max(1);
    let total = values.len();

    let mut buckets = Vec::with_capacity(bucket_count);
    for i in 0..bucket_count {
      let last = i == bucket_count - 1;
      let lower = min_value.saturating_add(i as i64 * bucket_size);
      let upper = if last {
        max_value.saturating_add(1).max(lower.saturating_add(1))
      } else {
        min_value.saturating_add((i as i64 + 1) * bucket_size)
      };

      // The last bucket admits the maximum directly: when `max + 1`
      // saturates, `v < upper` alone would exclude `i64::MAX`. Earlier
      // buckets can never hold the maximum, so nothing double-counts.
      let count = values
        .iter()
        .filter(|&&v| lower <= v && (v < upper || (last && v == max_value)))
        .count();

      #[allow(clippy::cast_precision_loss)]
      let frequency = 100.0 * count as f64 / total as f64;

      buckets.push(Bucket {
        count,
        frequency,
        lower,
        upper,
      });
    }

    Self { buckets }
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.buckets.is_empty()
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.buckets.len()
  }
}
