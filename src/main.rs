use std::io;

use heapwatch::{
  AllocationProfiler, LeakDetector, ProfileReport, TrackingAllocator,
};

#[global_allocator]
static ALLOCATOR: TrackingAllocator = TrackingAllocator;

fn main() {
  let detector = LeakDetector::new();
  let profiler = AllocationProfiler::new();

  for size in 1..=32_u64 {
    profiler.profile(|| {
      let values: Vec<u64> = (0..size * 64).collect();
      values.len()
    });
  }

  println!("=== allocation profile ===");
  println!("operations: {}", profiler.count());
  println!("mean bytes: {:.1}", profiler.mean_bytes());
  println!("median bytes: {}", profiler.median_bytes());
  println!("p95 bytes: {}", profiler.percentile_bytes(95.0));

  for bucket in profiler.histogram(8).buckets() {
    println!(
      "[{:>8}, {:>8}) {:>3} ops {:>5.1}%",
      bucket.lower, bucket.upper, bucket.count, bucket.frequency
    );
  }

  let report = ProfileReport::from_profiler(&profiler);
  if let Err(err) = report.export_json(io::stdout().lock()) {
    eprintln!("failed to export report: {err}");
  }

  match detector.assert_no_leaks() {
    Ok(()) => println!("no net drift since startup"),
    Err(err) => println!("{err}"),
  }
}
