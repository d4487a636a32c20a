//! Metrics recording for catalog operations.

use std::time::Instant;

/// Records operation metrics for a catalog operation.
///
/// Two metrics are recorded per call:
/// 1. `catalog_operations_total` - Counter for operation count by status
/// 2. `catalog_operation_duration_ms` - Histogram for operation latency
///
/// # Arguments
///
/// * `operation` - Operation name (e.g., "insert", "find", "list_all")
/// * `start` - Operation start time from `Instant::now()`
/// * `status` - Operation status ("success" or "error")
pub fn record_operation_metrics(operation: &'static str, start: Instant, status: &'static str) {
    metrics::counter!(
        "catalog_operations_total",
        "backend" => "sqlite",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "catalog_operation_duration_ms",
        "backend" => "sqlite",
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Maps an operation outcome to its status label.
#[must_use]
pub const fn status_label(success: bool) -> &'static str {
    if success { "success" } else { "error" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_record_operation_metrics() {
        let start = Instant::now();
        record_operation_metrics("insert", start, "success");
        record_operation_metrics("remove", start, "error");
    }

    #[test]
    fn test_record_operation_metrics_concurrent() {
        let handles: Vec<_> = (0..4u64)
            .map(|i| {
                thread::spawn(move || {
                    let start = Instant::now();
                    thread::sleep(Duration::from_millis(i * 2));
                    record_operation_metrics("find", start, status_label(i % 2 == 0));
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("Thread panicked");
        }
    }

    #[test]
    fn test_status_label() {
        assert_eq!(status_label(true), "success");
        assert_eq!(status_label(false), "error");
    }
}
