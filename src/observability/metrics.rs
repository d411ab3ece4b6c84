//! # Metrics
//!
//! The caching layer records through the `metrics` facade; this module installs the Prometheus
//! recorder that backs `GET /metrics`. Without a recorder the macros are no-ops, which is how the
//! test suites run.
//!
//! | Metric | Kind | Labels |
//! |--------|------|--------|
//! | `cache_requests_total` | counter | `result` = hit, miss, bypass, error |
//! | `cache_writes_total` | counter | `outcome` = stored, failed |
//! | `cache_invalidated_keys_total` | counter | - |
//! | `cache_store_errors_total` | counter | `operation` |
//! | `cache_ready` | gauge | - |

use crate::core::error::{ApiError, ApiResult};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and describe the cache metrics
pub fn install_prometheus() -> ApiResult<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ApiError::internal(format!("Failed to install metrics recorder: {}", e)))?;

    describe_counter!(
        "cache_requests_total",
        "Cache lookups on cached routes by result"
    );
    describe_counter!("cache_writes_total", "Background cache writes by outcome");
    describe_counter!(
        "cache_invalidated_keys_total",
        "Keys removed by invalidation"
    );
    describe_counter!(
        "cache_store_errors_total",
        "Failed cache store operations"
    );
    describe_gauge!("cache_ready", "1 when the cache store is usable, 0 when degraded");

    Ok(handle)
}
