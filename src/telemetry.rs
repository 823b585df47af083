//! Telemetry metric name constants.
//!
//! Centralised metric names for the fetch cache. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `icalfilter_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `status`: upstream outcome, "ok" or "error"
//! - `stage`: where a caller gave up ("follower", "permit" or "result")

/// Cache lookups that found a fresh entry.
pub const CACHE_HITS_TOTAL: &str = "icalfilter_cache_hits_total";

/// Cache lookups that found nothing fresh.
pub const CACHE_MISSES_TOTAL: &str = "icalfilter_cache_misses_total";

/// Upstream calls performed by a leader.
///
/// Labels: `status` ("ok" | "error").
pub const UPSTREAM_REQUESTS_TOTAL: &str = "icalfilter_upstream_requests_total";

/// Upstream call duration in seconds.
pub const UPSTREAM_DURATION_SECONDS: &str = "icalfilter_upstream_duration_seconds";

/// Upstream calls currently holding an admission permit.
pub const UPSTREAM_IN_FLIGHT: &str = "icalfilter_upstream_in_flight";

/// Callers that joined an in-progress refresh instead of calling upstream.
pub const FOLLOWER_WAITS_TOTAL: &str = "icalfilter_follower_waits_total";

/// Callers whose context ended while waiting.
///
/// Labels: `stage` ("follower" | "permit" | "result").
pub const CANCELLATIONS_TOTAL: &str = "icalfilter_cancellations_total";
