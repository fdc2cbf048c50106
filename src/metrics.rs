//! Lightweight metrics helpers for Pylon.
//!
//! Thin wrappers over the `metrics` crate macros. No exporter is embedded;
//! the host installs any compatible recorder. The per-filter usage counter
//! keeps the legacy `zuul.filter-<FilterName>` name with `status` and
//! `filtertype` tags, which downstream dashboards already understand;
//! engine-level metrics use the `pylon_` prefix.
//!
//! Provided metrics:
//! * `zuul.filter-<name>` (counter, tags: status, filtertype)
//! * `pylon_pipeline_requests_total` (counter, tag: outcome)
//! * `pylon_filter_reloads_total` (counter, tag: result)
//! * `pylon_filter_scan_duration_seconds` (histogram)

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use once_cell::sync::Lazy;

use crate::core::filter::{ExecutionStatus, Filter};
use crate::ports::usage::FilterUsageNotifier;

/// Legacy per-filter usage counter prefix; the filter name completes it.
pub const FILTER_USAGE_PREFIX: &str = "zuul.filter-";
pub const PYLON_PIPELINE_REQUESTS_TOTAL: &str = "pylon_pipeline_requests_total";
pub const PYLON_FILTER_RELOADS_TOTAL: &str = "pylon_filter_reloads_total";
pub const PYLON_FILTER_SCAN_DURATION_SECONDS: &str = "pylon_filter_scan_duration_seconds";

static DESCRIPTIONS: Lazy<()> = Lazy::new(|| {
    describe_counter!(
        PYLON_PIPELINE_REQUESTS_TOTAL,
        Unit::Count,
        "Total requests driven through the filter pipeline."
    );
    describe_counter!(
        PYLON_FILTER_RELOADS_TOTAL,
        Unit::Count,
        "Filter load, reload, removal and compile-failure events."
    );
    describe_histogram!(
        PYLON_FILTER_SCAN_DURATION_SECONDS,
        Unit::Seconds,
        "Duration of one filter-directory scan pass."
    );
});

/// Register metric descriptions (idempotent).
pub fn init_metrics() {
    Lazy::force(&DESCRIPTIONS);
    tracing::debug!("pylon metrics descriptions registered");
}

/// Count one completed pipeline run; `outcome` is `success` or `error`.
pub fn record_pipeline_request(outcome: &str) {
    counter!(PYLON_PIPELINE_REQUESTS_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

/// Count one loader event; `result` is `loaded`, `removed` or `compile_failed`.
pub fn record_filter_reload(result: &str) {
    counter!(PYLON_FILTER_RELOADS_TOTAL, "result" => result.to_string()).increment(1);
}

/// Count one filter invocation under the legacy usage-counter name.
pub fn record_filter_usage(name: &str, kind: &str, status: ExecutionStatus) {
    counter!(
        format!("{FILTER_USAGE_PREFIX}{name}"),
        "status" => status.as_str(),
        "filtertype" => kind.to_string()
    )
    .increment(1);
}

/// RAII helper measuring one directory-scan pass.
pub struct ScanTimer {
    start: Instant,
}

impl ScanTimer {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Drop for ScanTimer {
    fn drop(&mut self) {
        histogram!(PYLON_FILTER_SCAN_DURATION_SECONDS).record(self.start.elapsed().as_secs_f64());
    }
}

/// Publishes one counter per filter invocation, tagged with outcome and kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicFilterUsageNotifier;

impl FilterUsageNotifier for BasicFilterUsageNotifier {
    fn notify(&self, filter: &dyn Filter, status: ExecutionStatus) {
        record_filter_usage(filter.name(), filter.kind().as_str(), status);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::filter::{test_support::TestFilter, FilterKind};

    #[test]
    fn test_init_metrics_is_idempotent() {
        init_metrics();
        init_metrics();
    }

    #[test]
    fn test_basic_notifier_accepts_every_status() {
        let filter = TestFilter::new("probe", FilterKind::Pre, 0, |_, _| Ok(Some(json!(true))));
        let notifier = BasicFilterUsageNotifier;
        for status in [
            ExecutionStatus::Success,
            ExecutionStatus::Failed,
            ExecutionStatus::Skipped,
            ExecutionStatus::Disabled,
        ] {
            notifier.notify(&filter, status);
        }
    }

    #[test]
    fn test_scan_timer_records_on_drop() {
        let timer = ScanTimer::new();
        drop(timer);
    }
}
