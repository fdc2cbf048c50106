//! Port for per-invocation filter usage accounting.

use crate::core::filter::{ExecutionStatus, Filter};

/// Receives one notification per filter invocation, tagged with the outcome.
///
/// The default implementation ([`crate::metrics::BasicFilterUsageNotifier`])
/// increments a counter per filter; hosts can plug their own sink. Must be
/// thread-safe: notifications arrive from every request worker.
pub trait FilterUsageNotifier: Send + Sync {
    fn notify(&self, filter: &dyn Filter, status: ExecutionStatus);
}

/// Discards every notification. Useful for embedders and tests that do not
/// care about usage counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUsageNotifier;

impl FilterUsageNotifier for NoopUsageNotifier {
    fn notify(&self, _filter: &dyn Filter, _status: ExecutionStatus) {}
}
