//! The contract every filter obeys, and the guarded invocation wrapper.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::Value;

use crate::core::{context::RequestContext, error::GatewayError, processor::FilterProcessor};

/// Execution stage a filter belongs to. The pipeline drives the four
/// well-known stages; any other token names a sub-chain that filters can
/// invoke explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Pre,
    Route,
    Post,
    Error,
    Static,
    Healthcheck,
    Custom(String),
}

impl FilterKind {
    pub fn as_str(&self) -> &str {
        match self {
            FilterKind::Pre => "pre",
            FilterKind::Route => "route",
            FilterKind::Post => "post",
            FilterKind::Error => "error",
            FilterKind::Static => "static",
            FilterKind::Healthcheck => "healthcheck",
            FilterKind::Custom(kind) => kind,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for FilterKind {
    fn from(token: &str) -> Self {
        match token {
            "pre" => FilterKind::Pre,
            "route" => FilterKind::Route,
            "post" => FilterKind::Post,
            "error" => FilterKind::Error,
            "static" => FilterKind::Static,
            "healthcheck" => FilterKind::Healthcheck,
            other => FilterKind::Custom(other.to_string()),
        }
    }
}

/// Outcome classification for a single filter invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failed,
    Skipped,
    Disabled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Skipped => "SKIPPED",
            ExecutionStatus::Disabled => "DISABLED",
        }
    }
}

/// A pluggable unit of request processing.
///
/// Implementations must be stateless with respect to per-request data: all
/// cross-filter communication goes through the [`RequestContext`]. Instances
/// are immutable once compiled; replacement happens by swapping the registry
/// entry, never by mutating a live filter.
pub trait Filter: Send + Sync {
    /// Stable name; breaks ordering ties and tags metrics and summaries.
    fn name(&self) -> &str;

    fn kind(&self) -> FilterKind;

    /// Position within the kind; smaller runs first.
    fn order(&self) -> i32;

    /// Disabled filters are recorded but never consulted.
    fn disabled(&self) -> bool {
        false
    }

    /// Guard deciding whether `run` applies to this request.
    fn should_run(&self, ctx: &RequestContext) -> bool;

    /// The filter action. `chain` allows a filter to run a named sub-kind
    /// (e.g. a route filter dispatching the `static` chain).
    fn run(
        &self,
        ctx: &mut RequestContext,
        chain: &FilterProcessor,
    ) -> Result<Option<Value>, GatewayError>;
}

/// Result of one guarded filter invocation.
#[derive(Debug)]
pub struct FilterOutcome {
    pub status: ExecutionStatus,
    pub value: Option<Value>,
    pub error: Option<GatewayError>,
}

impl FilterOutcome {
    fn status_only(status: ExecutionStatus) -> Self {
        Self {
            status,
            value: None,
            error: None,
        }
    }
}

/// Run one filter inside the guarded region.
///
/// Returns DISABLED/SKIPPED without touching `run`. A panic inside the filter
/// is caught and converted into a 500 `GatewayError` whose cause names the
/// stage and filter, so one misbehaving filter cannot take down the worker.
pub fn run_filter(
    filter: &dyn Filter,
    ctx: &mut RequestContext,
    chain: &FilterProcessor,
) -> FilterOutcome {
    if filter.disabled() {
        return FilterOutcome::status_only(ExecutionStatus::Disabled);
    }
    if !filter.should_run(ctx) {
        return FilterOutcome::status_only(ExecutionStatus::Skipped);
    }

    match catch_unwind(AssertUnwindSafe(|| filter.run(ctx, chain))) {
        Ok(Ok(value)) => FilterOutcome {
            status: ExecutionStatus::Success,
            value,
            error: None,
        },
        Ok(Err(error)) => FilterOutcome {
            status: ExecutionStatus::Failed,
            value: None,
            error: Some(error),
        },
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            let cause = format!(
                "UNCAUGHT_EXCEPTION_IN_{}_FILTER_{}",
                filter.kind().as_str().to_uppercase(),
                filter.name()
            );
            FilterOutcome {
                status: ExecutionStatus::Failed,
                value: None,
                error: Some(GatewayError::new(500, cause, detail)),
            }
        }
    }
}
