//! The execution core: runs every filter of a kind against one context.
//!
//! The processor is deliberately thin. It snapshots the kind's sequence once,
//! walks it in `(order, name)` order, times each invocation, records the
//! execution summary, feeds the usage sink, and re-raises the first failure.
//! Filters receive the processor back as their `chain` handle so they can run
//! named sub-kinds.

use std::{sync::Arc, time::Instant};

use serde_json::Value;

use crate::{
    core::{
        context::RequestContext,
        debug,
        error::GatewayError,
        filter::{run_filter, ExecutionStatus, Filter, FilterKind},
        loader::FilterLoader,
    },
    ports::usage::FilterUsageNotifier,
};

pub struct FilterProcessor {
    loader: Arc<FilterLoader>,
    notifier: Arc<dyn FilterUsageNotifier>,
}

impl FilterProcessor {
    pub fn new(loader: Arc<FilterLoader>, notifier: Arc<dyn FilterUsageNotifier>) -> Self {
        Self { loader, notifier }
    }

    pub fn loader(&self) -> &Arc<FilterLoader> {
        &self.loader
    }

    /// Run all filters of `kind` in `(order, name)` order on a snapshot of the
    /// current sequence.
    ///
    /// The returned bool OR-folds the boolean results of successful filters
    /// ("did at least one filter report doing real work"). It is internal
    /// bookkeeping; callers are free to ignore it.
    pub fn run_filters_of_kind(
        &self,
        ctx: &mut RequestContext,
        kind: &FilterKind,
    ) -> Result<bool, GatewayError> {
        debug::add_routing_debug(ctx, format!("Invoking {{{kind}}} kind filters"));
        let sequence = self.loader.filters_by_kind(kind);
        let mut aggregate = false;
        for filter in sequence.iter() {
            if let Some(Value::Bool(did_work)) = self.process_filter(ctx, filter.as_ref())? {
                aggregate |= did_work;
            }
        }
        Ok(aggregate)
    }

    /// Convenience wrapper for the pipeline stages. Panics inside filters were
    /// already normalized into `GatewayError` by the run wrapper, so every
    /// error propagates unchanged.
    pub fn run_stage(&self, ctx: &mut RequestContext, kind: &FilterKind) -> Result<(), GatewayError> {
        self.run_filters_of_kind(ctx, kind).map(|_| ())
    }

    /// Run the ERROR stage. Failures raised by ERROR filters are logged and
    /// swallowed so error handling can never recurse.
    pub fn run_error_stage(&self, ctx: &mut RequestContext) {
        if let Err(error) = self.run_filters_of_kind(ctx, &FilterKind::Error) {
            tracing::error!(
                context = %ctx.id,
                cause = %error.error_cause,
                error = %error,
                "error filter raised; suppressing"
            );
        }
    }

    fn process_filter(
        &self,
        ctx: &mut RequestContext,
        filter: &dyn Filter,
    ) -> Result<Option<Value>, GatewayError> {
        let debug_enabled = ctx.debug_routing;
        let before = debug_enabled.then(|| ctx.debug_snapshot());
        if debug_enabled {
            ctx.add_routing_debug(format!(
                "Filter {} {} {}",
                filter.kind(),
                filter.order(),
                filter.name()
            ));
        }

        let started = Instant::now();
        let outcome = run_filter(filter, ctx, self);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        ctx.add_filter_execution(filter.name(), outcome.status, elapsed_ms);
        self.notifier.notify(filter, outcome.status);

        match outcome.status {
            ExecutionStatus::Success => {
                if debug_enabled {
                    ctx.add_routing_debug(format!(
                        "Filter {{{} kind:{} order:{}}} execution time: {elapsed_ms}ms",
                        filter.name(),
                        filter.kind(),
                        filter.order()
                    ));
                    if let Some(before) = &before {
                        debug::compare_context_state(ctx, filter.name(), before);
                    }
                }
                Ok(outcome.value)
            }
            ExecutionStatus::Failed => {
                let error = match outcome.error {
                    Some(error) => error,
                    None => GatewayError::new(
                        500,
                        "FILTER_FAILED",
                        format!("filter {} failed without error detail", filter.name()),
                    ),
                };
                if debug_enabled {
                    ctx.add_routing_debug(format!(
                        "Running filter failed {} kind:{} order:{} {}",
                        filter.name(),
                        filter.kind(),
                        filter.order(),
                        error
                    ));
                }
                Err(error)
            }
            ExecutionStatus::Skipped | ExecutionStatus::Disabled => Ok(None),
        }
    }
}

#[cfg(test)]
impl FilterProcessor {
    /// Processor over an empty loader, for tests that only need a chain handle.
    pub(crate) fn for_tests() -> Self {
        use std::path::Path;

        use crate::core::{error::ConfigError, registry::FilterRegistry};
        use crate::ports::{compiler::FilterCompiler, usage::NoopUsageNotifier};

        struct NeverCompiler;
        impl FilterCompiler for NeverCompiler {
            fn compile(
                &self,
                _source: &[u8],
                path: &Path,
            ) -> Result<Arc<dyn Filter>, ConfigError> {
                Err(ConfigError::Compile {
                    path: path.to_path_buf(),
                    detail: "no compiler in this test".into(),
                })
            }
        }

        Self::new(
            Arc::new(FilterLoader::new(
                Arc::new(FilterRegistry::new()),
                Arc::new(NeverCompiler),
            )),
            Arc::new(NoopUsageNotifier),
        )
    }
}
