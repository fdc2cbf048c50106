//! The request pipeline state machine.
//!
//! One request flows INIT → PRE → ROUTE → POST → DONE. A `GatewayError`
//! raised by PRE or ROUTE aborts that stage and detours through ERROR before
//! POST still runs; one raised by POST detours through ERROR and ends the
//! request. POST is never re-run after failing, and the ERROR stage is entered
//! at most once per request, which bounds the worst case to one pass through
//! each stage plus one ERROR pass.
//!
//! The runner owns the [`RequestContext`] for the request's lifetime and is
//! guaranteed to release it on every exit path.

use std::sync::Arc;

use crate::{
    core::{
        context::RequestContext,
        error::GatewayError,
        filter::FilterKind,
        http::{HttpRequest, HttpResponse},
        processor::FilterProcessor,
    },
    metrics,
};

pub struct PipelineRunner {
    processor: Arc<FilterProcessor>,
}

impl PipelineRunner {
    pub fn new(processor: Arc<FilterProcessor>) -> Self {
        Self { processor }
    }

    pub fn processor(&self) -> &Arc<FilterProcessor> {
        &self.processor
    }

    /// Drive one request through the pipeline and produce its response.
    pub fn handle(&self, request: HttpRequest) -> HttpResponse {
        let mut ctx = RequestContext::new(request);
        self.execute(&mut ctx);
        let response = std::mem::take(&mut ctx.response);
        ctx.unset();
        response
    }

    /// Run the stages against a caller-owned context and materialize the
    /// response fields onto `ctx.response`. Does not release the context;
    /// hosts embedding the runner (and tests inspecting the summary) call
    /// [`RequestContext::unset`] themselves.
    pub fn execute(&self, ctx: &mut RequestContext) {
        ctx.set_engine_ran();
        tracing::debug!(
            context = %ctx.id,
            method = %ctx.request.method,
            path = ctx.request.path(),
            "pipeline start"
        );

        let mut error_stage_ran = false;

        let pre_ok = self
            .run_guarded(ctx, &FilterKind::Pre, &mut error_stage_ran)
            .is_ok();
        if pre_ok {
            let _ = self.run_guarded(ctx, &FilterKind::Route, &mut error_stage_ran);
        }
        // POST runs exactly once, also after a PRE/ROUTE failure.
        let _ = self.run_guarded(ctx, &FilterKind::Post, &mut error_stage_ran);

        self.materialize(ctx);
        let outcome = if ctx.error().is_some() { "error" } else { "success" };
        metrics::record_pipeline_request(outcome);
        tracing::debug!(
            context = %ctx.id,
            status = ctx.response.status.as_u16(),
            outcome,
            "pipeline done"
        );
    }

    fn run_guarded(
        &self,
        ctx: &mut RequestContext,
        stage: &FilterKind,
        error_stage_ran: &mut bool,
    ) -> Result<(), ()> {
        match self.processor.run_stage(ctx, stage) {
            Ok(()) => Ok(()),
            Err(error) => {
                self.raise(ctx, stage, error, error_stage_ran);
                Err(())
            }
        }
    }

    fn raise(
        &self,
        ctx: &mut RequestContext,
        stage: &FilterKind,
        error: GatewayError,
        error_stage_ran: &mut bool,
    ) {
        tracing::warn!(
            context = %ctx.id,
            stage = %stage,
            status = error.status.as_u16(),
            cause = %error.error_cause,
            "stage failed"
        );
        ctx.set_error(error);
        if *error_stage_ran {
            // ERROR already handled this request; a later failure is recorded
            // but gets no second ERROR pass.
            return;
        }
        *error_stage_ran = true;
        self.processor.run_error_stage(ctx);
    }

    /// Copy the context's response fields onto the response handle.
    fn materialize(&self, ctx: &mut RequestContext) {
        if let Some(status) = ctx.response_status {
            ctx.response.status = status;
        }
        let headers: Vec<(String, String)> = ctx.response_headers.clone();
        for (name, value) in headers {
            ctx.response.append_header(&name, &value);
        }
        if let Some(body) = ctx.response_body.clone() {
            ctx.response.body = body;
        }
    }
}
