//! Built-in healthcheck responder.
//!
//! Registered under the `healthcheck` kind so it never runs as part of the
//! main pipeline stages; a routing filter that recognizes the healthcheck
//! path dispatches the kind explicitly through its chain handle.

use serde_json::Value;

use crate::core::{
    context::RequestContext,
    error::GatewayError,
    filter::{Filter, FilterKind},
    processor::FilterProcessor,
};

pub const HEALTHCHECK_BODY: &str = "<health>ok</health>";

#[derive(Debug, Default, Clone, Copy)]
pub struct HealthcheckFilter;

impl HealthcheckFilter {
    pub fn new() -> Self {
        Self
    }
}

impl Filter for HealthcheckFilter {
    fn name(&self) -> &str {
        "HealthcheckFilter"
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Healthcheck
    }

    fn order(&self) -> i32 {
        0
    }

    fn should_run(&self, _ctx: &RequestContext) -> bool {
        true
    }

    fn run(
        &self,
        ctx: &mut RequestContext,
        _chain: &FilterProcessor,
    ) -> Result<Option<Value>, GatewayError> {
        // No origin involved; answer locally.
        ctx.send_gateway_response = false;
        ctx.response_status = Some(http::StatusCode::OK);
        ctx.response_body = Some(HEALTHCHECK_BODY.into());
        ctx.add_response_header("Content-Type", "application/xml");
        Ok(Some(Value::Bool(true)))
    }
}
