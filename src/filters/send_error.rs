//! Built-in ERROR filter producing the client-visible error response.
//!
//! The response shape is part of the gateway's public contract and is kept
//! wire-compatible with Zuul 1.x:
//!
//! * header `X-Netflix-Error-Cause: Zuul Error: <cause>` (or
//!   `X-Zuul-Error-Cause: Zuul Error UNKNOWN Cause` when no cause token is
//!   available),
//! * a body selected by the `v` and `output` request parameters: `v=1`
//!   includes the status code, `v=1.5`/`v=2.0` omit it; `output=json` renders
//!   JSON, anything else XML,
//! * `callback=<fn>` wraps the JSON body as `<fn>(<json>);`,
//! * `override_error_status=true` (implied by `callback`) forces HTTP 200 and
//!   downgrades the effective version to 1 so the real status stays readable
//!   in the body.

use serde_json::Value;

use crate::core::{
    context::RequestContext,
    error::GatewayError,
    filter::{Filter, FilterKind},
    processor::FilterProcessor,
};

pub const NETFLIX_ERROR_CAUSE_HEADER: &str = "X-Netflix-Error-Cause";
pub const GATEWAY_ERROR_CAUSE_HEADER: &str = "X-Zuul-Error-Cause";
pub const UNKNOWN_CAUSE_VALUE: &str = "Zuul Error UNKNOWN Cause";

/// Body schema version negotiated through the `v` request parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyVersion {
    /// `v=1` (default): body carries both status code and message.
    V1,
    /// `v=1.5` / `v=2.0`: message only.
    V2,
}

fn parse_version(v: Option<&str>) -> BodyVersion {
    match v {
        Some("1.5") | Some("2.0") => BodyVersion::V2,
        _ => BodyVersion::V1,
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn xml_body(version: BodyVersion, status_code: u16, message: &str) -> String {
    let message = escape_xml(message);
    match version {
        BodyVersion::V1 => format!(
            "<status><status_code>{status_code}</status_code><message>{message}</message></status>"
        ),
        BodyVersion::V2 => format!("<status><message>{message}</message></status>"),
    }
}

fn json_body(version: BodyVersion, status_code: u16, message: &str) -> String {
    // Serialize the message through serde_json so quoting/escaping is correct.
    let message = Value::String(message.to_string()).to_string();
    match version {
        BodyVersion::V1 => {
            format!(r#"{{"status": {{"message": {message}, "status_code": {status_code}}}}}"#)
        }
        BodyVersion::V2 => format!(r#"{{"status": {{"message": {message}}}}}"#),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SendErrorFilter;

impl SendErrorFilter {
    pub fn new() -> Self {
        Self
    }
}

impl Filter for SendErrorFilter {
    fn name(&self) -> &str {
        "SendErrorFilter"
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Error
    }

    fn order(&self) -> i32 {
        0
    }

    fn should_run(&self, ctx: &RequestContext) -> bool {
        ctx.error().is_some() && !ctx.error_handled()
    }

    fn run(
        &self,
        ctx: &mut RequestContext,
        _chain: &FilterProcessor,
    ) -> Result<Option<Value>, GatewayError> {
        ctx.set_error_handled();

        let (status_code, cause, message) = match ctx.error() {
            Some(error) => (
                error.status.as_u16(),
                error.error_cause.clone(),
                error.message.clone(),
            ),
            // Guarded by should_run; kept total for direct invocations.
            None => (500, String::new(), "unknown failure".to_string()),
        };

        let callback = ctx.request.param("callback");
        let override_status = callback.is_some()
            || ctx
                .request
                .param("override_error_status")
                .as_deref()
                == Some("true");
        let version = if override_status {
            BodyVersion::V1
        } else {
            parse_version(ctx.request.param("v").as_deref())
        };
        let response_status = if override_status { 200 } else { status_code };

        let json_output = ctx.request.param("output").as_deref() == Some("json");
        let (body, content_type) = if json_output {
            let body = json_body(version, status_code, &message);
            match &callback {
                Some(function) => (format!("{function}({body});"), "application/javascript"),
                None => (body, "application/json"),
            }
        } else {
            (xml_body(version, status_code, &message), "application/xml")
        };

        if cause.is_empty() {
            ctx.add_response_header(GATEWAY_ERROR_CAUSE_HEADER, UNKNOWN_CAUSE_VALUE);
        } else {
            ctx.add_response_header(NETFLIX_ERROR_CAUSE_HEADER, format!("Zuul Error: {cause}"));
        }
        ctx.add_response_header("Content-Type", content_type);
        ctx.response_status = Some(
            http::StatusCode::from_u16(response_status)
                .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR),
        );
        ctx.response_body = Some(body.into());

        Ok(None)
    }
}
