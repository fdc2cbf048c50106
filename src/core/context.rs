//! Request-scoped state shared by every filter of one request.
//!
//! A [`RequestContext`] is created by the pipeline at request start, passed to
//! each filter as `&mut`, and released with [`RequestContext::unset`] when the
//! request finishes. It is never shared between concurrent requests: the
//! pipeline owns it for the request's lifetime, so no locking is involved.
//!
//! Well-known routing and response fields are materialized as typed members;
//! anything else filters want to exchange goes through the string-keyed
//! attachment map.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use http::StatusCode;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::core::{
    error::GatewayError,
    filter::ExecutionStatus,
    http::{HttpRequest, HttpResponse},
};

/// One row of the per-request execution summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExecution {
    pub name: String,
    pub status: ExecutionStatus,
    pub elapsed_ms: u64,
}

/// Mutable per-request state stitched through the filter chain.
#[derive(Debug)]
pub struct RequestContext {
    /// Correlation id for log lines about this request.
    pub id: Uuid,
    pub request: HttpRequest,
    pub response: HttpResponse,

    /// Absolute origin URL to route to, when known.
    pub route_host: Option<Url>,
    /// Logical backend name resolved by service discovery downstream.
    pub route_vip: Option<String>,
    /// Short routing key, typically the first path segment.
    pub route: Option<String>,
    /// Path override a PRE filter can install for ROUTE to observe.
    pub request_uri: Option<String>,

    /// When false, ROUTE filters must not contact an origin; the response is
    /// whatever the context already holds.
    pub send_gateway_response: bool,
    pub response_status: Option<StatusCode>,
    pub response_body: Option<Bytes>,
    /// Headers appended to the final response, in insertion order.
    pub response_headers: Vec<(String, String)>,

    error: Option<GatewayError>,
    error_handled: bool,

    pub debug_routing: bool,
    pub debug_request: bool,
    routing_debug: Vec<String>,

    filter_summary: Vec<FilterExecution>,
    /// Freeform properties POST filters enrich for downstream telemetry.
    pub event_properties: HashMap<String, Value>,

    attachments: HashMap<String, Value>,
    engine_ran: bool,
}

impl RequestContext {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            id: Uuid::now_v7(),
            request,
            response: HttpResponse::new(),
            route_host: None,
            route_vip: None,
            route: None,
            request_uri: None,
            send_gateway_response: true,
            response_status: None,
            response_body: None,
            response_headers: Vec::new(),
            error: None,
            error_handled: false,
            debug_routing: false,
            debug_request: false,
            routing_debug: Vec::new(),
            filter_summary: Vec::new(),
            event_properties: HashMap::new(),
            attachments: HashMap::new(),
            engine_ran: false,
        }
    }

    /// Mark that this request passed through the filter engine.
    pub fn set_engine_ran(&mut self) {
        self.engine_ran = true;
    }

    pub fn engine_ran(&self) -> bool {
        self.engine_ran
    }

    /// The path ROUTE filters should observe: the PRE-installed override when
    /// present, the request's own path otherwise.
    pub fn effective_uri(&self) -> &str {
        self.request_uri.as_deref().unwrap_or(self.request.path())
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.attachments.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attachments.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attachments.remove(key)
    }

    pub fn attachments(&self) -> &HashMap<String, Value> {
        &self.attachments
    }

    pub fn add_response_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.response_headers.push((name.into(), value.into()));
    }

    /// Record the failure the ERROR stage will observe. First error wins: a
    /// later failure (e.g. POST raising after ROUTE already failed) must not
    /// mask the original cause.
    pub fn set_error(&mut self, error: GatewayError) {
        if self.error.is_none() {
            self.error = Some(error);
        } else {
            tracing::debug!(
                context = %self.id,
                cause = %error.error_cause,
                "suppressing secondary request error"
            );
        }
    }

    pub fn error(&self) -> Option<&GatewayError> {
        self.error.as_ref()
    }

    /// Monotonic: once an ERROR filter claims the failure, later ERROR
    /// filters must not re-handle it.
    pub fn set_error_handled(&mut self) {
        self.error_handled = true;
    }

    pub fn error_handled(&self) -> bool {
        self.error_handled
    }

    pub fn add_routing_debug(&mut self, line: impl Into<String>) {
        self.routing_debug.push(line.into());
    }

    pub fn routing_debug(&self) -> &[String] {
        &self.routing_debug
    }

    pub fn add_filter_execution(
        &mut self,
        name: impl Into<String>,
        status: ExecutionStatus,
        elapsed_ms: u64,
    ) {
        self.filter_summary.push(FilterExecution {
            name: name.into(),
            status,
            elapsed_ms,
        });
    }

    pub fn filter_summary(&self) -> &[FilterExecution] {
        &self.filter_summary
    }

    /// Flat string rendering of the observable state, used by the debug trail
    /// to diff the context before and after a filter runs.
    pub fn debug_snapshot(&self) -> BTreeMap<String, String> {
        let mut snapshot = BTreeMap::new();
        if let Some(host) = &self.route_host {
            snapshot.insert("route_host".into(), host.to_string());
        }
        if let Some(vip) = &self.route_vip {
            snapshot.insert("route_vip".into(), vip.clone());
        }
        if let Some(route) = &self.route {
            snapshot.insert("route".into(), route.clone());
        }
        if let Some(uri) = &self.request_uri {
            snapshot.insert("request_uri".into(), uri.clone());
        }
        snapshot.insert(
            "send_gateway_response".into(),
            self.send_gateway_response.to_string(),
        );
        if let Some(status) = self.response_status {
            snapshot.insert("response_status".into(), status.as_u16().to_string());
        }
        if let Some(body) = &self.response_body {
            snapshot.insert("response_body".into(), format!("<{} bytes>", body.len()));
        }
        for (name, value) in &self.response_headers {
            snapshot.insert(format!("header:{name}"), value.clone());
        }
        for (key, value) in &self.attachments {
            snapshot.insert(format!("attachment:{key}"), value.to_string());
        }
        snapshot
    }

    /// Release the context: every field set during this request is cleared so
    /// nothing leaks into a later request handled by the same worker.
    pub fn unset(&mut self) {
        self.route_host = None;
        self.route_vip = None;
        self.route = None;
        self.request_uri = None;
        self.send_gateway_response = true;
        self.response_status = None;
        self.response_body = None;
        self.response_headers.clear();
        self.error = None;
        self.error_handled = false;
        self.debug_routing = false;
        self.debug_request = false;
        self.routing_debug.clear();
        self.filter_summary.clear();
        self.event_properties.clear();
        self.attachments.clear();
        self.engine_ran = false;
        self.response = HttpResponse::new();
    }
}
