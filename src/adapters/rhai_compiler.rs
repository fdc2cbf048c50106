//! Script-engine backend for the filter compiler port.
//!
//! Filter bodies are Rhai scripts. A script declares its identity as top-level
//! constants and its behavior as functions:
//!
//! ```rhai
//! const FILTER_KIND = "pre";      // required
//! const FILTER_ORDER = 10;        // optional, default 0
//! const FILTER_DISABLED = false;  // optional
//!
//! fn should_run(ctx) {            // optional, default: always run
//!     ctx.path == "/api"
//! }
//!
//! fn run(ctx) {                   // required
//!     #{ route_vip: "api" }
//! }
//! ```
//!
//! `run` receives a read-only map view of the request context and returns a
//! map of updates to apply. Recognized keys: `route`, `route_vip`,
//! `route_host`, `request_uri`, `send_gateway_response`,
//! `response_status_code`, `response_body`, plus the nested maps `headers`
//! (appended response headers), `event` (merged into the event properties)
//! and `state` (merged into the context attachments). Unrecognized top-level
//! keys also land in the attachments. A boolean return value feeds the
//! processor's did-work aggregate unchanged.
//!
//! Scripts fail a request by throwing: a thrown map
//! `#{ status: 502, error_cause: "...", message: "..." }` becomes exactly
//! that gateway error; any other thrown value or runtime error becomes a 500
//! with the `FILTER_SCRIPT_EXCEPTION` cause.

use std::{path::Path, sync::Arc};

use rhai::{Dynamic, Engine, EvalAltResult, Map, Scope, AST};
use serde_json::Value;

use crate::{
    core::{
        context::RequestContext,
        error::{ConfigError, GatewayError},
        filter::{Filter, FilterKind},
        processor::FilterProcessor,
    },
    ports::compiler::FilterCompiler,
};

const KIND_CONST: &str = "FILTER_KIND";
const ORDER_CONST: &str = "FILTER_ORDER";
const DISABLED_CONST: &str = "FILTER_DISABLED";

/// Compiles Rhai filter scripts into [`RhaiFilter`] instances.
#[derive(Debug, Default)]
pub struct RhaiFilterCompiler;

impl RhaiFilterCompiler {
    pub fn new() -> Self {
        Self
    }

    fn build_engine() -> Engine {
        let mut engine = Engine::new();
        // Untrusted filter code: bound runaway scripts instead of trusting
        // them to terminate.
        engine.set_max_operations(1_000_000);
        engine.set_max_call_levels(32);
        engine
    }
}

impl FilterCompiler for RhaiFilterCompiler {
    fn compile(&self, source: &[u8], path: &Path) -> Result<Arc<dyn Filter>, ConfigError> {
        let text = std::str::from_utf8(source).map_err(|e| ConfigError::Compile {
            path: path.to_path_buf(),
            detail: format!("source is not valid UTF-8: {e}"),
        })?;

        let engine = Self::build_engine();
        let ast = engine.compile(text).map_err(|e| ConfigError::Compile {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

        // Evaluate the top level once so the declaration constants land in a
        // scope we can inspect.
        let mut scope = Scope::new();
        engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
            .map_err(|e| ConfigError::Compile {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        let kind_value = scope
            .get_value::<Dynamic>(KIND_CONST)
            .ok_or(ConfigError::MissingDeclaration {
                path: path.to_path_buf(),
                name: KIND_CONST,
            })?;
        let kind_token =
            kind_value
                .into_string()
                .map_err(|actual| ConfigError::InvalidDeclaration {
                    path: path.to_path_buf(),
                    name: KIND_CONST,
                    detail: format!("expected a string, found {actual}"),
                })?;

        let order = match scope.get_value::<Dynamic>(ORDER_CONST) {
            Some(value) => {
                value
                    .as_int()
                    .map_err(|actual| ConfigError::InvalidDeclaration {
                        path: path.to_path_buf(),
                        name: ORDER_CONST,
                        detail: format!("expected an integer, found {actual}"),
                    })? as i32
            }
            None => 0,
        };

        let disabled = match scope.get_value::<Dynamic>(DISABLED_CONST) {
            Some(value) => {
                value
                    .as_bool()
                    .map_err(|actual| ConfigError::InvalidDeclaration {
                        path: path.to_path_buf(),
                        name: DISABLED_CONST,
                        detail: format!("expected a bool, found {actual}"),
                    })?
            }
            None => false,
        };

        let has_run = ast.iter_functions().any(|f| f.name == "run");
        if !has_run {
            return Err(ConfigError::MissingDeclaration {
                path: path.to_path_buf(),
                name: "run",
            });
        }
        let has_should_run = ast.iter_functions().any(|f| f.name == "should_run");

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| ConfigError::Compile {
                path: path.to_path_buf(),
                detail: "cannot derive a filter name from the path".into(),
            })?;

        Ok(Arc::new(RhaiFilter {
            name,
            kind: FilterKind::from(kind_token.as_str()),
            order,
            disabled,
            has_should_run,
            engine,
            ast,
        }))
    }
}

/// A filter whose guard and action are Rhai script functions.
pub struct RhaiFilter {
    name: String,
    kind: FilterKind,
    order: i32,
    disabled: bool,
    has_should_run: bool,
    engine: Engine,
    ast: AST,
}

impl Filter for RhaiFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> FilterKind {
        self.kind.clone()
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn disabled(&self) -> bool {
        self.disabled
    }

    fn should_run(&self, ctx: &RequestContext) -> bool {
        if !self.has_should_run {
            return true;
        }
        let view = context_view(ctx);
        let mut scope = Scope::new();
        match self
            .engine
            .call_fn::<Dynamic>(&mut scope, &self.ast, "should_run", (view,))
        {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(error) => {
                tracing::warn!(
                    filter = %self.name,
                    error = %error,
                    "should_run failed; skipping filter"
                );
                false
            }
        }
    }

    fn run(
        &self,
        ctx: &mut RequestContext,
        _chain: &FilterProcessor,
    ) -> Result<Option<Value>, GatewayError> {
        let view = context_view(ctx);
        let mut scope = Scope::new();
        let result = self
            .engine
            .call_fn::<Dynamic>(&mut scope, &self.ast, "run", (view,));

        match result {
            Ok(value) => {
                if let Some(updates) = value.clone().try_cast::<Map>() {
                    apply_updates(ctx, updates);
                    Ok(None)
                } else if value.is_unit() {
                    Ok(None)
                } else {
                    Ok(Some(dynamic_to_json(&value)))
                }
            }
            Err(error) => Err(script_error(&self.name, *error)),
        }
    }
}

/// Read-only map view of the context handed to script functions.
fn context_view(ctx: &RequestContext) -> Map {
    let mut view = Map::new();
    view.insert("method".into(), ctx.request.method.to_string().into());
    view.insert("path".into(), ctx.request.path().to_string().into());
    view.insert("uri".into(), ctx.effective_uri().to_string().into());

    let mut params = Map::new();
    if let Some(query) = ctx.request.uri.query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params.insert(key.as_ref().into(), value.into_owned().into());
        }
    }
    view.insert("params".into(), Dynamic::from(params));

    if let Some(route) = &ctx.route {
        view.insert("route".into(), route.clone().into());
    }
    if let Some(vip) = &ctx.route_vip {
        view.insert("route_vip".into(), vip.clone().into());
    }
    if let Some(host) = &ctx.route_host {
        view.insert("route_host".into(), host.to_string().into());
    }
    view.insert(
        "send_gateway_response".into(),
        ctx.send_gateway_response.into(),
    );
    if let Some(status) = ctx.response_status {
        view.insert(
            "response_status_code".into(),
            Dynamic::from(status.as_u16() as i64),
        );
    }
    if let Some(body) = &ctx.response_body {
        view.insert(
            "response_body".into(),
            String::from_utf8_lossy(body).into_owned().into(),
        );
    }
    if let Some(error) = ctx.error() {
        let mut error_map = Map::new();
        error_map.insert(
            "status".into(),
            Dynamic::from(error.status.as_u16() as i64),
        );
        error_map.insert("error_cause".into(), error.error_cause.clone().into());
        error_map.insert("message".into(), error.message.clone().into());
        view.insert("error".into(), Dynamic::from(error_map));
    }

    let mut state = Map::new();
    for (key, value) in ctx.attachments() {
        state.insert(key.as_str().into(), json_to_dynamic(value));
    }
    view.insert("state".into(), Dynamic::from(state));

    view
}

/// Apply a script's update map back onto the context.
fn apply_updates(ctx: &mut RequestContext, updates: Map) {
    for (key, value) in updates {
        match key.as_str() {
            "route" => {
                if let Ok(route) = value.into_string() {
                    ctx.route = Some(route);
                }
            }
            "route_vip" => {
                if let Ok(vip) = value.into_string() {
                    ctx.route_vip = Some(vip);
                }
            }
            "route_host" => match value.into_string().map(|raw| url::Url::parse(&raw)) {
                Ok(Ok(host)) => ctx.route_host = Some(host),
                Ok(Err(error)) => {
                    tracing::warn!(%error, "script produced an unparseable route_host; ignoring");
                }
                Err(_) => {
                    tracing::warn!("script produced a non-string route_host; ignoring");
                }
            },
            "request_uri" => {
                if let Ok(uri) = value.into_string() {
                    ctx.request_uri = Some(uri);
                }
            }
            "send_gateway_response" => {
                if let Ok(flag) = value.as_bool() {
                    ctx.send_gateway_response = flag;
                }
            }
            "response_status_code" => {
                if let Ok(code) = value.as_int() {
                    match http::StatusCode::from_u16(code as u16) {
                        Ok(status) => ctx.response_status = Some(status),
                        Err(_) => {
                            tracing::warn!(code, "script produced an invalid status code; ignoring");
                        }
                    }
                }
            }
            "response_body" => {
                if let Ok(body) = value.into_string() {
                    ctx.response_body = Some(body.into_bytes().into());
                }
            }
            "headers" => {
                if let Some(headers) = value.try_cast::<Map>() {
                    for (name, header_value) in headers {
                        if let Ok(header_value) = header_value.into_string() {
                            ctx.add_response_header(name.to_string(), header_value);
                        }
                    }
                }
            }
            "event" => {
                if let Some(event) = value.try_cast::<Map>() {
                    for (event_key, event_value) in event {
                        ctx.event_properties
                            .insert(event_key.to_string(), dynamic_to_json(&event_value));
                    }
                }
            }
            "state" => {
                if let Some(state) = value.try_cast::<Map>() {
                    for (state_key, state_value) in state {
                        ctx.set(state_key.to_string(), dynamic_to_json(&state_value));
                    }
                }
            }
            other => {
                ctx.set(other.to_string(), dynamic_to_json(&value));
            }
        }
    }
}

/// Convert a Rhai runtime failure into the gateway's error value. A thrown
/// map with `status`/`error_cause`/`message` passes through field-for-field.
fn script_error(filter_name: &str, error: EvalAltResult) -> GatewayError {
    if let EvalAltResult::ErrorRuntime(thrown, _) = &error {
        if let Some(map) = thrown.clone().try_cast::<Map>() {
            let status = map
                .get("status")
                .and_then(|v| v.as_int().ok())
                .unwrap_or(500) as u16;
            let cause = map
                .get("error_cause")
                .and_then(|v| v.clone().into_string().ok())
                .unwrap_or_default();
            let message = map
                .get("message")
                .and_then(|v| v.clone().into_string().ok())
                .unwrap_or_else(|| format!("filter {filter_name} raised an error"));
            return GatewayError::new(status, cause, message);
        }
    }
    GatewayError::new(
        500,
        "FILTER_SCRIPT_EXCEPTION",
        format!("filter {filter_name}: {error}"),
    )
}

fn json_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(flag) => (*flag).into(),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                Dynamic::from(int)
            } else {
                Dynamic::from(number.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(text) => text.clone().into(),
        Value::Array(items) => {
            let array: rhai::Array = items.iter().map(json_to_dynamic).collect();
            Dynamic::from(array)
        }
        Value::Object(fields) => {
            let mut map = Map::new();
            for (key, field) in fields {
                map.insert(key.as_str().into(), json_to_dynamic(field));
            }
            Dynamic::from(map)
        }
    }
}

fn dynamic_to_json(value: &Dynamic) -> Value {
    if value.is_unit() {
        return Value::Null;
    }
    if let Ok(flag) = value.as_bool() {
        return Value::Bool(flag);
    }
    if let Ok(int) = value.as_int() {
        return Value::from(int);
    }
    if let Ok(float) = value.as_float() {
        return serde_json::json!(float);
    }
    if let Some(text) = value.clone().try_cast::<rhai::ImmutableString>() {
        return Value::String(text.into_owned());
    }
    if let Some(array) = value.clone().try_cast::<rhai::Array>() {
        return Value::Array(array.iter().map(dynamic_to_json).collect());
    }
    if let Some(map) = value.clone().try_cast::<Map>() {
        let mut fields = serde_json::Map::new();
        for (key, field) in map {
            fields.insert(key.to_string(), dynamic_to_json(&field));
        }
        return Value::Object(fields);
    }
    Value::String(value.to_string())
}
