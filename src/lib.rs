//! Pylon - an edge-gateway filter engine with hot-reloadable filters.
//!
//! Pylon routes each incoming request through an ordered, extensible chain of
//! scriptable processing stages ("filters") and hands surviving requests to
//! the host's origin client. Gateway behavior lives in small Rhai scripts
//! dropped into watched directories: the running process picks up additions,
//! edits and removals within one polling interval, without a restart.
//!
//! # Features
//! - Fixed PRE → ROUTE → POST pipeline with an ERROR side branch
//! - Strict `(order, name)` execution ordering within every stage
//! - Hot reload: content-hash change detection, atomic per-stage publication,
//!   compile failures keep the previous filter serving
//! - Request-scoped context with typed routing/response fields plus an
//!   attachment map for filter-to-filter state
//! - Per-filter execution summaries, usage counters and an opt-in
//!   routing-debug trail
//! - Error responses wire-compatible with Zuul 1.x (`X-Netflix-Error-Cause`
//!   headers, versioned XML/JSON bodies, JSONP callbacks)
//! - Structured tracing via `tracing`; metrics via the `metrics` facade
//!
//! # Quick Example
//! ```no_run
//! use http::Method;
//! use pylon::{config::models::GatewayConfig, core::http::HttpRequest, Gateway};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let config: GatewayConfig = pylon::config::load_config("gateway.yaml")?;
//! let gateway = Gateway::from_config(&config);
//! let poller = gateway.start().await?;
//!
//! // The HTTP front-end hands parsed requests to the pipeline.
//! let response = gateway.handle(HttpRequest::new(Method::GET, "/api/users"));
//! assert!(response.status.is_success());
//!
//! gateway.shutdown();
//! poller.await?;
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits the host can implement: the filter
//! compiler, the usage-counter sink) from **adapters** (the bundled Rhai
//! compiler and the directory poller) while the pipeline, loader, registry
//! and context logic live in `core` and stay free of I/O. The HTTP
//! front-end, the upstream client and service discovery are the host's
//! concern: the engine consumes an abstract request and produces an abstract
//! response.
//!
//! # Error Handling
//! Filters fail a request with [`core::GatewayError`]; the pipeline routes it
//! through the ERROR stage and the built-in error filter renders the
//! client-visible body. Script compilation problems are [`core::ConfigError`]
//! values that never surface to a request. Setup-path APIs return
//! `eyre::Result` with context attached.
//!
//! # Concurrency
//! A request's pipeline is sequential; many requests run in parallel on the
//! host's workers. The single background poller publishes filter-set changes
//! through atomically swapped per-stage snapshots, so a stage iterates one
//! consistent sequence regardless of concurrent reloads.

pub mod config;
pub mod metrics;
pub mod ports;
pub mod tracing_setup;

pub mod adapters;
pub mod core;
pub mod filters;
mod gateway;

pub use crate::{
    adapters::{FileManagerConfig, FilterFileManager, RhaiFilterCompiler},
    core::{
        ExecutionStatus, Filter, FilterKind, FilterLoader, FilterProcessor, FilterRegistry,
        GatewayError, HttpRequest, HttpResponse, PipelineRunner, RequestContext,
    },
    filters::{HealthcheckFilter, SendErrorFilter},
    gateway::Gateway,
    ports::{FilterCompiler, FilterUsageNotifier},
};
