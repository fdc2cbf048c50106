//! Ready-made assembly of the filter engine.
//!
//! [`Gateway`] wires the default parts together from a [`GatewayConfig`]:
//! Rhai compiler, loader and registry, processor with the counter-based usage
//! notifier, the built-in error and healthcheck filters, the pipeline runner,
//! and the directory poller. Hosts with custom compilers or usage sinks can
//! skip this and assemble the same parts by hand; an instance is cheap to
//! share behind an `Arc`.

use std::sync::Arc;

use eyre::Result;
use tokio::task::JoinHandle;

use crate::{
    adapters::{FileManagerConfig, FilterFileManager, RhaiFilterCompiler},
    config::models::{DebugConfig, GatewayConfig},
    core::{
        context::RequestContext,
        http::{HttpRequest, HttpResponse},
        loader::FilterLoader,
        pipeline::PipelineRunner,
        processor::FilterProcessor,
        registry::FilterRegistry,
    },
    filters::{HealthcheckFilter, SendErrorFilter},
    metrics,
};

pub struct Gateway {
    pipeline: PipelineRunner,
    file_manager: Arc<FilterFileManager>,
    debug: DebugConfig,
}

impl Gateway {
    /// Assemble the engine from configuration and install the built-in
    /// filters. Call [`start`](Self::start) afterwards to begin polling.
    pub fn from_config(config: &GatewayConfig) -> Self {
        metrics::init_metrics();

        let registry = Arc::new(FilterRegistry::new());
        let loader = Arc::new(FilterLoader::new(
            registry,
            Arc::new(RhaiFilterCompiler::new()),
        ));
        loader.install(Arc::new(SendErrorFilter::new()));
        loader.install(Arc::new(HealthcheckFilter::new()));

        let processor = Arc::new(FilterProcessor::new(
            Arc::clone(&loader),
            Arc::new(metrics::BasicFilterUsageNotifier),
        ));
        let file_manager = Arc::new(FilterFileManager::new(
            FileManagerConfig::from(&config.filter_scan),
            loader,
        ));

        Self {
            pipeline: PipelineRunner::new(processor),
            file_manager,
            debug: config.debug,
        }
    }

    /// Run one synchronous scan, then spawn the background poller.
    ///
    /// The initial scan means the filter set is complete before the host
    /// starts serving traffic.
    pub async fn start(&self) -> Result<JoinHandle<()>> {
        self.file_manager.scan_once().await;
        self.file_manager.start()
    }

    /// Signal the poller to stop; join the handle returned by
    /// [`start`](Self::start) to wait for it.
    pub fn shutdown(&self) {
        self.file_manager.shutdown();
    }

    /// Force a filter-directory rescan outside the polling schedule.
    pub async fn rescan(&self) {
        self.file_manager.scan_once().await;
    }

    /// Drive one request through the pipeline.
    pub fn handle(&self, request: HttpRequest) -> HttpResponse {
        let mut ctx = RequestContext::new(request);
        ctx.debug_routing = self.debug.routing;
        ctx.debug_request = self.debug.request;
        self.pipeline.execute(&mut ctx);
        let response = std::mem::take(&mut ctx.response);
        ctx.unset();
        response
    }

    pub fn pipeline(&self) -> &PipelineRunner {
        &self.pipeline
    }

    pub fn processor(&self) -> &Arc<FilterProcessor> {
        self.pipeline.processor()
    }
}
