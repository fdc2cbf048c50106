pub mod context;
pub mod debug;
pub mod error;
pub mod filter;
pub mod http;
pub mod loader;
pub mod pipeline;
pub mod processor;
pub mod registry;

pub use context::{FilterExecution, RequestContext};
pub use error::{ConfigError, GatewayError};
pub use filter::{ExecutionStatus, Filter, FilterKind, FilterOutcome};
pub use http::{HttpRequest, HttpResponse};
pub use loader::FilterLoader;
pub use pipeline::PipelineRunner;
pub use processor::FilterProcessor;
pub use registry::FilterRegistry;
