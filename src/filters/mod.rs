//! Native (compiled-in) filters shipped with the engine.

pub mod healthcheck;
pub mod send_error;

pub use healthcheck::HealthcheckFilter;
pub use send_error::SendErrorFilter;
