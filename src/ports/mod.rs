pub mod compiler;
pub mod usage;

pub use compiler::FilterCompiler;
pub use usage::{FilterUsageNotifier, NoopUsageNotifier};
