pub mod file_manager;
pub mod rhai_compiler;

pub use file_manager::{FileManagerConfig, FilterFileManager};
pub use rhai_compiler::{RhaiFilter, RhaiFilterCompiler};
