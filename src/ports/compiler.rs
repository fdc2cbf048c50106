//! Port for turning a filter source blob into a runnable filter.

use std::{path::Path, sync::Arc};

use crate::core::{error::ConfigError, filter::Filter};

/// Turns source bytes into an executable [`Filter`] instance.
///
/// The backend is the adapter's problem (embedded script engine, dynamic
/// library, pre-registered natives); the engine only ever sees the filter
/// contract. A failed compile surfaces as [`ConfigError`], which the loader
/// logs while keeping the previously compiled instance in service.
pub trait FilterCompiler: Send + Sync {
    fn compile(&self, source: &[u8], path: &Path) -> Result<Arc<dyn Filter>, ConfigError>;
}
