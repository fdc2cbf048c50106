//! Compile-on-demand filter loading with content-hash change detection.
//!
//! The loader sits between the file manager and the registry. Each source
//! path is tracked by the SHA-256 digest of its last compiled bytes: an
//! unchanged digest returns the cached instance without touching the
//! compiler, a changed digest recompiles and swaps the registry entry, and a
//! failed compile keeps the previous instance serving.
//!
//! Per-kind execution sequences are rebuilt after every mutation and
//! published through an [`ArcSwap`] so request workers pick up one immutable
//! snapshot per stage, never a half-updated list.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use arc_swap::ArcSwap;
use sha2::{Digest, Sha256};

use crate::{
    core::{
        error::ConfigError,
        filter::{Filter, FilterKind},
        registry::FilterRegistry,
    },
    metrics,
    ports::compiler::FilterCompiler,
};

type KindSequences = HashMap<FilterKind, Arc<Vec<Arc<dyn Filter>>>>;

#[derive(Default)]
struct LoaderState {
    /// Digest of the bytes last handed to the compiler, per source path.
    hash_by_path: HashMap<PathBuf, String>,
    /// Registry name owned by each source path, for replacement and removal.
    name_by_path: HashMap<PathBuf, String>,
}

pub struct FilterLoader {
    registry: Arc<FilterRegistry>,
    compiler: Arc<dyn FilterCompiler>,
    state: Mutex<LoaderState>,
    sequences: ArcSwap<KindSequences>,
}

impl FilterLoader {
    pub fn new(registry: Arc<FilterRegistry>, compiler: Arc<dyn FilterCompiler>) -> Self {
        Self {
            registry,
            compiler,
            state: Mutex::new(LoaderState::default()),
            sequences: ArcSwap::from_pointee(KindSequences::default()),
        }
    }

    pub fn registry(&self) -> &FilterRegistry {
        &self.registry
    }

    /// Compile `source` for `path` unless its digest matches the last compile.
    ///
    /// On a failed compile the previous instance (if any) stays registered and
    /// is returned; the error only escapes when the path never compiled.
    pub fn get_or_create(
        &self,
        path: &Path,
        source: &[u8],
    ) -> Result<Arc<dyn Filter>, ConfigError> {
        let digest = digest_hex(source);
        let mut state = self.state.lock().expect("loader state lock poisoned");

        if state.hash_by_path.get(path).map(String::as_str) == Some(digest.as_str()) {
            if let Some(cached) = state
                .name_by_path
                .get(path)
                .and_then(|name| self.registry.get(name))
            {
                return Ok(cached);
            }
        }

        match self.compiler.compile(source, path) {
            Ok(filter) => {
                let name = filter.name().to_string();
                if let Some(old_name) = state.name_by_path.insert(path.to_path_buf(), name.clone())
                {
                    if old_name != name {
                        self.registry.remove(&old_name);
                    }
                }
                state.hash_by_path.insert(path.to_path_buf(), digest);
                self.registry.put(name.as_str(), Arc::clone(&filter));
                drop(state);

                tracing::info!(
                    filter = %name,
                    kind = %filter.kind(),
                    order = filter.order(),
                    path = %path.display(),
                    "loaded filter"
                );
                metrics::record_filter_reload("loaded");
                self.publish();
                Ok(filter)
            }
            Err(error) => {
                // Remember the failing digest so an unchanged bad file is not
                // recompiled (and re-logged) on every scan.
                state.hash_by_path.insert(path.to_path_buf(), digest);
                let previous = state
                    .name_by_path
                    .get(path)
                    .and_then(|name| self.registry.get(name));
                drop(state);

                tracing::error!(
                    path = %path.display(),
                    error = %error,
                    "filter compilation failed; retaining previous instance"
                );
                metrics::record_filter_reload("compile_failed");
                match previous {
                    Some(old) => Ok(old),
                    None => Err(error),
                }
            }
        }
    }

    /// Drop the filter owned by `path` (the source file disappeared).
    pub fn remove(&self, path: &Path) {
        let mut state = self.state.lock().expect("loader state lock poisoned");
        state.hash_by_path.remove(path);
        let removed = state
            .name_by_path
            .remove(path)
            .and_then(|name| self.registry.remove(&name).map(|_| name));
        drop(state);

        if let Some(name) = removed {
            tracing::info!(filter = %name, path = %path.display(), "removed filter");
            metrics::record_filter_reload("removed");
            self.publish();
        }
    }

    /// Register a native (compiled-in) filter that has no backing source file.
    pub fn install(&self, filter: Arc<dyn Filter>) {
        let name = filter.name().to_string();
        tracing::info!(filter = %name, kind = %filter.kind(), "installed native filter");
        self.registry.put(name, filter);
        self.publish();
    }

    /// The current execution sequence for `kind`, sorted by `(order, name)`.
    ///
    /// Returns an immutable snapshot: callers iterating it are unaffected by
    /// concurrent reloads.
    pub fn filters_by_kind(&self, kind: &FilterKind) -> Arc<Vec<Arc<dyn Filter>>> {
        self.sequences
            .load()
            .get(kind)
            .cloned()
            .unwrap_or_default()
    }

    /// Rebuild every per-kind sequence from the registry and publish the new
    /// snapshot. Called by the single writer after each mutation.
    fn publish(&self) {
        let mut grouped: HashMap<FilterKind, Vec<Arc<dyn Filter>>> = HashMap::new();
        for (_, filter) in self.registry.snapshot() {
            grouped.entry(filter.kind()).or_default().push(filter);
        }

        let mut sequences = KindSequences::with_capacity(grouped.len());
        for (kind, mut filters) in grouped {
            filters.sort_by(|a, b| {
                a.order()
                    .cmp(&b.order())
                    .then_with(|| a.name().cmp(b.name()))
            });
            sequences.insert(kind, Arc::new(filters));
        }
        self.sequences.store(Arc::new(sequences));
    }
}

fn digest_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
