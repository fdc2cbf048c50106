//! Process-wide table of live filter instances.
//!
//! The registry is the single source of truth for what is currently loaded,
//! keyed by filter name. Writes come from one place only (the loader, driven
//! by the file-manager poller); request workers read concurrently. `scc` keeps
//! individual operations lock-free; consistent per-stage iteration is provided
//! one level up by the loader's published per-kind snapshots.

use std::sync::Arc;

use crate::core::filter::Filter;

#[derive(Default)]
pub struct FilterRegistry {
    filters: scc::HashMap<String, Arc<dyn Filter>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the instance registered under `name`.
    pub fn put(&self, name: impl Into<String>, filter: Arc<dyn Filter>) {
        let name = name.into();
        let _ = self.filters.remove(&name);
        let _ = self.filters.insert(name, filter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Filter>> {
        self.filters.read(name, |_, filter| Arc::clone(filter))
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn Filter>> {
        self.filters.remove(name).map(|(_, filter)| filter)
    }

    /// Point-in-time copy of the full table.
    pub fn snapshot(&self) -> Vec<(String, Arc<dyn Filter>)> {
        let mut entries = Vec::with_capacity(self.filters.len());
        self.filters.scan(|name, filter| {
            entries.push((name.clone(), Arc::clone(filter)));
        });
        entries
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::filter::{test_support::TestFilter, FilterKind};

    fn filter(name: &str) -> Arc<dyn Filter> {
        Arc::new(TestFilter::new(name, FilterKind::Pre, 0, |_, _| {
            Ok(Some(json!(true)))
        }))
    }

    #[test]
    fn test_put_get_remove() {
        let registry = FilterRegistry::new();
        registry.put("a", filter("a"));
        assert!(registry.get("a").is_some());
        assert_eq!(registry.len(), 1);
        assert!(registry.remove("a").is_some());
        assert!(registry.get("a").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_put_replaces_existing_instance() {
        let registry = FilterRegistry::new();
        registry.put("a", filter("a"));
        let first = registry.get("a").unwrap();
        registry.put("a", filter("a"));
        let second = registry.get("a").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_is_point_in_time() {
        let registry = FilterRegistry::new();
        registry.put("a", filter("a"));
        registry.put("b", filter("b"));
        let snapshot = registry.snapshot();
        registry.remove("a");
        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len(), 1);
    }
}
