//! Background scanner keeping the live filter set consistent with disk.
//!
//! One poller per process walks the configured directories on a fixed
//! interval, feeds new and changed files to the loader, and reports files
//! that disappeared since the previous pass. It talks to request workers only
//! through the loader's atomically published sequences, so scanning never
//! blocks request handling.

use std::{
    collections::HashSet,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use eyre::{eyre, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{core::loader::FilterLoader, metrics};

/// Settings for the filter-directory poller.
#[derive(Debug, Clone)]
pub struct FileManagerConfig {
    /// Directories to watch for filter sources.
    pub directories: Vec<PathBuf>,
    /// How often to rescan. Defaults to 5 seconds.
    pub poll_interval: Duration,
    /// Filename suffix a file must carry to be considered a filter source.
    pub suffix: String,
}

impl Default for FileManagerConfig {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            poll_interval: Duration::from_secs(5),
            suffix: ".rhai".to_string(),
        }
    }
}

pub struct FilterFileManager {
    config: FileManagerConfig,
    loader: Arc<FilterLoader>,
    /// Paths seen on the previous pass, for removal detection.
    seen: Mutex<HashSet<PathBuf>>,
    started: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl FilterFileManager {
    pub fn new(config: FileManagerConfig, loader: Arc<FilterLoader>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            loader,
            seen: Mutex::new(HashSet::new()),
            started: AtomicBool::new(false),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Spawn the poller. At most one poller runs per manager; a second call
    /// is an error.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(eyre!("filter file manager already started"));
        }

        let manager = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_rx.clone();
        tracing::info!(
            interval_secs = self.config.poll_interval.as_secs_f64(),
            directories = ?self.config.directories,
            suffix = %self.config.suffix,
            "starting filter file manager"
        );

        Ok(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.config.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        manager.scan_once().await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("filter file manager shutting down");
                            break;
                        }
                    }
                }
            }
        }))
    }

    /// Signal the poller to stop. The caller joins the handle returned by
    /// [`start`](Self::start).
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// One full pass over every configured directory.
    ///
    /// Public so hosts can force a synchronous refresh (e.g. during startup,
    /// before serving traffic) and so tests are not timing-dependent.
    pub async fn scan_once(&self) {
        let _timer = metrics::ScanTimer::new();
        let mut current = HashSet::new();

        for directory in &self.config.directories {
            let mut entries = match tokio::fs::read_dir(directory).await {
                Ok(entries) => entries,
                Err(error) => {
                    tracing::warn!(
                        directory = %directory.display(),
                        %error,
                        "cannot read filter directory; skipping"
                    );
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(error) => {
                        tracing::warn!(
                            directory = %directory.display(),
                            %error,
                            "error while listing filter directory; skipping rest"
                        );
                        break;
                    }
                };

                let path = entry.path();
                if !self.is_filter_source(&path) {
                    continue;
                }

                // One unreadable or uncompilable file never stops the scan.
                match tokio::fs::read(&path).await {
                    Ok(bytes) => {
                        current.insert(path.clone());
                        if let Err(error) = self.loader.get_or_create(&path, &bytes) {
                            tracing::warn!(
                                path = %path.display(),
                                %error,
                                "filter failed to load"
                            );
                        }
                    }
                    Err(error) => {
                        tracing::warn!(
                            path = %path.display(),
                            %error,
                            "cannot read filter source; skipping"
                        );
                    }
                }
            }
        }

        let removed: Vec<PathBuf> = {
            let mut seen = self.seen.lock().expect("file manager seen-set poisoned");
            let removed = seen.difference(&current).cloned().collect();
            *seen = current;
            removed
        };
        for path in removed {
            self.loader.remove(&path);
        }
    }

    fn is_filter_source(&self, path: &std::path::Path) -> bool {
        path.is_file()
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.ends_with(&self.config.suffix))
                .unwrap_or(false)
    }
}
