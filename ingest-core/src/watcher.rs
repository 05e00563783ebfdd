use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{EventKind, RecursiveMode, Watcher};
use notify_debouncer_full::{DebounceEventResult, Debouncer, NoCache, new_debouncer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::catalog::{Catalog, is_excluded};
use crate::error::{IngestError, Result};

/// Observes the analyzer's output directory and registers each new `*.log` file's
/// stem in the shared catalog.
///
/// The debouncer callback runs on its own thread and never touches the catalog
/// directly: it only forwards candidate stems over an internal channel, which a small
/// async task drains to perform the actual (idempotent) catalog insert. This keeps
/// ordering explicit and avoids a lock shared between the watcher thread and the
/// tailer's async task.
pub struct LogDirectoryWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher, NoCache>,
    forwarder: JoinHandle<()>,
}

impl LogDirectoryWatcher {
    /// Starts watching `dir` recursively, registering new log-file stems in `catalog`.
    pub fn spawn(dir: &Path, catalog: Arc<Catalog>) -> Result<Self> {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<String>();

        let mut debouncer = new_debouncer(
            Duration::from_millis(200),
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for event in events {
                        #[allow(deprecated)]
                        let notify_event = &event.event;
                        if !matches!(notify_event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                            continue;
                        }
                        for path in &notify_event.paths {
                            if path.extension().and_then(|e| e.to_str()) != Some("log") {
                                continue;
                            }
                            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                                continue;
                            };
                            if is_excluded(stem) {
                                continue;
                            }
                            debug!("watcher observed log file: {stem}");
                            if raw_tx.send(stem.to_string()).is_err() {
                                error!("log directory watcher forwarder channel closed");
                            }
                        }
                    }
                }
                Err(errors) => {
                    for e in errors {
                        warn!("log directory watcher error: {e}");
                    }
                }
            },
        )
        .map_err(IngestError::Watcher)?;

        debouncer
            .watch(dir, RecursiveMode::Recursive)
            .map_err(IngestError::Watcher)?;

        let forwarder = tokio::spawn(async move {
            while let Some(stem) = raw_rx.recv().await {
                catalog.add_log_file(stem);
            }
        });

        Ok(Self {
            _debouncer: debouncer,
            forwarder,
        })
    }
}

impl Drop for LogDirectoryWatcher {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn new_log_file_is_registered_in_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(Catalog::new());
        let _watcher = LogDirectoryWatcher::spawn(dir.path(), catalog.clone()).unwrap();

        tokio::fs::write(dir.path().join("conn.log"), b"{}\n")
            .await
            .unwrap();

        let mut seen = false;
        for _ in 0..50 {
            if catalog.list_log_files().iter().any(|s| s == "conn") {
                seen = true;
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(50)).await;
        }
        assert!(seen, "expected conn.log to be registered");
    }

    #[tokio::test]
    async fn excluded_stems_never_appear_in_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(Catalog::new());
        let _watcher = LogDirectoryWatcher::spawn(dir.path(), catalog.clone()).unwrap();

        tokio::fs::write(dir.path().join("reporter.log"), b"{}\n")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("dns.log"), b"{}\n")
            .await
            .unwrap();

        let mut seen_dns = false;
        for _ in 0..50 {
            if catalog.list_log_files().iter().any(|s| s == "dns") {
                seen_dns = true;
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(50)).await;
        }
        assert!(seen_dns, "expected dns.log to be registered");
        assert!(!catalog.list_log_files().iter().any(|s| s == "reporter"));
    }
}
