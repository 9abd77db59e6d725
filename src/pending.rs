//! `PendingQueue`: files whose process configuration hasn't appeared yet,
//! plus the config-directory watcher that retries them once it does.

use std::path::{Path, PathBuf};
use std::time::Duration;

use dashmap::DashMap;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::events::Event;
use crate::fileid::FileId;
use crate::metrics::MetricsFacade;

/// A file parked because `name_id` had no matching config directory at the
/// time it was discovered.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub key: String,
    pub event: Event,
}

#[derive(Debug, Default)]
pub struct PendingQueue {
    inner: DashMap<FileId, PendingEntry>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    pub fn insert(&self, key: String, event: Event) {
        self.inner.insert(event.file_id, PendingEntry { key, event });
    }

    pub fn remove(&self, id: FileId) -> Option<PendingEntry> {
        self.inner.remove(&id).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns every pending entry whose key matches `dir_name`: an exact
    /// match, or `dir_name` starting with `key + "_"`. This is the
    /// underscore-boundary rule that keeps `vizqlserver_1` from matching a
    /// directory named `vizqlserver_10`.
    fn matches(&self, dir_name: &str) -> Vec<FileId> {
        self.inner
            .iter()
            .filter(|entry| {
                let key = &entry.value().key;
                dir_name == key.as_str() || dir_name.starts_with(&format!("{key}_"))
            })
            .map(|entry| *entry.key())
            .collect()
    }
}

/// Returns true iff a config directory named `dir_name` should wake a
/// pending entry keyed by `pending_key`.
pub fn matches_pending_key(pending_key: &str, dir_name: &str) -> bool {
    dir_name == pending_key || dir_name.starts_with(&format!("{pending_key}_"))
}

/// Watches `config_dir` for newly created directories and retries any
/// pending entry whose key they satisfy. Returns immediately if
/// `config_dir` is empty (no config root configured). Retries are sent on
/// `retry_tx`, a bounded channel; if it's full, the retry is dropped with a
/// warning and the pending entry is left in place for the next matching
/// event.
pub async fn watch_config_dir(
    config_dir: PathBuf,
    pending: std::sync::Arc<PendingQueue>,
    retry_tx: mpsc::Sender<Event>,
    metrics: std::sync::Arc<dyn MetricsFacade>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    if config_dir.as_os_str().is_empty() {
        return;
    }

    let (raw_tx, mut raw_rx) = mpsc::channel(256);
    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            let _ = raw_tx.blocking_send(res);
        },
        notify::Config::default(),
    ) {
        Ok(w) => w,
        Err(err) => {
            tracing::warn!(error = %err, "failed to create config directory watcher");
            return;
        }
    };

    if let Err(err) = watcher.watch(&config_dir, RecursiveMode::NonRecursive) {
        tracing::warn!(error = %err, path = %config_dir.display(), "failed to watch config directory");
        return;
    }

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            event = raw_rx.recv() => {
                let Some(event) = event else { return };
                let Ok(event) = event else { continue };
                if !matches!(event.kind, notify::EventKind::Create(_)) {
                    continue;
                }
                for path in &event.paths {
                    if !path.is_dir() {
                        continue;
                    }
                    handle_new_config_dir(path, &pending, &retry_tx, metrics.as_ref()).await;
                }
            }
        }
    }
}

async fn handle_new_config_dir(
    path: &Path,
    pending: &PendingQueue,
    retry_tx: &mpsc::Sender<Event>,
    metrics: &dyn MetricsFacade,
) {
    // Debounce: a directory is often created and then immediately
    // populated with its config files; give that a moment to settle before
    // retrying so the retried file resolution sees a complete directory.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let Some(dir_name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
        return;
    };

    metrics.config_dir_discovery_total();

    for id in pending.matches(&dir_name) {
        let Some(entry) = pending.remove(id) else {
            continue;
        };
        if retry_tx.try_send(entry.event).is_err() {
            tracing::warn!(key = %entry.key, "retry channel full, dropping retry for pending file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Op;

    fn event(id: u64) -> Event {
        Event::new(PathBuf::from("/var/logs/vizqlserver/a.log"), Op::Create, FileId(id))
    }

    #[test]
    fn underscore_boundary_matching() {
        assert!(matches_pending_key("vizqlserver_0", "vizqlserver_0"));
        assert!(matches_pending_key("vizqlserver_1", "vizqlserver_1_abc123"));
        assert!(!matches_pending_key("vizqlserver_1", "vizqlserver_10"));
        assert!(!matches_pending_key("vizqlserver_1", "vizqlserver_2"));
        assert!(!matches_pending_key("backgrounder_0", "vizqlserver_0"));
    }

    #[test]
    fn matches_finds_only_satisfied_entries() {
        let queue = PendingQueue::new();
        queue.insert("vizqlserver_1".to_string(), event(1));
        queue.insert("vizqlserver_10".to_string(), event(2));
        let matches = queue.matches("vizqlserver_1");
        assert_eq!(matches, vec![FileId(1)]);
    }

    #[test]
    fn remove_takes_entry_out() {
        let queue = PendingQueue::new();
        queue.insert("vizqlserver_1".to_string(), event(1));
        assert_eq!(queue.len(), 1);
        let removed = queue.remove(FileId(1));
        assert!(removed.is_some());
        assert_eq!(queue.len(), 0);
    }
}
