//! Startup directory walk: registers every directory under `logs_dir` with
//! the filesystem watcher and seeds `OffsetCache` for every file already
//! present, so existing content is skipped unless `--read-existing-logs`
//! was passed.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use notify::{RecursiveMode, Watcher};

use crate::fileid::FileId;
use crate::offsets::{OffsetCache, SeekPosition};

/// Walks `logs_dir` recursively, registering each directory with `watcher`
/// and seeding `offsets` for each regular file found. Returns the list of
/// regular files discovered, for the caller to feed into the same
/// resolution path a live `Create` event would take.
pub fn scan(
    logs_dir: &Path,
    watcher: &mut dyn Watcher,
    offsets: &OffsetCache,
    read_existing_logs: bool,
) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let walker = WalkBuilder::new(logs_dir)
        .standard_filters(false)
        .hidden(false)
        .build();

    for entry in walker.flatten() {
        let path = entry.path();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            if let Err(err) = watcher.watch(path, RecursiveMode::NonRecursive) {
                tracing::warn!(error = %err, path = %path.display(), "failed to watch directory");
            }
            continue;
        }

        if let Ok(id) = FileId::for_path(path) {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let seek = if read_existing_logs {
                SeekPosition(0)
            } else {
                SeekPosition(size)
            };
            offsets.set(id, seek);
        }
        files.push(path.to_path_buf());
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullWatcher;
    impl Watcher for NullWatcher {
        fn new<F: notify::EventHandler>(_: F, _: notify::Config) -> notify::Result<Self>
        where
            Self: Sized,
        {
            Ok(NullWatcher)
        }
        fn watch(&mut self, _: &Path, _: RecursiveMode) -> notify::Result<()> {
            Ok(())
        }
        fn unwatch(&mut self, _: &Path) -> notify::Result<()> {
            Ok(())
        }
        fn configure(&mut self, _: notify::Config) -> notify::Result<bool> {
            Ok(true)
        }
        fn kind() -> notify::WatcherKind {
            notify::WatcherKind::PollWatcher
        }
    }

    #[test]
    fn seeds_offsets_to_eof_by_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.log"), "hello").unwrap();
        let offsets = OffsetCache::new();
        let mut watcher = NullWatcher;
        let files = scan(dir.path(), &mut watcher, &offsets, false).unwrap();
        assert_eq!(files.len(), 1);
        let id = FileId::for_path(&files[0]).unwrap();
        assert_eq!(offsets.get(id), Some(SeekPosition(5)));
    }

    #[test]
    fn read_existing_logs_seeds_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.log"), "hello").unwrap();
        let offsets = OffsetCache::new();
        let mut watcher = NullWatcher;
        let files = scan(dir.path(), &mut watcher, &offsets, true).unwrap();
        let id = FileId::for_path(&files[0]).unwrap();
        assert_eq!(offsets.get(id), Some(SeekPosition(0)));
    }
}
