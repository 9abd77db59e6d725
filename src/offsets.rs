//! `OffsetCache`: the last known read position for each tailed file.
//!
//! Shared by every stage that touches a file's progress: the scanner seeds
//! it at startup, followers advance it as they read, and the reassembler's
//! idle-timeout path intentionally leaves an entry in place (see
//! `DESIGN.md`'s Open Question decisions) rather than clearing it, so a
//! file that resumes growing after a long enough idle picks up where it
//! left off instead of being re-read from byte zero.

use dashmap::DashMap;

use crate::fileid::FileId;

/// A byte offset into a file, the unit the `tokio::fs::File` follower seeks
/// to before reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SeekPosition(pub u64);

/// Concurrent `FileId -> SeekPosition` map, shared across the pipeline.
#[derive(Debug, Default)]
pub struct OffsetCache {
    inner: DashMap<FileId, SeekPosition>,
}

impl OffsetCache {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    pub fn get(&self, id: FileId) -> Option<SeekPosition> {
        self.inner.get(&id).map(|v| *v)
    }

    /// Sets the offset unconditionally. Callers are responsible for the
    /// monotone-non-decreasing invariant on this map (see spec §8) — this
    /// module does not itself enforce ordering because a tailer is the
    /// sole writer for its own `FileId`.
    pub fn set(&self, id: FileId, pos: SeekPosition) {
        self.inner.insert(id, pos);
    }

    pub fn remove(&self, id: FileId) {
        self.inner.remove(&id);
    }

    pub fn contains(&self, id: FileId) -> bool {
        self.inner.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let cache = OffsetCache::new();
        let id = FileId(1);
        cache.set(id, SeekPosition(42));
        assert_eq!(cache.get(id), Some(SeekPosition(42)));
    }

    #[test]
    fn remove_clears_entry() {
        let cache = OffsetCache::new();
        let id = FileId(1);
        cache.set(id, SeekPosition(1));
        cache.remove(id);
        assert_eq!(cache.get(id), None);
    }
}
