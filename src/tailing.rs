//! `TailingSet`: the registry of files currently being followed.
//!
//! Enforces the "exactly one tailer per `FileId`" invariant (spec §5, §8):
//! `claim` is a check-then-insert on a `DashMap` entry, so two concurrent
//! `Create` events for the same file race on a single atomic operation
//! rather than a separate contains-check-then-insert.

use dashmap::DashMap;

use crate::fileid::FileId;
use crate::resolver::LogFormat;

/// A file currently under active tailing.
#[derive(Debug, Clone)]
pub struct TailedFile {
    pub file_id: FileId,
    pub path: std::path::PathBuf,
    pub process_name: String,
    pub process_id: u8,
    pub component: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Default)]
pub struct TailingSet {
    inner: DashMap<FileId, TailedFile>,
}

impl TailingSet {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Attempts to register `file` as tailed. Returns `true` if this call
    /// won the race and the caller should spawn a follower; `false` if a
    /// tailer for this `FileId` already exists.
    pub fn claim(&self, file: TailedFile) -> bool {
        match self.inner.entry(file.file_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(file);
                true
            }
        }
    }

    pub fn is_tailing(&self, id: FileId) -> bool {
        self.inner.contains_key(&id)
    }

    pub fn release(&self, id: FileId) {
        self.inner.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: u64) -> TailedFile {
        TailedFile {
            file_id: FileId(id),
            path: "/var/logs/a.log".into(),
            process_name: "vizqlserver".into(),
            process_id: 0,
            component: String::new(),
            log_format: LogFormat::Unknown,
        }
    }

    #[test]
    fn second_claim_for_same_id_loses() {
        let set = TailingSet::new();
        assert!(set.claim(file(1)));
        assert!(!set.claim(file(1)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn release_allows_reclaim() {
        let set = TailingSet::new();
        assert!(set.claim(file(1)));
        set.release(FileId(1));
        assert!(!set.is_tailing(FileId(1)));
        assert!(set.claim(file(1)));
    }
}
