//! The `Event` type threaded through the filesystem pipeline.
//!
//! Generalizes the teacher's app-level `Event` enum (originally "something
//! happened to a running process") to "something happened to a path on
//! disk", carrying the path's `FileId` alongside the raw filesystem op.

use std::path::PathBuf;

use crate::fileid::FileId;

/// The filesystem operation that produced an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Create,
    Write,
    Remove,
    Rename,
    Chmod,
}

/// A single filesystem notification, enriched with the path's `FileId`.
/// `file_id` is [`FileId::INVALID`] when the path could not be stat'd
/// (e.g. it was removed between the notification and the stat call).
#[derive(Debug, Clone)]
pub struct Event {
    pub path: PathBuf,
    pub op: Op,
    pub file_id: FileId,
}

impl Event {
    pub fn new(path: PathBuf, op: Op, file_id: FileId) -> Self {
        Self { path, op, file_id }
    }
}

impl From<notify::EventKind> for Op {
    fn from(kind: notify::EventKind) -> Self {
        use notify::event::{ModifyKind, RenameMode};
        use notify::EventKind as K;
        match kind {
            K::Create(_) => Op::Create,
            K::Modify(ModifyKind::Name(RenameMode::Any))
            | K::Modify(ModifyKind::Name(RenameMode::To)) => Op::Rename,
            K::Modify(ModifyKind::Data(_)) | K::Modify(ModifyKind::Any) => Op::Write,
            K::Modify(ModifyKind::Metadata(_)) => Op::Chmod,
            K::Remove(_) => Op::Remove,
            _ => Op::Write,
        }
    }
}
