//! The filter/decompose stages of the event pipeline: `AddFileId` (done by
//! the caller before these run), `FilterActionable`, and
//! `SeparateFilesAndDirs`.

use crate::events::{Event, Op};
use crate::tailing::TailingSet;

/// Survives iff: not already tailing this file, the op is `Create` or
/// `Write`, the path resolved to a valid `FileId`, the path still exists
/// and is a directory or a regular file, and no `skip_files` substring
/// matches the path.
pub fn is_actionable(event: &Event, tailing: &TailingSet, skip_files: &[String]) -> bool {
    if tailing.is_tailing(event.file_id) {
        return false;
    }
    if !matches!(event.op, Op::Create | Op::Write) {
        return false;
    }
    if !event.file_id.is_valid() {
        return false;
    }
    let Ok(metadata) = std::fs::metadata(&event.path) else {
        return false;
    };
    if !(metadata.is_dir() || metadata.is_file()) {
        return false;
    }
    let path_str = event.path.to_string_lossy();
    !skip_files.iter().any(|skip| path_str.contains(skip.as_str()))
}

/// True when the event's path is currently a directory. Routes an
/// actionable event to `HandleDirs` instead of `HandleFiles`.
pub fn is_dir_event(event: &Event) -> bool {
    std::fs::metadata(&event.path).map(|m| m.is_dir()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileid::FileId;

    fn event_for(path: std::path::PathBuf, op: Op) -> Event {
        let file_id = crate::fileid::FileId::for_path(&path).unwrap_or(FileId::INVALID);
        Event::new(path, op, file_id)
    }

    #[test]
    fn already_tailing_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "x").unwrap();
        let event = event_for(path, Op::Create);
        let tailing = TailingSet::new();
        tailing.claim(crate::tailing::TailedFile {
            file_id: event.file_id,
            path: event.path.clone(),
            process_name: "p".into(),
            process_id: 0,
            component: String::new(),
            log_format: crate::resolver::LogFormat::Unknown,
        });
        assert!(!is_actionable(&event, &tailing, &[]));
    }

    #[test]
    fn remove_op_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "x").unwrap();
        let event = event_for(path, Op::Remove);
        assert!(!is_actionable(&event, &TailingSet::new(), &[]));
    }

    #[test]
    fn skip_files_substring_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("searchserver-0.log");
        std::fs::write(&path, "x").unwrap();
        let event = event_for(path, Op::Create);
        assert!(!is_actionable(
            &event,
            &TailingSet::new(),
            &["searchserver-0.log".to_string()]
        ));
    }

    #[test]
    fn plain_new_file_is_actionable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "x").unwrap();
        let event = event_for(path, Op::Create);
        assert!(is_actionable(&event, &TailingSet::new(), &[]));
        assert!(!is_dir_event(&event));
    }

    #[test]
    fn directory_is_actionable_and_flagged_as_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let event = event_for(sub, Op::Create);
        assert!(is_actionable(&event, &TailingSet::new(), &[]));
        assert!(is_dir_event(&event));
    }
}
