//! The normalized output record emitted for each reassembled log entry.

use std::path::PathBuf;

use crate::fileid::FileId;

/// One reassembled, enriched log entry, ready for serialization by
/// [`crate::output::RecordSink`].
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub path: PathBuf,
    pub file_id: FileId,
    pub process_name: String,
    pub process_id: u8,
    pub component: String,
    pub line_num: u64,
    pub offset: u64,
    pub time: String,
    pub text: String,
    pub level: String,
    pub err: Option<String>,
}
