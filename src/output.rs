//! Serializes reassembled [`LogRecord`]s to stdout as JSON Lines.
//!
//! If `text` parses as a JSON value, it's embedded as `message` directly
//! (not re-escaped as a string); otherwise `message` is the raw string.
//! An unrecognized level is still written out verbatim, but additionally
//! raises a `tracing::error!` diagnostic about it — matching the original's
//! "log the surprise, but don't drop the record" behavior.

use std::io::Write;

use serde_json::{json, Value};

use crate::record::LogRecord;

const KNOWN_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "fatal"];

/// Writes `LogRecord`s to an arbitrary `Write` sink as newline-delimited
/// JSON. In `main`, this is stdout; tests use an in-memory buffer.
pub struct RecordSink<W: Write> {
    node: String,
    writer: W,
}

impl<W: Write> RecordSink<W> {
    pub fn new(node: String, writer: W) -> Self {
        Self { node, writer }
    }

    pub fn write_record(&mut self, record: &LogRecord) -> std::io::Result<()> {
        if !record.level.is_empty() && !KNOWN_LEVELS.contains(&record.level.as_str()) {
            tracing::error!(level = %record.level, path = %record.path.display(), "unrecognized log level");
        }

        let message: Value = serde_json::from_str(&record.text).unwrap_or(Value::String(record.text.clone()));

        let mut line = json!({
            "node": self.node,
            "filename": record.path.to_string_lossy(),
            "fileid": record.file_id.to_string(),
            "process": record.process_name,
            "processid": record.process_id,
            "component": record.component,
            "line": record.line_num,
            "offset": record.offset,
            "time": record.time,
            "message": message,
            "level": record.level,
        });

        if let Some(err) = &record.err {
            line["error"] = Value::String(err.clone());
        }

        writeln!(self.writer, "{line}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileid::FileId;

    fn record(text: &str, level: &str) -> LogRecord {
        LogRecord {
            path: "/var/logs/a.log".into(),
            file_id: FileId(1),
            process_name: "vizqlserver".into(),
            process_id: 1,
            component: String::new(),
            line_num: 1,
            offset: 10,
            time: "2024-01-01T00:00:00.000Z".into(),
            text: text.to_string(),
            level: level.to_string(),
            err: None,
        }
    }

    #[test]
    fn plain_text_becomes_string_message() {
        let mut buf = Vec::new();
        let mut sink = RecordSink::new("node-1".into(), &mut buf);
        sink.write_record(&record("hello world", "info")).unwrap();
        let value: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["message"], "hello world");
        assert_eq!(value["node"], "node-1");
    }

    #[test]
    fn json_text_is_embedded_not_escaped() {
        let mut buf = Vec::new();
        let mut sink = RecordSink::new("node-1".into(), &mut buf);
        sink.write_record(&record(r#"{"a":1}"#, "info")).unwrap();
        let value: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["message"]["a"], 1);
    }

    #[test]
    fn error_field_present_when_set() {
        let mut buf = Vec::new();
        let mut sink = RecordSink::new("node-1".into(), &mut buf);
        let mut rec = record("boom", "error");
        rec.err = Some("disk full".into());
        sink.write_record(&rec).unwrap();
        let value: Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["error"], "disk full");
    }
}
