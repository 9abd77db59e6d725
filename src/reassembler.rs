//! Per-file line reassembly: batches physical lines into logical entries
//! according to the file's derived [`LogFormat`], and knows when to flush
//! on idle.
//!
//! Mirrors the original `lineProcessor`'s three format-parameterized
//! predicates: a new entry starts when the current line looks like one
//! (JSON open-brace, or a regex anchor match); an entry is complete when
//! the format says single-line (`"json"` once balanced, `""`/unknown
//! always); `parse` runs the compiled regex over the finished entry's text
//! when `--parse` is set, attaching named-group matches are left to the
//! caller (the regex itself is stored on the record via its format).

use regex::Regex;

use crate::resolver::LogFormat;
use crate::tailer::Line;

/// The idle duration after which an accumulating entry and its tailer are
/// flushed and torn down.
pub const IDLE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5 * 60);

/// A completed, but not yet enriched, log entry: the joined text plus the
/// bookkeeping fields the bridge needs to build a `LogRecord`.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub text: String,
    pub line_num: u64,
    pub offset: u64,
    pub received_at: String,
    pub err: Option<String>,
}

pub struct Reassembler {
    log_format: LogFormat,
    regex: Option<Regex>,
    buffer: Vec<Line>,
    buffer_received_at: Vec<String>,
}

impl Reassembler {
    pub fn new(log_format: LogFormat) -> Self {
        let regex = match &log_format {
            LogFormat::Pattern(pattern) => Regex::new(pattern).ok(),
            _ => None,
        };
        Self {
            log_format,
            regex,
            buffer: Vec::new(),
            buffer_received_at: Vec::new(),
        }
    }

    /// Feeds one physical line through the state machine, returning every
    /// entry that becomes complete as a result (zero, one, or — when a new
    /// entry both closes the previous one and is itself immediately
    /// complete — two).
    pub fn push(&mut self, line: Line) -> Vec<RawEntry> {
        let mut flushed = Vec::new();
        let received_at = now_rfc3339();
        let starts_new = self.is_new_entry(&line.text);

        if !self.buffer.is_empty() && starts_new {
            flushed.push(self.flush());
        }

        let text = line.text.clone();
        self.buffer.push(line);
        self.buffer_received_at.push(received_at);

        if starts_new && self.is_complete(&text) {
            flushed.push(self.flush());
        }
        flushed
    }

    /// Flushes whatever is accumulated, if anything. Used on idle timeout
    /// and on tailer shutdown.
    pub fn flush_pending(&mut self) -> Option<RawEntry> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.flush())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn is_new_entry(&self, text: &str) -> bool {
        match &self.log_format {
            LogFormat::Json => text.trim_start().starts_with('{'),
            LogFormat::Unknown => true,
            LogFormat::Pattern(_) => self.regex.as_ref().map(|r| r.is_match(text)).unwrap_or(true),
        }
    }

    /// Whether the just-arrived line (which started a new entry) also
    /// finishes it. For JSON this is a cheap brace-bounded check on that
    /// one line, not a reparse of whatever has accumulated so far — a
    /// continuation line is never checked for completeness at all.
    fn is_complete(&self, new_line_text: &str) -> bool {
        match &self.log_format {
            LogFormat::Unknown => true,
            LogFormat::Json => {
                let trimmed = new_line_text.trim();
                trimmed.starts_with('{') && trimmed.ends_with('}')
            }
            LogFormat::Pattern(_) => false,
        }
    }

    fn joined_text(&self) -> String {
        self.buffer
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn flush(&mut self) -> RawEntry {
        let text = self.joined_text();
        let first = self.buffer.first().expect("flush called on non-empty buffer");
        let last = self.buffer.last().expect("flush called on non-empty buffer");
        let entry = RawEntry {
            text,
            line_num: first.line_num,
            offset: last.offset,
            received_at: self.buffer_received_at.first().cloned().unwrap_or_default(),
            err: None,
        };
        self.buffer.clear();
        self.buffer_received_at.clear();
        entry
    }
}

pub(crate) fn now_rfc3339() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_unix_utc(duration.as_secs(), duration.subsec_millis())
}

/// Formats a unix timestamp as `YYYY-MM-DDTHH:MM:SS.mmmZ` without pulling
/// in a calendar crate the teacher's stack doesn't already carry.
fn format_unix_utc(secs: u64, millis: u32) -> String {
    const DAYS_PER_400_YEARS: i64 = 146097;
    let days_since_epoch = (secs / 86400) as i64;
    let time_of_day = secs % 86400;
    let (hour, minute, second) = (time_of_day / 3600, (time_of_day / 60) % 60, time_of_day % 60);

    // Civil-from-days algorithm (Howard Hinnant's public-domain routine).
    let z = days_since_epoch + 719468;
    let era = if z >= 0 { z } else { z - DAYS_PER_400_YEARS + 1 } / DAYS_PER_400_YEARS;
    let doe = (z - era * DAYS_PER_400_YEARS) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { y + 1 } else { y };

    format!(
        "{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{millis:03}Z"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileid::FileId;

    fn line(text: &str, num: u64, offset: u64) -> Line {
        Line {
            file_id: FileId(1),
            text: text.to_string(),
            offset,
            line_num: num,
            err: None,
        }
    }

    #[test]
    fn unknown_format_flushes_every_line() {
        let mut r = Reassembler::new(LogFormat::Unknown);
        let flushed = r.push(line("hello", 1, 5));
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].text, "hello");
        assert!(r.is_empty());
    }

    #[test]
    fn single_line_json_completes_immediately() {
        let mut r = Reassembler::new(LogFormat::Json);
        let flushed = r.push(line(r#"{"a":1}"#, 1, 7));
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].text, r#"{"a":1}"#);
        assert!(r.is_empty());
    }

    #[test]
    fn multiline_json_flushes_only_when_next_entry_starts() {
        let mut r = Reassembler::new(LogFormat::Json);
        let first = r.push(line("{\"a\":1,", 1, 7));
        assert!(first.is_empty());
        // Continuation line doesn't start a new entry, so it's never
        // completeness-checked on its own, however brace-balanced.
        let second = r.push(line("\"b\":2}", 2, 13));
        assert!(second.is_empty());
        let third = r.push(line("{\"c\":3}", 3, 20));
        assert_eq!(third.len(), 2);
        assert_eq!(third[0].text, "{\"a\":1,\n\"b\":2}");
        assert_eq!(third[0].line_num, 1);
        assert_eq!(third[0].offset, 13);
        assert_eq!(third[1].text, "{\"c\":3}");
    }

    #[test]
    fn pattern_format_flushes_on_next_anchor_match() {
        let pattern = r"^\d{4}-\d{2}-\d{2} ".to_string();
        let mut r = Reassembler::new(LogFormat::Pattern(pattern));
        assert!(r.push(line("2024-01-01 starting up", 1, 10)).is_empty());
        assert!(r.push(line("  caused by: boom", 2, 20)).is_empty());
        let flushed = r.push(line("2024-01-02 next entry", 3, 30));
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].text, "2024-01-01 starting up\n  caused by: boom");
        assert_eq!(flushed[0].offset, 20);
    }

    #[test]
    fn flush_pending_drains_accumulator_on_idle_or_shutdown() {
        let pattern = r"^\d{4}-\d{2}-\d{2} ".to_string();
        let mut r = Reassembler::new(LogFormat::Pattern(pattern));
        r.push(line("2024-01-01 starting up", 1, 10));
        let flushed = r.flush_pending().unwrap();
        assert_eq!(flushed.text, "2024-01-01 starting up");
        assert!(r.is_empty());
        assert!(r.flush_pending().is_none());
    }

    #[test]
    fn format_unix_utc_known_epoch() {
        assert_eq!(format_unix_utc(0, 0), "1970-01-01T00:00:00.000Z");
        assert_eq!(format_unix_utc(1_700_000_000, 500), "2023-11-14T22:13:20.500Z");
    }
}
