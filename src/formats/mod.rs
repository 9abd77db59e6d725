//! Derivation of per-process log line formats from on-disk configuration.
//!
//! Three config dialects are understood — log4j (`.properties` or `.xml`),
//! log4j2 (`.xml`), and httpd/Apache (`.conf`) — each producing a list of
//! [`NamedFormat`]s: a file-basename-or-appender-name paired with the regex
//! derived from that appender's layout. `pattern_regex` holds the
//! conversion-pattern translator shared by log4j and log4j2.

pub mod httpd;
pub mod log4j;
pub mod log4j2;
pub mod pattern_regex;

/// A named regex format, keyed by the log file basename (or appender name)
/// it applies to. `ProcessInstance::get_log_format` matches a file's path
/// against these names as a substring before falling back to the generic
/// pattern list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedFormat {
    pub name: String,
    pub regex: String,
}

/// Fixed generic patterns tried, in order, against any file that did not
/// match a named format. These cover the handful of line shapes common
/// across processes that ship no explicit layout configuration.
pub fn generic_patterns() -> Vec<String> {
    vec![
        // ISO-8601 timestamp, level, message
        r"^(?P<date>\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?) \[?(?P<level>\w+)\]?\s*(?P<message>.*)$".to_string(),
        // syslog-style: "Mon DD HH:MM:SS host process[pid]: message"
        r"^(?P<date>\w{3}\s+\d{1,2} \d{2}:\d{2}:\d{2}) (?P<logger>\S+) (?P<message>.*)$".to_string(),
        // level-prefixed bracketed
        r"^\[(?P<level>\w+)\]\s*(?P<message>.*)$".to_string(),
        // logger: message
        r"^(?P<logger>\S+): (?P<message>.*)$".to_string(),
        // thread tagged
        r"^\[(?P<thread>[^\]]+)\]\s*(?P<message>.*)$".to_string(),
        // plain key=value pairs, level= present
        r"^.*level=(?P<level>\w+).*$".to_string(),
        // fallback: whole line as message
        r"^(?P<message>.*)$".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_patterns_are_all_valid_regexes() {
        for pattern in generic_patterns() {
            assert!(regex::Regex::new(&pattern).is_ok(), "{pattern} failed to compile");
        }
    }
}
