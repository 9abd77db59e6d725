//! Resolves a log file to the process instance that owns it, and derives
//! the regex (or `"json"`/unknown marker) used to reassemble its lines.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::ResolverError;
use crate::formats::{generic_patterns, httpd, log4j, log4j2, NamedFormat};

/// The line format a tailed file is reassembled with.
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Unknown,
    Pattern(String),
}

impl PartialEq for LogFormat {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LogFormat::Json, LogFormat::Json) => true,
            (LogFormat::Unknown, LogFormat::Unknown) => true,
            (LogFormat::Pattern(a), LogFormat::Pattern(b)) => a == b,
            _ => false,
        }
    }
}

/// A resolved process instance: its identity plus the formats derived from
/// its configuration directory.
#[derive(Debug, Clone)]
pub struct ProcessInstance {
    pub id: u8,
    pub name: String,
    pub config_dir: PathBuf,
    named_formats: Vec<NamedFormat>,
    generic_formats: Vec<String>,
}

impl ProcessInstance {
    /// Locates `<name>_<id>(_...)?` under `config_root` and loads its config.
    pub fn for_process(
        name: &str,
        id: u8,
        config_root: &Path,
    ) -> Result<ProcessInstance, ResolverError> {
        let prefix = format!("{name}_{id}");
        let entries = std::fs::read_dir(config_root)
            .map_err(|_| ResolverError::ConfigDirNotFound {
                name: name.to_string(),
                id,
            })?;

        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let dir_name = file_name.to_string_lossy();
            if dir_name == prefix.as_str() || dir_name.starts_with(&format!("{prefix}_")) {
                return ProcessInstance::from_config_dir(name, id, &entry.path());
            }
        }

        Err(ResolverError::ConfigDirNotFound {
            name: name.to_string(),
            id,
        })
    }

    /// Loads `workgroup.yml` plus any log4j/log4j2/httpd config found
    /// directly inside `directory`. httpd.conf, if present, is checked
    /// unconditionally after log4j.xml and *overwrites* whatever generic
    /// formats log4j.xml contributed — both directives can coexist in a
    /// config directory, and httpd wins when they do.
    fn from_config_dir(
        name: &str,
        id: u8,
        directory: &Path,
    ) -> Result<ProcessInstance, ResolverError> {
        if !directory.is_dir() {
            return Err(ResolverError::ConfigDirNotFound {
                name: name.to_string(),
                id,
            });
        }
        let workgroup = directory.join("workgroup.yml");
        if !workgroup.is_file() {
            return Err(ResolverError::ConfigFileNotFound(workgroup));
        }
        let raw = std::fs::read_to_string(&workgroup).map_err(|_| {
            ResolverError::ConfigFileNotFound(workgroup.clone())
        })?;
        let _: serde_yaml::Value = serde_yaml::from_str(&raw).map_err(|source| {
            ResolverError::InvalidConfig {
                path: workgroup.clone(),
                source: Box::new(source),
            }
        })?;

        let mut named_formats = Vec::new();
        let mut generic_formats = Vec::new();

        if let Ok(entries) = std::fs::read_dir(directory) {
            for entry in entries.flatten() {
                let file_name = entry.file_name().to_string_lossy().to_string();
                if file_name.ends_with("log4j2.xml") {
                    if let Ok(formats) = log4j2::from_xml(&entry.path()) {
                        named_formats.extend(formats);
                    }
                }
            }
        }

        let log4j_xml = directory.join("log4j.xml");
        if log4j_xml.is_file() {
            if let Ok(formats) = log4j::from_xml(&log4j_xml) {
                generic_formats = formats;
            }
        }

        let log4j_properties = directory.join("log4j.properties");
        if log4j_properties.is_file() {
            if let Ok(formats) = log4j::from_properties(&log4j_properties) {
                generic_formats = formats;
            }
        }

        let httpd_conf = directory.join("httpd.conf");
        if httpd_conf.is_file() {
            if let Ok(formats) = httpd::from_conf(&httpd_conf) {
                generic_formats = formats;
            }
        }

        Ok(ProcessInstance {
            id,
            name: name.to_string(),
            config_dir: directory.to_path_buf(),
            named_formats,
            generic_formats,
        })
    }

    /// Derives the format for a given file path belonging to this
    /// instance: JSON (first non-whitespace byte is `{` and the first line
    /// parses as a JSON value), else a named format whose name appears as a
    /// substring of the path, else the first of the generic patterns
    /// (instance-provided ones checked before the built-in fixed set) that
    /// compiles, else unknown.
    pub fn get_log_format(&self, file: &Path) -> LogFormat {
        if let Ok(first_line) = first_line(file) {
            let trimmed = first_line.trim();
            if trimmed.starts_with('{') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
                return LogFormat::Json;
            }
        }

        let path_str = file.to_string_lossy();
        for format in &self.named_formats {
            if path_str.contains(&format.name) {
                return LogFormat::Pattern(format.regex.clone());
            }
        }

        let mut candidates = self.generic_formats.clone();
        candidates.extend(generic_patterns());
        for pattern in candidates {
            if Regex::new(&pattern).is_ok() {
                return LogFormat::Pattern(pattern);
            }
        }

        LogFormat::Unknown
    }
}

fn first_line(path: &Path) -> std::io::Result<String> {
    use std::io::BufRead;
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.is_empty() {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "empty file"));
    }
    Ok(line)
}

/// Derives the process name from a log file path: strip the logs-dir
/// prefix, take the first remaining path segment, and rename `httpd` to
/// `gateway` (httpd's logs live under a directory whose name predates the
/// "gateway" component naming used everywhere else).
pub fn get_process_name(logs_dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(logs_dir).unwrap_or(path);
    let first = relative
        .components()
        .next()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .unwrap_or_default();
    if first == "httpd" {
        "gateway".to_string()
    } else {
        first
    }
}

/// Derives the numeric process instance id embedded in a path segment by
/// stripping date-like and node-like substrings, then taking the first
/// remaining run of digits.
pub fn get_process_id(segment: &str) -> u8 {
    let strip_patterns = [
        r"\d{4}[_-]\d{2}[_-]\d{2}[_-]\d{2}[_-]\d{2}[_-]\d{2}[_-]\d{2}",
        r"\d{4}[_-]\d{2}[_-]\d{2}[_-]\d{2}[_-]\d{2}[_-]\d{2}",
        r"\d{4}[_-]\d{2}[_-]\d{2}[_-]?\d*",
        r"node\d+",
        r"\d+$",
        r"_\d+-",
    ];
    let mut remaining = segment.to_string();
    for pattern in strip_patterns {
        let re = Regex::new(pattern).unwrap();
        remaining = re.replace_all(&remaining, "").to_string();
    }
    let digits = Regex::new(r"\d+").unwrap();
    digits
        .find(&remaining)
        .and_then(|m| m.as_str().parse::<u8>().ok())
        .unwrap_or(0)
}

/// Known process component tags, matched by prefix first, then by
/// substring anywhere in the path.
pub fn get_component(path: &str) -> String {
    const PREFIXES: &[&str] = &["tomcat_", "stdout_", "control_", "nativeapi_", "tabprotosrv_"];
    const SUBSTRINGS: &[&str] = &[
        "instrumentation-metrics_",
        "metrics_",
        "discovery_",
        "oauth-service",
        "audit-history_",
        "vizql-client",
        "checklicense",
    ];
    for prefix in PREFIXES {
        if path.contains(prefix) {
            return (*prefix).trim_end_matches('_').to_string();
        }
    }
    for substring in SUBSTRINGS {
        if path.contains(substring) {
            return (*substring).trim_end_matches('_').to_string();
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_name_strips_prefix_and_renames_httpd() {
        let logs_dir = Path::new("/var/logs");
        assert_eq!(
            get_process_name(logs_dir, Path::new("/var/logs/httpd/access.log")),
            "gateway"
        );
        assert_eq!(
            get_process_name(logs_dir, Path::new("/var/logs/vizqlserver/a.log")),
            "vizqlserver"
        );
    }

    #[test]
    fn process_id_extracts_trailing_digits_after_stripping_dates() {
        assert_eq!(get_process_id("vizqlserver_1_2024-01-02_03-04-05"), 1);
        assert_eq!(get_process_id("node3"), 3);
        assert_eq!(get_process_id("nothing_here"), 0);
    }

    #[test]
    fn component_matches_prefix_before_substring() {
        assert_eq!(get_component("/var/logs/tomcat_1/app.log"), "tomcat");
        assert_eq!(get_component("/var/logs/x/metrics_foo.log"), "metrics");
        assert_eq!(get_component("/var/logs/x/plain.log"), "");
    }

    #[test]
    fn config_dir_not_found_when_no_matching_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProcessInstance::for_process("vizqlserver", 1, dir.path()).unwrap_err();
        assert!(matches!(err, ResolverError::ConfigDirNotFound { .. }));
        assert!(err.is_pending());
    }

    #[test]
    fn for_process_matches_suffixed_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join("vizqlserver_1_abc123");
        std::fs::create_dir(&config_dir).unwrap();
        std::fs::write(config_dir.join("workgroup.yml"), "name: vizqlserver\n").unwrap();
        let instance = ProcessInstance::for_process("vizqlserver", 1, dir.path()).unwrap();
        assert_eq!(instance.id, 1);
    }

    #[test]
    fn httpd_conf_overwrites_log4j_xml_formats() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join("gateway_0");
        std::fs::create_dir(&config_dir).unwrap();
        std::fs::write(config_dir.join("workgroup.yml"), "name: gateway\n").unwrap();
        std::fs::write(
            config_dir.join("log4j.xml"),
            r#"<log4j:configuration><appender name="a"><param name="File" value="app.log"/><layout><param name="ConversionPattern" value="%m%n"/></layout></appender></log4j:configuration>"#,
        )
        .unwrap();
        std::fs::write(
            config_dir.join("httpd.conf"),
            r#"LogFormat "%h %u %>s" access"#,
        )
        .unwrap();
        let instance = ProcessInstance::for_process("gateway", 0, dir.path()).unwrap();
        let format = instance.get_log_format(Path::new("access.log"));
        match format {
            LogFormat::Pattern(regex) => assert!(regex.contains("status")),
            other => panic!("expected pattern, got {other:?}"),
        }
    }
}
