//! log4j 1.x configuration: `log4j.properties` and `log4j.xml`.

use std::collections::HashMap;
use std::path::Path;

use quick_xml::events::Event as XmlEvent;
use quick_xml::reader::Reader;

use crate::error::FormatError;
use crate::formats::pattern_regex::pattern_to_regex;

/// Parses a `log4j.properties` file. Appenders are declared with
/// `log4j.appender.<name>=<class>`, their output file with
/// `log4j.appender.<name>.File=<path>`, and their layout with
/// `log4j.appender.<name>.layout.ConversionPattern=<pattern>`.
///
/// Returns the regex derived from each appender's layout as a generic
/// format (matched against a file's first line), not a named one — unlike
/// log4j2, there's no reliable appender-name-to-file association surfaced
/// here that `get_log_format`'s path-substring match could key on.
pub fn from_properties(path: &Path) -> Result<Vec<String>, FormatError> {
    let raw = std::fs::read_to_string(path).map_err(|source| FormatError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let props = parse_properties(&raw);

    let mut patterns: Vec<String> = Vec::new();
    for (key, value) in &props {
        if key
            .strip_prefix("log4j.appender.")
            .and_then(|rest| rest.strip_suffix(".layout.ConversionPattern"))
            .is_some()
        {
            patterns.push(value.clone());
        }
    }

    let formats = patterns
        .iter()
        .map(|pattern| pattern_to_regex(pattern, &HashMap::new()))
        .collect();
    Ok(dedup(formats))
}

/// Parses a `log4j.xml` file: `<appender>` elements carry a `File` param
/// and a nested `<layout>` with a `ConversionPattern` param. Returns each
/// appender's layout as a generic regex format, same rationale as
/// [`from_properties`].
pub fn from_xml(path: &Path) -> Result<Vec<String>, FormatError> {
    let raw = std::fs::read_to_string(path).map_err(|source| FormatError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = Reader::from_str(&raw);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut current_appender: Option<String> = None;
    let mut pattern_of: HashMap<String, String> = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(|source| FormatError::Xml {
            path: path.to_path_buf(),
            source,
        })? {
            XmlEvent::Start(ref e) | XmlEvent::Empty(ref e) => {
                let local = local_name(e.name().as_ref());
                let attrs = attr_map(e);
                match local.as_str() {
                    "appender" => {
                        current_appender = attrs.get("name").cloned();
                    }
                    "param" => {
                        if let Some(appender) = &current_appender {
                            if let (Some(name), Some(value)) = (attrs.get("name"), attrs.get("value")) {
                                if name == "ConversionPattern" {
                                    pattern_of.insert(appender.clone(), value.clone());
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
            XmlEvent::End(ref e) => {
                if local_name(e.name().as_ref()) == "appender" {
                    current_appender = None;
                }
            }
            XmlEvent::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if pattern_of.is_empty() {
        return Err(FormatError::InvalidConfig(path.to_path_buf()));
    }

    let formats = pattern_of
        .values()
        .map(|pattern| pattern_to_regex(pattern, &HashMap::new()))
        .collect();
    Ok(dedup(formats))
}

fn local_name(qname: &[u8]) -> String {
    let s = String::from_utf8_lossy(qname);
    s.rsplit(':').next().unwrap_or(&s).to_string()
}

fn attr_map(e: &quick_xml::events::BytesStart<'_>) -> HashMap<String, String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .map(|a| {
            (
                local_name(a.key.as_ref()),
                String::from_utf8_lossy(&a.value).to_string(),
            )
        })
        .collect()
}

fn dedup(formats: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    formats.into_iter().filter(|f| seen.insert(f.clone())).collect()
}

fn parse_properties(raw: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut pending: Option<(String, String)> = None;
    for line in raw.lines() {
        let line = line.trim_end();
        if let Some((key, mut value)) = pending.take() {
            let cont = line.trim_start();
            if let Some(stripped) = cont.strip_suffix('\\') {
                value.push_str(stripped.trim_end());
                pending = Some((key, value));
                continue;
            } else {
                value.push_str(cont);
                out.push((key, value));
                continue;
            }
        }
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }
        let Some(sep) = trimmed.find(|c| c == '=' || c == ':') else {
            continue;
        };
        let key = trimmed[..sep].trim().to_string();
        let mut value = trimmed[sep + 1..].trim_start().to_string();
        if let Some(stripped) = value.strip_suffix('\\') {
            value = stripped.trim_end().to_string();
            pending = Some((key, value));
        } else {
            out.push((key, value));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_parse_file_and_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log4j.properties");
        std::fs::write(
            &path,
            "log4j.appender.main=org.apache.log4j.RollingFileAppender\n\
             log4j.appender.main.File=/var/log/app.log\n\
             log4j.appender.main.layout.ConversionPattern=%d{yyyy-MM-dd} %p %c - %m%n\n",
        )
        .unwrap();
        let formats = from_properties(&path).unwrap();
        assert_eq!(formats.len(), 1);
        assert!(formats[0].contains("(?P<level>"));
    }

    #[test]
    fn properties_parses_multiple_distinct_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log4j.properties");
        std::fs::write(
            &path,
            "log4j.appender.console.layout.ConversionPattern=%m%n\n\
             log4j.appender.file.layout.ConversionPattern=%d{yyyy-MM-dd} %p %c - %m%n\n",
        )
        .unwrap();
        let formats = from_properties(&path).unwrap();
        assert_eq!(formats.len(), 2);
    }

    #[test]
    fn xml_parses_appender_param_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log4j.xml");
        std::fs::write(
            &path,
            r#"<?xml version="1.0"?>
<log4j:configuration xmlns:log4j="http://jakarta.apache.org/log4j/">
  <appender name="main" class="org.apache.log4j.RollingFileAppender">
    <param name="File" value="/var/log/app.log"/>
    <layout class="org.apache.log4j.PatternLayout">
      <param name="ConversionPattern" value="%d{yyyy-MM-dd} %-5p %c - %m%n"/>
    </layout>
  </appender>
</log4j:configuration>"#,
        )
        .unwrap();
        let formats = from_xml(&path).unwrap();
        assert_eq!(formats.len(), 1);
        assert!(formats[0].contains("(?P<level>"));
    }

    #[test]
    fn xml_with_no_patterns_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log4j.xml");
        std::fs::write(&path, "<log4j:configuration/>").unwrap();
        assert!(from_xml(&path).is_err());
    }
}
