//! log4j2 configuration (`log4j2.xml` or any `*log4j2.xml` file).
//!
//! Adds one wrinkle over log4j 1.x: a top-level `<Properties>` block whose
//! entries are referenced from appender attributes (and from each other)
//! via `${name}` interpolation, resolved before the pattern layout is
//! translated to a regex.

use std::collections::HashMap;
use std::path::Path;

use quick_xml::events::Event as XmlEvent;
use quick_xml::reader::Reader;
use regex::Regex;

use crate::error::FormatError;
use crate::formats::pattern_regex::pattern_to_regex;
use crate::formats::NamedFormat;

struct Appender {
    name: String,
    file_name: Option<String>,
    pattern: String,
}

pub fn from_xml(path: &Path) -> Result<Vec<NamedFormat>, FormatError> {
    let raw = std::fs::read_to_string(path).map_err(|source| FormatError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let properties = extract_properties(&raw, path)?;
    let appenders = extract_appenders(&raw, path, &properties)?;

    if appenders.is_empty() {
        return Err(FormatError::InvalidConfig(path.to_path_buf()));
    }

    let formats = appenders
        .into_iter()
        .map(|appender| {
            let name = if appender.name == "standardOut" {
                "stdout".to_string()
            } else {
                appender
                    .file_name
                    .as_deref()
                    .and_then(|f| Path::new(f).file_name())
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or(appender.name.clone())
            };
            NamedFormat {
                name,
                regex: pattern_to_regex(&appender.pattern, &HashMap::new()),
            }
        })
        .collect();

    Ok(formats)
}

fn extract_properties(raw: &str, path: &Path) -> Result<HashMap<String, String>, FormatError> {
    let mut reader = Reader::from_str(raw);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut properties = HashMap::new();
    let mut in_properties = false;
    let mut current_name: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf).map_err(|source| FormatError::Xml {
            path: path.to_path_buf(),
            source,
        })? {
            XmlEvent::Start(ref e) => {
                let local = local_name(e.name().as_ref());
                if local == "Properties" {
                    in_properties = true;
                } else if in_properties && local == "Property" {
                    current_name = attr_map(e).get("name").cloned();
                }
            }
            XmlEvent::Empty(ref e) => {
                let local = local_name(e.name().as_ref());
                if in_properties && local == "Property" {
                    let attrs = attr_map(e);
                    if let (Some(name), Some(value)) = (attrs.get("name"), attrs.get("value")) {
                        properties.insert(name.clone(), value.clone());
                    }
                }
            }
            XmlEvent::Text(ref t) => {
                if let Some(name) = current_name.take() {
                    let text = t.unescape().unwrap_or_default().to_string();
                    properties.insert(name, text);
                }
            }
            XmlEvent::End(ref e) => {
                let local = local_name(e.name().as_ref());
                if local == "Properties" {
                    in_properties = false;
                } else if local == "Property" {
                    current_name = None;
                }
            }
            XmlEvent::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(properties)
}

fn extract_appenders(
    raw: &str,
    path: &Path,
    properties: &HashMap<String, String>,
) -> Result<Vec<Appender>, FormatError> {
    let mut reader = Reader::from_str(raw);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut appenders = Vec::new();
    let mut in_appenders = false;
    let mut current: Option<(String, Option<String>)> = None; // (name, fileName)

    loop {
        match reader.read_event_into(&mut buf).map_err(|source| FormatError::Xml {
            path: path.to_path_buf(),
            source,
        })? {
            XmlEvent::Start(ref e) | XmlEvent::Empty(ref e) => {
                let local = local_name(e.name().as_ref());
                let attrs = attr_map(e);
                if local == "Appenders" {
                    in_appenders = true;
                    continue;
                }
                if in_appenders && current.is_none() && attrs.contains_key("name") {
                    let name = attrs.get("name").cloned().unwrap_or_default();
                    let file_name = attrs
                        .get("fileName")
                        .map(|f| interpolate(f, properties));
                    current = Some((name, file_name));
                }
                if local == "PatternLayout" {
                    let pattern = attrs
                        .get("pattern")
                        .cloned()
                        .map(|p| interpolate(&p, properties))
                        .unwrap_or_else(|| "%m%n".to_string());
                    if let Some((name, file_name)) = current.clone() {
                        appenders.push(Appender {
                            name,
                            file_name,
                            pattern,
                        });
                    }
                }
            }
            XmlEvent::End(ref e) => {
                let local = local_name(e.name().as_ref());
                if local == "Appenders" {
                    in_appenders = false;
                } else if in_appenders && current.is_some() && local != "PatternLayout" && local != "Pattern" {
                    current = None;
                }
            }
            XmlEvent::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(appenders)
}

fn interpolate(value: &str, properties: &HashMap<String, String>) -> String {
    let re = Regex::new(r"\$\{([\w.]+)\}").unwrap();
    let mut result = value.to_string();
    for _ in 0..4 {
        let next = re
            .replace_all(&result, |caps: &regex::Captures| {
                properties.get(&caps[1]).cloned().unwrap_or_else(|| caps[0].to_string())
            })
            .to_string();
        if next == result {
            break;
        }
        result = next;
    }
    result
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_property_interpolation_in_filename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log4j2.xml");
        std::fs::write(
            &path,
            r#"<?xml version="1.0"?>
<Configuration>
  <Properties>
    <Property name="log-path">/var/log</Property>
  </Properties>
  <Appenders>
    <RollingFile name="main" fileName="${log-path}/app.log">
      <PatternLayout pattern="%d{yyyy-MM-dd} %-5p %c - %m%n"/>
    </RollingFile>
  </Appenders>
</Configuration>"#,
        )
        .unwrap();
        let formats = from_xml(&path).unwrap();
        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0].name, "app.log");
    }

    #[test]
    fn console_appender_named_standard_out_maps_to_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log4j2.xml");
        std::fs::write(
            &path,
            r#"<Configuration>
  <Appenders>
    <Console name="standardOut">
      <PatternLayout pattern="%m%n"/>
    </Console>
  </Appenders>
</Configuration>"#,
        )
        .unwrap();
        let formats = from_xml(&path).unwrap();
        assert_eq!(formats[0].name, "stdout");
    }

    #[test]
    fn empty_appenders_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log4j2.xml");
        std::fs::write(&path, "<Configuration><Appenders/></Configuration>").unwrap();
        assert!(from_xml(&path).is_err());
    }
}
