//! httpd/Apache `.conf` parsing: `Define`, `LogFormat`, `CustomLog`, and
//! `ErrorLog` directives, translated via a fixed literal-substring-to-regex
//! table rather than a general `%conversion` parser — httpd log format
//! strings in practice use a small, closed vocabulary of tokens, so the
//! original maps them directly instead of writing a second general parser.

use std::collections::HashMap;
use std::path::Path;

use crate::error::FormatError;

/// Fixed substring -> regex fragment table, checked longest-first so a
/// multi-token sequence like the timestamp pair is matched before any of
/// its components could be matched individually.
fn conversion_table() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            r"%{%Y-%m-%dT%X}t.%{msec_frac}t",
            r"(?P<timestamp>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d+)",
        ),
        (r"%{%z}t", r"(?P<timezone>[+-]\d{4})"),
        (r"%{X-Forwarded-For}i", r"(?P<xff>\S+)"),
        (r"%{Content-Length}i", r"(?P<content_length>\S+)"),
        (r"%{UNIQUE_ID}e", r"(?P<unique_id>\S+)"),
        (r"%{X-Tableau-Trace-Id}i", r"(?P<tableau_trace_id>\S+)"),
        ("tableau_error_source", r"(?P<tableau_error_source>\S+)"),
        ("tableau_status_code", r"(?P<tableau_status_code>\S+)"),
        ("tableau_error_code", r"(?P<tableau_error_code>\S+)"),
        ("tableau_service_name", r"(?P<tableau_service_name>\S+)"),
        ("%V", r"(?P<requested_hostname>\S+)"),
        ("%h", r"(?P<remote_hostname>\S+)"),
        ("%u", r"(?P<remote_user>\S+)"),
        ("%p", r"(?P<request_port>\d+)"),
        ("%r", r"(?P<request>[^\"]*)"),
        ("%>s", r"(?P<status>\d+)"),
        ("%b", r"(?P<bytes>\S+)"),
        ("%D", r"(?P<ms>\d+)"),
    ]
}

/// Returns the regex derived from each `LogFormat` directive in `path`.
/// These are generic formats (matched by regex against a file's first
/// line), not named ones — an httpd config has no per-appender file
/// association the way log4j2 does, so there is no basename/appender-name
/// to key a `NamedFormat` on.
pub fn from_conf(path: &Path) -> Result<Vec<String>, FormatError> {
    let raw = std::fs::read_to_string(path).map_err(|source| FormatError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let tokens = lex(&raw);
    let mut defines: HashMap<String, String> = HashMap::new();
    let mut formats: Vec<String> = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].as_str() {
            "Define" if i + 2 < tokens.len() => {
                defines.insert(tokens[i + 1].clone(), tokens[i + 2].clone());
                i += 3;
            }
            "LogFormat" if i + 2 < tokens.len() => {
                let value = resolve(&tokens[i + 1], &defines);
                formats.push(translate(&value));
                i += 3;
            }
            _ => i += 1,
        }
    }

    if formats.is_empty() {
        return Err(FormatError::InvalidConfig(path.to_path_buf()));
    }
    Ok(formats)
}

fn resolve(value: &str, defines: &HashMap<String, String>) -> String {
    let re = regex::Regex::new(r"\$\{([\w.]+)\}").unwrap();
    re.replace_all(value, |caps: &regex::Captures| {
        defines.get(&caps[1]).cloned().unwrap_or_else(|| caps[0].to_string())
    })
    .to_string()
}

/// Translates an httpd log format string using the fixed conversion table,
/// escaping any text that isn't one of the known tokens.
fn translate(template: &str) -> String {
    let table = conversion_table();
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::new();
    let mut literal = String::new();
    let mut i = 0;

    'outer: while i < chars.len() {
        for (token, fragment) in &table {
            let token_chars: Vec<char> = token.chars().collect();
            if chars[i..].starts_with(&token_chars[..]) {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(fragment);
                i += token_chars.len();
                continue 'outer;
            }
        }
        literal.push(chars[i]);
        i += 1;
    }
    out.push_str(&regex::escape(&literal));
    out
}

/// Minimal lexer: splits on whitespace, treating `"..."` as a single
/// quoted token (escape-aware) and stripping the surrounding quotes.
fn lex(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '#' {
            while let Some(&c) = chars.peek() {
                if c == '\n' {
                    break;
                }
                chars.next();
            }
            continue;
        }
        if c == '"' {
            chars.next();
            let mut token = String::new();
            while let Some(&c) = chars.peek() {
                chars.next();
                if c == '\\' {
                    if let Some(&next) = chars.peek() {
                        token.push(next);
                        chars.next();
                    }
                    continue;
                }
                if c == '"' {
                    break;
                }
                token.push(c);
            }
            tokens.push(token);
            continue;
        }
        let mut token = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            token.push(c);
            chars.next();
        }
        tokens.push(token);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexer_handles_quoted_values() {
        let tokens = lex(r#"LogFormat "%h %u \"%r\"" gateway"#);
        assert_eq!(tokens, vec!["LogFormat", r#"%h %u "%r""#, "gateway"]);
    }

    #[test]
    fn define_is_substituted_into_logformat() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("httpd.conf");
        std::fs::write(
            &path,
            r#"Define ANNOTATED_HTTP_CODES abc
LogFormat "%h %u %>s" gateway
"#,
        )
        .unwrap();
        let formats = from_conf(&path).unwrap();
        assert_eq!(formats.len(), 1);
        assert!(formats[0].contains("remote_hostname"));
        assert!(formats[0].contains("status"));
    }

    #[test]
    fn timestamp_pair_matched_before_components() {
        let regex = translate(r"%{%Y-%m-%dT%X}t.%{msec_frac}t");
        assert!(regex.contains("timestamp"));
        assert!(!regex.contains("timezone"));
    }

    #[test]
    fn empty_conf_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("httpd.conf");
        std::fs::write(&path, "# nothing here\n").unwrap();
        assert!(from_conf(&path).is_err());
    }
}
