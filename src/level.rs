//! Log-level extraction from an entry's text.
//!
//! Mirrors `getLevel` from the original agent: a JSON object carrying a
//! `"sev"` field wins outright; otherwise the leftmost occurrence of a
//! known level keyword in the raw text is used. `warning` normalizes to
//! `warn`; everything is lowercased.

const KEYWORDS: &[&str] = &["TRACE", "DEBUG", "INFO", "WARN", "WARNING", "ERROR", "FATAL"];

/// Returns the extracted level, lowercased, or an empty string if none is
/// found.
pub fn extract_level(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        if let Some(sev) = extract_sev_field(text) {
            return sev;
        }
    }

    let mut best: Option<(usize, &str)> = None;
    for kw in KEYWORDS {
        if let Some(idx) = text.find(kw) {
            if best.map(|(b, _)| idx < b).unwrap_or(true) {
                best = Some((idx, kw));
            }
        }
    }

    match best {
        Some((_, kw)) => normalize(kw),
        None => String::new(),
    }
}

fn normalize(kw: &str) -> String {
    let lower = kw.to_ascii_lowercase();
    if lower == "warning" {
        "warn".to_string()
    } else {
        lower
    }
}

/// Looks for a top-level `"sev":"X"` field without doing a full JSON parse,
/// matching the original's cheap `strings.Split` approach: find `"sev":"`,
/// take everything up to the next `"`.
fn extract_sev_field(text: &str) -> Option<String> {
    let marker = "\"sev\":\"";
    let start = text.find(marker)? + marker.len();
    let rest = &text[start..];
    let end = rest.find('"')?;
    let value = &rest[..end];
    if value.is_empty() {
        return None;
    }
    Some(normalize(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sev_field_wins() {
        assert_eq!(extract_level(r#"{"sev":"warn","msg":"x"}"#), "warn");
    }

    #[test]
    fn leftmost_keyword_wins() {
        assert_eq!(extract_level("2024 INFO something ERROR else"), "info");
    }

    #[test]
    fn warning_normalizes_to_warn() {
        assert_eq!(extract_level("a WARNING occurred"), "warn");
    }

    #[test]
    fn no_match_is_empty() {
        assert_eq!(extract_level("just some text"), "");
    }

    #[test]
    fn sev_field_case_preserved_then_lowercased() {
        assert_eq!(extract_level(r#"{"sev":"ERROR"}"#), "error");
    }

    #[test]
    fn sev_looking_substring_in_plain_text_is_ignored() {
        let text = r#"caused by embedded doc "sev":"warn" in a stack trace ERROR"#;
        assert_eq!(extract_level(text), "error");
    }
}
