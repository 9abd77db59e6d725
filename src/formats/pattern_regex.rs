//! Translates log4j/log4j2 `%conversion` pattern layouts into a capturing
//! regex. Shared between `log4j` and `log4j2` because both config formats
//! describe their line layout with the same `%c`/`%d{...}`/`%p`/`%m`/`%X{...}`
//! vocabulary.
//!
//! The original derives this by `regexp.QuoteMeta`-ing the whole layout and
//! substituting null-byte-delimited sentinels for each recognized
//! conversion. This port walks the layout left to right instead, escaping
//! each literal run as it is found and appending the conversion's regex
//! fragment in place — same externally observable regex, a plain scan
//! instead of a quote-then-substitute pass.

use std::collections::HashMap;

const DEFAULT_DATE_PATTERN: &str = r"\d{4}-\d{2}-\d{2}[ T]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?";

/// Converts a `%`-conversion layout string (as found in a log4j/log4j2
/// `PatternLayout`) into a regex with named capture groups. `overrides`
/// lets a caller substitute a custom fragment for a named group (used by
/// tests and by config-level custom matchers).
pub fn pattern_to_regex(layout: &str, overrides: &HashMap<String, String>) -> String {
    let chars: Vec<char> = layout.chars().collect();
    let mut out = String::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '%' {
            literal.push(chars[i]);
            i += 1;
            continue;
        }
        match parse_conversion(&chars, i) {
            Some((token, end)) => {
                if let Some(fragment) = fragment_for(&token, overrides) {
                    out.push_str(&regex::escape(&literal));
                    literal.clear();
                    out.push_str(&fragment);
                    i = end;
                    continue;
                }
                // Unrecognized or malformed conversion: treat the consumed
                // text as literal.
                literal.push_str(&token.raw);
                i = end;
            }
            None => {
                literal.push('%');
                i += 1;
            }
        }
    }
    out.push_str(&regex::escape(&literal));
    out
}

struct Conversion {
    raw: String,
    justify_left: bool,
    min_width: Option<usize>,
    word: String,
    modifiers: Vec<String>,
}

fn parse_conversion(chars: &[char], start: usize) -> Option<(Conversion, usize)> {
    let mut i = start + 1; // skip '%'
    let mut raw = String::from("%");

    let justify_left = chars.get(i) == Some(&'-');
    if justify_left {
        raw.push('-');
        i += 1;
    }

    let min_start = i;
    while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        raw.push(chars[i]);
        i += 1;
    }
    let min_width: Option<usize> = chars[min_start..i].iter().collect::<String>().parse().ok();

    if chars.get(i) == Some(&'.') {
        raw.push('.');
        i += 1;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            raw.push(chars[i]);
            i += 1;
        }
    }

    let word_start = i;
    while chars.get(i).is_some_and(|c| c.is_ascii_alphabetic()) {
        raw.push(chars[i]);
        i += 1;
    }
    if i == word_start {
        return None;
    }
    let word: String = chars[word_start..i].iter().collect();

    let mut modifiers = Vec::new();
    loop {
        match chars.get(i) {
            Some('{') | Some('[') => {
                let close = if chars[i] == '{' { '}' } else { ']' };
                if let Some((content, end)) = scan_balanced(chars, i, chars[i], close) {
                    raw.push_str(&chars[i..end].iter().collect::<String>());
                    modifiers.push(content);
                    i = end;
                } else {
                    // Unterminated bracket: stop scanning modifiers here and
                    // let the caller fall back to a default fragment. Do not
                    // consume the unmatched bracket as part of the token.
                    break;
                }
            }
            _ => break,
        }
    }

    Some((
        Conversion {
            raw,
            justify_left,
            min_width,
            word,
            modifiers,
        },
        i,
    ))
}

/// Scans a bracket-balanced region starting at `open_idx` (which must hold
/// `open`), returning the inner text and the index just past the matching
/// `close`. Returns `None` if the string ends before the brackets balance.
fn scan_balanced(chars: &[char], open_idx: usize, open: char, close: char) -> Option<(String, usize)> {
    let mut depth = 0i32;
    let mut i = open_idx;
    let mut content = String::new();
    loop {
        let c = *chars.get(i)?;
        if c == open {
            depth += 1;
            if depth > 1 {
                content.push(c);
            }
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some((content, i + 1));
            }
            content.push(c);
        } else {
            content.push(c);
        }
        i += 1;
    }
}

fn alias(word: &str) -> Option<&'static str> {
    match word {
        "c" | "logger" => Some("logger"),
        "d" | "date" => Some("date"),
        "i" => Some("number"),
        "level" | "p" => Some("level"),
        "m" | "mdc" | "MDC" | "message" | "msg" => Some("message"),
        "n" => Some("n"),
        "t" | "thread" => Some("thread"),
        "X" => Some("X"),
        _ => None,
    }
}

fn fragment_for(token: &Conversion, overrides: &HashMap<String, String>) -> Option<String> {
    let Some(name) = alias(&token.word) else {
        return None;
    };

    if let Some(custom) = overrides.get(name) {
        return Some(custom.clone());
    }

    let fragment = match name {
        "date" => {
            let modifier = token.modifiers.first().map(|s| s.as_str());
            format!("(?P<date>{})", date_fragment(modifier))
        }
        "level" => {
            let capture = r"(?P<level>\w+)";
            match (token.justify_left, token.min_width) {
                (true, _) => format!(r"{capture}\s*"),
                (false, Some(_)) => format!(r"\s*{capture}"),
                (false, None) => capture.to_string(),
            }
        }
        "logger" => r"(?P<logger>\S+)".to_string(),
        "message" => r"(?s)(?P<message>.*)(?-s)".to_string(),
        "n" => r"\n".to_string(),
        "thread" => r"(?P<thread>\S*)".to_string(),
        "number" => r"(?P<number>\d+)".to_string(),
        "X" => {
            let label = token.modifiers.first().map(|s| s.trim()).unwrap_or("");
            if label.is_empty() {
                return None;
            }
            format!("(?P<{}>.*?)", label.to_ascii_lowercase())
        }
        _ => return None,
    };
    Some(fragment)
}

fn date_fragment(modifier: Option<&str>) -> String {
    let Some(modifier) = modifier else {
        return DEFAULT_DATE_PATTERN.to_string();
    };
    let converted = convert_date_format(modifier);
    if converted == regex::escape(modifier) {
        // No recognized date tokens were substituted: this wasn't really a
        // date format string, fall back to the default pattern.
        DEFAULT_DATE_PATTERN.to_string()
    } else {
        converted
    }
}

/// Translates a Java `SimpleDateFormat`-style pattern into a regex,
/// token by token, escaping everything else.
fn convert_date_format(pattern: &str) -> String {
    let replacements: &[(&str, &str)] = &[
        ("yyyy", r"\d{2}\d{2}"),
        ("yy", r"\d{2}"),
        ("MM", r"\d{2}"),
        ("dd", r"\d{2}"),
        ("HH", r"\d{2}"),
        ("mm", r"\d{2}"),
        ("ss", r"\d{2}"),
        ("SSS", r"\d{3}"),
        ("Z", r"[+-]\d{4}"),
    ];

    let mut out = String::new();
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    'outer: while i < chars.len() {
        for (token, repl) in replacements {
            let token_chars: Vec<char> = token.chars().collect();
            if chars[i..].starts_with(&token_chars[..]) {
                out.push_str(repl);
                i += token_chars.len();
                continue 'outer;
            }
        }
        out.push_str(&regex::escape(&chars[i].to_string()));
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(layout: &str) -> String {
        pattern_to_regex(layout, &HashMap::new())
    }

    #[test]
    fn logger_conversion() {
        assert_eq!(convert("%c"), r"(?P<logger>\S+)");
    }

    #[test]
    fn left_justified_level_pads_right() {
        assert_eq!(convert("%-5p"), r"(?P<level>\w+)\s*");
    }

    #[test]
    fn right_justified_level_pads_left() {
        assert_eq!(convert("%5p"), r"\s*(?P<level>\w+)");
    }

    #[test]
    fn x_conversion_uses_modifier_as_group_name() {
        assert_eq!(convert("%X{lorem}"), r"(?P<lorem>.*?)");
    }

    #[test]
    fn two_x_conversions_separated_by_literal_comma() {
        assert_eq!(
            convert("%X{ipsum},%X{loremipsum}"),
            r"(?P<ipsum>.*?),(?P<loremipsum>.*?)"
        );
    }

    #[test]
    fn date_conversion_with_full_modifier() {
        assert_eq!(
            convert("%d{yyyy-MM-dd HH:mm:ss.SSS Z}{UTC}"),
            r"(?P<date>\d{2}\d{2}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3} [+-]\d{4})"
        );
    }

    #[test]
    fn unterminated_date_modifier_falls_back_to_default() {
        assert_eq!(convert("%d{"), format!("(?P<date>{})", DEFAULT_DATE_PATTERN));
        assert_eq!(
            convert("%d{incomplete"),
            format!("(?P<date>{})", DEFAULT_DATE_PATTERN)
        );
    }

    #[test]
    fn bracket_type_without_date_tokens_falls_back_to_default() {
        assert_eq!(convert("%d[test]"), format!("(?P<date>{})", DEFAULT_DATE_PATTERN));
    }

    #[test]
    fn empty_x_modifier_falls_back_to_literal() {
        assert_eq!(convert("%X{}"), regex::escape("%X{}"));
        assert_eq!(convert("%X{"), regex::escape("%X{"));
    }

    #[test]
    fn unknown_alias_stays_literal() {
        assert_eq!(convert("%999"), regex::escape("%999"));
    }

    #[test]
    fn custom_override_replaces_named_group() {
        let mut overrides = HashMap::new();
        overrides.insert("logger".to_string(), r"(?P<logger>custom)".to_string());
        assert_eq!(
            pattern_to_regex("%c", &overrides),
            r"(?P<logger>custom)"
        );
    }
}
