//! Pure, stateless tokenization and path-normalization functions (component C1).
//!
//! Nothing here touches the indexer or the entry cache — these are plain string
//! transforms so they can be fuzzed and property-tested in isolation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use url::Url;

const DELIMITERS: &[char] = &['/', '?', '&', '=', '.', '-', '_', ':', ';', ',', '@'];
const MIN_TOKEN_LEN: usize = 2;

/// Split `s` into lowercase tokens on the fixed delimiter set and whitespace,
/// dropping anything shorter than 2 characters.
pub fn tokenize(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| DELIMITERS.contains(&c) || c.is_whitespace())
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(|t| t.to_string())
        .collect()
}

/// Tokenize a URL: host, path, and all query keys/non-empty values, joined and
/// tokenized. Tolerates relative URLs (no scheme/host) by falling back to a
/// manual path/query split.
pub fn tokenize_url(u: &str) -> Vec<String> {
    let mut joined = String::new();

    if let Ok(parsed) = Url::parse(u) {
        if let Some(host) = parsed.host_str() {
            joined.push_str(host);
            joined.push(' ');
        }
        joined.push_str(parsed.path());
        joined.push(' ');
        for (k, v) in parsed.query_pairs() {
            joined.push_str(&k);
            joined.push(' ');
            if !v.is_empty() {
                joined.push_str(&v);
                joined.push(' ');
            }
        }
    } else {
        let (path, query) = match u.split_once('?') {
            Some((p, q)) => (p, q),
            None => (u, ""),
        };
        joined.push_str(path);
        joined.push(' ');
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let mut it = pair.splitn(2, '=');
            if let Some(k) = it.next() {
                joined.push_str(k);
                joined.push(' ');
            }
            if let Some(v) = it.next() {
                if !v.is_empty() {
                    joined.push_str(v);
                    joined.push(' ');
                }
            }
        }
    }

    tokenize(&joined)
}

/// Tokenize a set of header (name, value) pairs via the synthetic
/// `"<name>: <value>"` string per pair.
pub fn tokenize_headers(pairs: &[(String, String)]) -> Vec<String> {
    let joined = pairs
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join(" ");
    tokenize(&joined)
}

/// Content-type-aware body tokenization. `bytes` is truncated to `max` before
/// any parsing is attempted. Unrecognized content types yield no tokens.
pub fn tokenize_body(content_type: &str, bytes: &[u8], max: usize) -> Vec<String> {
    let truncated = &bytes[..bytes.len().min(max)];
    let ct = content_type.to_ascii_lowercase();

    if ct.contains("application/json") {
        return tokenize_json_bytes(truncated);
    }
    if ct.contains("text/html") || ct.contains("text/xml") || ct.contains("application/xml") {
        let text = String::from_utf8_lossy(truncated);
        let stripped = tag_regex().replace_all(&text, " ");
        return tokenize(&stripped);
    }
    if ct.contains("text/plain") || ct.contains("text/csv") {
        let text = String::from_utf8_lossy(truncated);
        return tokenize(&text);
    }
    if ct.contains("application/x-www-form-urlencoded") {
        let text = String::from_utf8_lossy(truncated);
        let mut joined = String::new();
        for pair in text.split('&').filter(|p| !p.is_empty()) {
            let mut it = pair.splitn(2, '=');
            if let Some(k) = it.next() {
                joined.push_str(k);
                joined.push(' ');
            }
            if let Some(v) = it.next() {
                if !v.is_empty() {
                    joined.push_str(v);
                    joined.push(' ');
                }
            }
        }
        return tokenize(&joined);
    }

    Vec::new()
}

fn tokenize_json_bytes(bytes: &[u8]) -> Vec<String> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => {
            let mut out = String::new();
            collect_json_strings(&value, &mut out);
            tokenize(&out)
        }
        Err(_) => tokenize(&String::from_utf8_lossy(bytes)),
    }
}

/// Recursively collect object keys and string leaf values from a JSON value.
fn collect_json_strings(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                out.push_str(k);
                out.push(' ');
                collect_json_strings(v, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_json_strings(item, out);
            }
        }
        Value::String(s) => {
            out.push_str(s);
            out.push(' ');
        }
        _ => {}
    }
}

fn tag_regex() -> &'static Regex {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
    &RE
}

fn uuid_regex() -> &'static Regex {
    static RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
    });
    &RE
}

/// Normalize one path segment: UUID → `{uuid}`, pure decimal digits → `{id}`,
/// lowercase hex of 8+ chars → `{hex}`. Checked in that order.
pub fn normalize_path_segment(seg: &str) -> String {
    if uuid_regex().is_match(seg) {
        return "{uuid}".to_string();
    }
    if !seg.is_empty() && seg.chars().all(|c| c.is_ascii_digit()) {
        return "{id}".to_string();
    }
    if seg.len() >= 8
        && seg.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        && seg.chars().any(|c| c.is_ascii_alphabetic())
    {
        return "{hex}".to_string();
    }
    seg.to_string()
}

/// Normalize a full path: split on `/`, normalize each non-empty segment,
/// rejoin. Idempotent: re-normalizing a normalized path is a no-op because
/// `{id}`/`{uuid}`/`{hex}` never match any of the three placeholder rules.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            if seg.is_empty() {
                seg.to_string()
            } else {
                normalize_path_segment(seg)
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_splits() {
        let tokens = tokenize("Hello/World?Foo=Bar");
        assert_eq!(tokens, vec!["hello", "world", "foo", "bar"]);
    }

    #[test]
    fn tokenize_drops_short_tokens() {
        let tokens = tokenize("a bb c dd");
        assert_eq!(tokens, vec!["bb", "dd"]);
    }

    #[test]
    fn tokenize_url_includes_host_path_and_query() {
        let tokens = tokenize_url("https://api.example.com/users/42?active=true&q=");
        assert!(tokens.contains(&"api".to_string()));
        assert!(tokens.contains(&"example".to_string()));
        assert!(tokens.contains(&"users".to_string()));
        assert!(tokens.contains(&"active".to_string()));
        assert!(tokens.contains(&"true".to_string()));
        // the `q` key name is tokenized, but its empty value contributes nothing
        assert!(!tokens.contains(&"".to_string()));
    }

    #[test]
    fn tokenize_url_handles_relative_path() {
        let tokens = tokenize_url("/api/widgets?name=foo");
        assert!(tokens.contains(&"api".to_string()));
        assert!(tokens.contains(&"widgets".to_string()));
        assert!(tokens.contains(&"name".to_string()));
        assert!(tokens.contains(&"foo".to_string()));
    }

    #[test]
    fn tokenize_headers_joins_name_and_value() {
        let pairs = vec![("Authorization".to_string(), "Bearer secret-token".to_string())];
        let tokens = tokenize_headers(&pairs);
        assert!(tokens.contains(&"authorization".to_string()));
        assert!(tokens.contains(&"bearer".to_string()));
        assert!(tokens.contains(&"secret".to_string()));
        assert!(tokens.contains(&"token".to_string()));
    }

    #[test]
    fn tokenize_body_json_collects_keys_and_string_values() {
        let body = br#"{"name": "Ada Lovelace", "count": 3, "tags": ["alpha", "beta"]}"#;
        let tokens = tokenize_body("application/json; charset=utf-8", body, 4096);
        assert!(tokens.contains(&"name".to_string()));
        assert!(tokens.contains(&"ada".to_string()));
        assert!(tokens.contains(&"lovelace".to_string()));
        assert!(tokens.contains(&"tags".to_string()));
        assert!(tokens.contains(&"alpha".to_string()));
        // the "count" key itself is emitted (keys are always collected); only
        // its numeric leaf value is not
        assert!(tokens.contains(&"count".to_string()));
    }

    #[test]
    fn tokenize_body_json_falls_back_on_parse_error() {
        let body = b"not actually json but has words";
        let tokens = tokenize_body("application/json", body, 4096);
        assert!(tokens.contains(&"words".to_string()));
    }

    #[test]
    fn tokenize_body_html_strips_tags() {
        let body = b"<html><body><h1>Hello World</h1></body></html>";
        let tokens = tokenize_body("text/html; charset=utf-8", body, 4096);
        assert!(tokens.contains(&"hello".to_string()));
        assert!(tokens.contains(&"world".to_string()));
    }

    #[test]
    fn tokenize_body_form_urlencoded_collects_keys_and_values() {
        let body = b"name=Ada&empty=&city=Paris";
        let tokens = tokenize_body("application/x-www-form-urlencoded", body, 4096);
        assert!(tokens.contains(&"name".to_string()));
        assert!(tokens.contains(&"ada".to_string()));
        assert!(tokens.contains(&"city".to_string()));
        assert!(tokens.contains(&"paris".to_string()));
    }

    #[test]
    fn tokenize_body_unknown_content_type_is_empty() {
        let body = b"\x00\x01\x02binary";
        let tokens = tokenize_body("application/octet-stream", body, 4096);
        assert!(tokens.is_empty());
    }

    #[test]
    fn tokenize_body_respects_max_bytes() {
        let body = b"aaaaaaaaaa needle";
        let tokens = tokenize_body("text/plain", body, 5);
        assert!(!tokens.iter().any(|t| t == "needle"));
    }

    #[test]
    fn normalize_path_segment_uuid() {
        assert_eq!(
            normalize_path_segment("550e8400-e29b-41d4-a716-446655440000"),
            "{uuid}"
        );
    }

    #[test]
    fn normalize_path_segment_decimal_id() {
        assert_eq!(normalize_path_segment("12345"), "{id}");
    }

    #[test]
    fn normalize_path_segment_hex() {
        assert_eq!(normalize_path_segment("deadbeef"), "{hex}");
        assert_eq!(normalize_path_segment("deadbeef12"), "{hex}");
    }

    #[test]
    fn normalize_path_segment_uppercase_hex_is_not_hex() {
        // must be lowercase to qualify as the hex template
        assert_eq!(normalize_path_segment("DEADBEEF"), "DEADBEEF");
    }

    #[test]
    fn normalize_path_segment_short_hex_like_is_untouched() {
        assert_eq!(normalize_path_segment("ab12"), "ab12");
    }

    #[test]
    fn normalize_path_preserves_static_segments() {
        assert_eq!(normalize_path("/api/users/123"), "/api/users/{id}");
        assert_eq!(
            normalize_path("/api/users/550e8400-e29b-41d4-a716-446655440000/profile"),
            "/api/users/{uuid}/profile"
        );
    }

    #[test]
    fn normalize_path_is_idempotent() {
        let p = "/api/users/123/550e8400-e29b-41d4-a716-446655440000/deadbeef12cafe";
        let once = normalize_path(p);
        let twice = normalize_path(&once);
        assert_eq!(once, twice);
    }
}
