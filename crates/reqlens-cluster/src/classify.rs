//! Endpoint classification: asset / api / page / data / other.

use crate::types::ClusterCategory;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

const ASSET_EXTENSIONS: &[&str] = &[
    ".js", ".mjs", ".cjs", ".css", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".webp", ".avif",
    ".woff", ".woff2", ".ttf", ".eot", ".otf", ".map", ".mp4", ".webm", ".mp3", ".ogg", ".pdf",
];

const ASSET_PATH_MARKERS: &[&str] = &["/static/", "/assets/", "/dist/", "/bundle", "/_next/", "/chunks/"];

fn api_path_regex() -> &'static Regex {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^/(api|graphql|rest|v\d+)(/|$)").unwrap());
    &RE
}

fn is_placeholder(segment: &str) -> bool {
    matches!(segment, "{id}" | "{uuid}" | "{hex}")
}

fn extension_of(segment: &str) -> Option<String> {
    let dot = segment.rfind('.')?;
    if dot == 0 || dot == segment.len() - 1 {
        return None;
    }
    Some(segment[dot..].to_ascii_lowercase())
}

fn is_binary_content_type(ct: &str) -> bool {
    ct.starts_with("image/")
        || ct.starts_with("audio/")
        || ct.starts_with("video/")
        || ct.starts_with("font/")
        || matches!(ct, "application/octet-stream" | "application/pdf" | "application/wasm" | "application/zip")
}

fn is_structured_data_content_type(ct: &str) -> bool {
    ct.contains("json") || ct.contains("xml") || ct.contains("yaml")
}

/// Dominant content type by max count; ties broken arbitrarily by iteration
/// order. `None` if the histogram is empty.
pub fn dominant_content_type(hist: &HashMap<String, usize>) -> Option<String> {
    hist.iter().max_by_key(|(_, count)| **count).map(|(ct, _)| ct.clone())
}

pub fn classify(path_template: &str, content_type_hist: &HashMap<String, usize>) -> ClusterCategory {
    let last_segment = path_template.rsplit('/').next().unwrap_or("");
    if !last_segment.is_empty() && !is_placeholder(last_segment) {
        if let Some(ext) = extension_of(last_segment) {
            if ASSET_EXTENSIONS.contains(&ext.as_str()) {
                return ClusterCategory::Asset;
            }
        }
    }

    if let Some(dominant) = dominant_content_type(content_type_hist) {
        if is_binary_content_type(&dominant) || dominant.contains("javascript") || dominant.contains("css") {
            return ClusterCategory::Asset;
        }
        if is_structured_data_content_type(&dominant) {
            return ClusterCategory::Api;
        }
        if dominant.contains("html") {
            return ClusterCategory::Page;
        }
        if dominant.contains("csv") || dominant.contains("x-www-form-urlencoded") {
            return ClusterCategory::Data;
        }
    }

    if api_path_regex().is_match(path_template) {
        return ClusterCategory::Api;
    }
    if ASSET_PATH_MARKERS.iter().any(|marker| path_template.contains(marker)) {
        return ClusterCategory::Asset;
    }

    ClusterCategory::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hist(pairs: &[(&str, usize)]) -> HashMap<String, usize> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn asset_extension_wins_even_with_json_histogram() {
        let category = classify("/assets/app.js", &hist(&[("application/json", 5)]));
        assert_eq!(category, ClusterCategory::Asset);
    }

    #[test]
    fn placeholder_last_segment_is_not_an_extension() {
        let category = classify("/users/{id}", &hist(&[("application/json", 5)]));
        assert_eq!(category, ClusterCategory::Api);
    }

    #[test]
    fn dominant_json_is_api() {
        let category = classify("/widgets", &hist(&[("application/json", 3), ("text/plain", 1)]));
        assert_eq!(category, ClusterCategory::Api);
    }

    #[test]
    fn dominant_html_is_page() {
        let category = classify("/dashboard", &hist(&[("text/html", 3)]));
        assert_eq!(category, ClusterCategory::Page);
    }

    #[test]
    fn dominant_csv_is_data() {
        let category = classify("/export", &hist(&[("text/csv", 2)]));
        assert_eq!(category, ClusterCategory::Data);
    }

    #[test]
    fn api_prefixed_path_without_histogram_is_api() {
        let category = classify("/api/widgets", &HashMap::new());
        assert_eq!(category, ClusterCategory::Api);
    }

    #[test]
    fn versioned_path_prefix_is_api() {
        let category = classify("/v2/widgets", &HashMap::new());
        assert_eq!(category, ClusterCategory::Api);
    }

    #[test]
    fn static_marker_without_histogram_is_asset() {
        let category = classify("/static/app.bin", &HashMap::new());
        assert_eq!(category, ClusterCategory::Asset);
    }

    #[test]
    fn unclassified_path_is_other() {
        let category = classify("/healthz", &HashMap::new());
        assert_eq!(category, ClusterCategory::Other);
    }
}
