//! URL discovery in free text and decoded config values.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;

lazy_static! {
    static ref URL_PATTERN: Regex = Regex::new(concat!(
        r"(?i)https?://",
        r"(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+[A-Z]{2,63}\.?",
        r"|localhost",
        r"|\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})",
        r"(?::\d+)?",
        r#"(?:/?|[/?][^\s"'<>]+)"#,
        r#"(?:[\s"'<>,]|$)"#,
    ))
    .expect("URL pattern must compile");
}

const TRAILING_JUNK: &[char] = &[',', '"', '\'', '<', '>'];

/// Extracts URLs from a blob of text.
///
/// Text that is a JSON array as a whole is decoded and its `http` strings are
/// taken as-is. Anything else is scanned with the URL pattern after stripping
/// the quote and bracket noise that spreadsheet exports leave behind.
pub fn extract_from_str(text: &str) -> BTreeSet<String> {
    retain_http(scan_str(text))
}

/// Walks a decoded document and extracts URLs from every string in it,
/// whatever key or position it sits at.
pub fn extract_from_value(value: &Value) -> BTreeSet<String> {
    let mut urls = BTreeSet::new();
    collect_value(value, &mut urls);
    retain_http(urls)
}

/// Keeps only `http://` and `https://` URLs, lower-casing the scheme.
pub fn retain_http(urls: BTreeSet<String>) -> BTreeSet<String> {
    urls.into_iter()
        .filter_map(|url| {
            let scheme_len = url.find("://")?;
            let scheme = url[..scheme_len].to_ascii_lowercase();
            if scheme == "http" || scheme == "https" {
                Some(format!("{}{}", scheme, &url[scheme_len..]))
            } else {
                None
            }
        })
        .collect()
}

fn collect_value(value: &Value, urls: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => urls.extend(scan_str(s)),
        Value::Array(items) => items.iter().for_each(|item| collect_value(item, urls)),
        Value::Object(map) => map.values().for_each(|item| collect_value(item, urls)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn scan_str(text: &str) -> BTreeSet<String> {
    let text = text.trim();

    if text.starts_with('[') && text.ends_with(']') {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(text) {
            return items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| s.starts_with("http"))
                .map(|s| s.trim().to_string())
                .collect();
        }
    }

    let cleaned = clean_csv_noise(text);

    URL_PATTERN
        .find_iter(&cleaned)
        .map(|m| {
            m.as_str()
                .trim()
                .trim_end_matches(TRAILING_JUNK)
                .trim()
                .to_string()
        })
        .filter(|url| !url.is_empty())
        .collect()
}

fn clean_csv_noise(text: &str) -> String {
    text.replace("\"\"", "\"")
        .replace("],[", " ")
        .replace(['[', ']'], "")
        .replace("\",\"", " ")
        .replace("\",", " ")
        .replace(",\"", " ")
}
