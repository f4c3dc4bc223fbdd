//! Turns a config source on disk (or stdin) into the set of URLs to check.

use anyhow::{Context, Result};
use libendpoint_storm::{extract_from_str, extract_from_value};
use std::{
    collections::BTreeSet,
    fs,
    io::{self, Read},
    path::Path,
};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
    Csv,
    Text,
}

impl Format {
    fn from_path(path: &Path) -> Format {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "json" => Format::Json,
            "yml" | "yaml" => Format::Yaml,
            "csv" => Format::Csv,
            _ => Format::Text,
        }
    }
}

pub fn load_urls(path: &Path) -> Result<BTreeSet<String>> {
    if path.as_os_str() == "-" {
        let mut content = String::new();
        io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read URLs from stdin")?;
        return Ok(extract_from_str(&content));
    }

    let format = Format::from_path(path);
    debug!(path = %path.display(), ?format, "Loading source");

    if format == Format::Csv {
        return match scan_csv(path) {
            Ok(urls) => Ok(urls),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable CSV, scanning as text");
                Ok(extract_from_str(&read(path)?))
            }
        };
    }

    let content = read(path)?;
    let urls = match format {
        Format::Json => match serde_json::from_str(&content) {
            Ok(value) => structured_or_text(extract_from_value(&value), &content),
            Err(e) => {
                debug!(error = %e, "Invalid JSON, scanning as text");
                extract_from_str(&content)
            }
        },
        Format::Yaml => match yaml_to_json(&content) {
            Ok(value) => structured_or_text(extract_from_value(&value), &content),
            Err(e) => {
                debug!(error = %e, "Invalid YAML, scanning as text");
                extract_from_str(&content)
            }
        },
        Format::Csv | Format::Text => extract_from_str(&content),
    };

    Ok(urls)
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn structured_or_text(urls: BTreeSet<String>, content: &str) -> BTreeSet<String> {
    if urls.is_empty() {
        extract_from_str(content)
    } else {
        urls
    }
}

fn yaml_to_json(content: &str) -> Result<serde_json::Value> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    Ok(serde_json::to_value(yaml)?)
}

fn scan_csv(path: &Path) -> Result<BTreeSet<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut urls = BTreeSet::new();
    for record in reader.records() {
        let record = record?;
        for cell in record.iter() {
            urls.extend(extract_from_str(cell));
        }
    }
    Ok(urls)
}
