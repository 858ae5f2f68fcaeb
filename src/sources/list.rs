//! Candidate config-source list.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::sources::error::ResolveError;

/// Parse one URL per line; surrounding whitespace is trimmed, blank lines dropped.
pub fn parse_sources(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn read_sources(path: &Path) -> Result<Vec<String>, ResolveError> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_sources(&text))
}

/// How `start` picks a config source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSelector {
    /// First entry of the list.
    #[default]
    First,
    /// Zero-based position in the list.
    Index(usize),
    /// Explicit URL.
    Url(String),
}

impl SourceSelector {
    pub fn select(&self, sources: &[String]) -> Result<String, ResolveError> {
        if sources.is_empty() {
            return Err(ResolveError::NoSources);
        }
        let url = match self {
            SourceSelector::First => sources[0].clone(),
            SourceSelector::Index(index) => sources
                .get(*index)
                .cloned()
                .ok_or(ResolveError::SourceIndexOutOfRange {
                    index: *index,
                    len: sources.len(),
                })?,
            SourceSelector::Url(url) => {
                let url = url.trim().to_string();
                if !sources.contains(&url) {
                    tracing::debug!(url = %url, "Selected URL is not in the sources file");
                }
                url
            }
        };
        validate_url(&url)?;
        Ok(url)
    }
}

fn validate_url(raw: &str) -> Result<(), ResolveError> {
    let invalid = |reason: String| ResolveError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };
    let parsed = url::Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}
