//! Config resolution errors.

use thiserror::Error;

/// Errors that can occur while selecting or downloading a config source.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The sources file has no URLs.
    #[error("no config sources configured")]
    NoSources,

    #[error("source index {index} out of range ({len} sources configured)")]
    SourceIndexOutOfRange { index: usize, len: usize },

    #[error("invalid config source URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Download did not finish in time. Usually a dead or mistyped URL.
    #[error("timed out after {secs}s fetching {url}; check that the URL is valid")]
    FetchTimeout { url: String, secs: u64 },

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("{url} returned an empty body")]
    EmptyBody { url: String },

    #[error("malformed YAML config: {0}")]
    MalformedYaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolveError {
    /// Stable identifier surfaced through the control API.
    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::NoSources => "no_sources",
            ResolveError::SourceIndexOutOfRange { .. } => "source_out_of_range",
            ResolveError::InvalidUrl { .. } => "invalid_url",
            ResolveError::FetchTimeout { .. } => "fetch_timeout",
            ResolveError::Fetch { .. } => "fetch_failed",
            ResolveError::HttpStatus { .. } => "fetch_status",
            ResolveError::EmptyBody { .. } => "empty_config",
            ResolveError::MalformedYaml(_) => "malformed_config",
            ResolveError::Io(_) => "io_error",
        }
    }
}
