//! Config source download and materialization.
//!
//! # Responsibilities
//! - Map a source URL to a deterministic, filesystem-safe directory
//! - Download the YAML body with a bounded timeout
//! - Write it verbatim as `config.yaml` and parse the fields the core needs
//!
//! # Design Decisions
//! - Every resolve re-downloads; stale bodies are always replaced
//! - Timeouts are reported separately from other transport failures
//! - Old directories are never removed

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{CoreConfig, ResolverConfig};
use crate::sources::error::ResolveError;
use crate::sources::list::{read_sources, SourceSelector};
use crate::sources::summary::CoreConfigSummary;

pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// A config source materialized on disk.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub source: String,
    pub dir: PathBuf,
    pub path: PathBuf,
    pub summary: CoreConfigSummary,
}

/// Resolves config sources into local `config.yaml` files.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    sources_file: PathBuf,
    base_dir: PathBuf,
    timeout: Duration,
    client: reqwest::Client,
}

impl ConfigResolver {
    pub fn new(
        sources_file: impl Into<PathBuf>,
        base_dir: impl Into<PathBuf>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, ResolveError> {
        // The core we manage may be the system proxy; never route our own downloads through it.
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ResolveError::Fetch {
                url: String::new(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            sources_file: sources_file.into(),
            base_dir: base_dir.into(),
            timeout,
            client,
        })
    }

    pub fn from_config(core: &CoreConfig, resolver: &ResolverConfig) -> Result<Self, ResolveError> {
        Self::new(
            &core.sources_file,
            &core.base_dir,
            resolver.fetch_timeout(),
            &resolver.user_agent,
        )
    }

    pub fn sources_file(&self) -> &Path {
        &self.sources_file
    }

    /// Current contents of the sources file.
    pub fn sources(&self) -> Result<Vec<String>, ResolveError> {
        read_sources(&self.sources_file)
    }

    /// Directory a given source URL materializes into.
    pub fn dir_for(&self, url: &str) -> PathBuf {
        self.base_dir.join(dir_name_for(url))
    }

    /// Read the list, pick a URL and download it.
    pub async fn resolve(&self, selector: &SourceSelector) -> Result<ResolvedConfig, ResolveError> {
        let sources = self.sources()?;
        let url = Self::select(&sources, selector)?;
        self.fetch(&url).await
    }

    /// Pick a URL from `sources`; an empty list is always `NoSources`.
    pub fn select(sources: &[String], selector: &SourceSelector) -> Result<String, ResolveError> {
        selector.select(sources)
    }

    /// Download `url` into its directory and parse the result.
    pub async fn fetch(&self, url: &str) -> Result<ResolvedConfig, ResolveError> {
        let dir = self.dir_for(url);
        tokio::fs::create_dir_all(&dir).await?;

        tracing::info!(url = %url, dir = %dir.display(), "Fetching core config");
        let body = self.download(url).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ResolveError::EmptyBody { url: url.to_string() });
        }

        let path = dir.join(CONFIG_FILE_NAME);
        let tmp = dir.join(format!("{}.tmp", CONFIG_FILE_NAME));
        tokio::fs::write(&tmp, &body).await?;
        tokio::fs::rename(&tmp, &path).await?;

        let text = String::from_utf8_lossy(&body);
        let summary = CoreConfigSummary::parse(text.trim_start_matches('\u{feff}'))?;
        tracing::info!(
            path = %path.display(),
            bytes = body.len(),
            proxy_port = summary.proxy_port,
            external_controller = %summary.external_controller,
            proxies = summary.proxy_names.len(),
            "Core config written"
        );

        Ok(ResolvedConfig {
            source: url.to_string(),
            dir,
            path,
            summary,
        })
    }

    /// Raw body bytes; the file on disk is exactly what the source served.
    async fn download(&self, url: &str) -> Result<Vec<u8>, ResolveError> {
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                ResolveError::FetchTimeout {
                    url: url.to_string(),
                    secs: self.timeout.as_secs().max(1),
                }
            } else {
                ResolveError::Fetch {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        };

        let response = self.client.get(url).send().await.map_err(map_err)?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status = %status, "Config source returned non-success status");
            return Err(ResolveError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(map_err)?;
        Ok(body.to_vec())
    }
}

/// URL-safe base64 without padding: only `[A-Za-z0-9_-]`, stable per URL.
pub fn dir_name_for(url: &str) -> String {
    URL_SAFE_NO_PAD.encode(url.as_bytes())
}
