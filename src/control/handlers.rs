use axum::{
    body::Bytes,
    extract::State,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::control::response::{ApiError, ApiResponse, ApiResult};
use crate::sources::SourceSelector;
use crate::supervisor::{CoreStatus, StartOutcome, StopOutcome, Supervisor};
use crate::sysproxy::SystemProxyState;

/// Shared state for control handlers.
#[derive(Clone)]
pub struct ControlState {
    pub supervisor: Supervisor,
    pub api_key: Arc<str>,
}

/// Body of `/core/start` and `/core/restart`. Both fields absent means the first source.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub index: Option<usize>,
}

impl StartRequest {
    pub fn into_selector(self) -> Result<SourceSelector, ApiError> {
        match (self.url, self.index) {
            (Some(_), Some(_)) => Err(ApiError::bad_request("specify either url or index, not both")),
            (Some(url), None) => Ok(SourceSelector::Url(url)),
            (None, Some(index)) => Ok(SourceSelector::Index(index)),
            (None, None) => Ok(SourceSelector::First),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AutoRestartRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SourcesList {
    pub file: String,
    pub sources: Vec<String>,
}

/// Empty bodies are accepted so `curl -X POST` works without `-d`.
fn parse_selector(body: &Bytes) -> Result<SourceSelector, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SourceSelector::First);
    }
    let request: StartRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("invalid start request: {}", e)))?;
    request.into_selector()
}

fn start_response(outcome: StartOutcome) -> ApiResponse<StartOutcome> {
    match &outcome {
        StartOutcome::Started { source, .. } => {
            let message = format!("core started with {}", source);
            ApiResponse::ok("started", message, outcome)
        }
        StartOutcome::AlreadyRunning { source, .. } => {
            let message = format!("core already running with {}", source);
            ApiResponse::ok("already_running", message, outcome)
        }
    }
}

pub async fn start_core(State(state): State<ControlState>, body: Bytes) -> ApiResult<StartOutcome> {
    let selector = parse_selector(&body)?;
    tracing::info!(selector = ?selector, "Start requested");
    let outcome = state.supervisor.start(selector).await?;
    Ok(start_response(outcome))
}

pub async fn restart_core(State(state): State<ControlState>, body: Bytes) -> ApiResult<StartOutcome> {
    let selector = parse_selector(&body)?;
    tracing::info!(selector = ?selector, "Restart requested");
    let outcome = state.supervisor.restart(selector).await?;
    Ok(start_response(outcome))
}

pub async fn stop_core(State(state): State<ControlState>) -> ApiResult<StopOutcome> {
    tracing::info!("Stop requested");
    let outcome = state.supervisor.stop().await?;
    Ok(match outcome {
        StopOutcome::Stopped { .. } => ApiResponse::ok("stopped", "core stopped", outcome),
        StopOutcome::NotRunning => ApiResponse::ok("not_running", "core was not running", outcome),
    })
}

pub async fn get_status(State(state): State<ControlState>) -> ApiResponse<CoreStatus> {
    let status = state.supervisor.status();
    ApiResponse::ok("ok", status.state.as_str(), status)
}

pub async fn set_auto_restart(
    State(state): State<ControlState>,
    Json(request): Json<AutoRestartRequest>,
) -> ApiResponse<AutoRestartRequest> {
    state.supervisor.set_auto_restart(request.enabled);
    let message = if request.enabled {
        "auto-restart enabled"
    } else {
        "auto-restart disabled"
    };
    ApiResponse::ok("ok", message, request)
}

pub async fn list_sources(State(state): State<ControlState>) -> ApiResult<SourcesList> {
    let resolver = state.supervisor.resolver();
    let sources = resolver.sources()?;
    let message = format!("{} sources configured", sources.len());
    Ok(ApiResponse::ok(
        "ok",
        message,
        SourcesList {
            file: resolver.sources_file().display().to_string(),
            sources,
        },
    ))
}

pub async fn get_system_proxy(State(state): State<ControlState>) -> ApiResult<SystemProxyState> {
    match state.supervisor.system_proxy_state().await {
        Some(current) => Ok(ApiResponse::ok("ok", "system proxy state", current?)),
        None => Err(ApiError::new(
            axum::http::StatusCode::CONFLICT,
            "system_proxy_disabled",
            "system proxy management is disabled",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_selects_first_source() {
        assert_eq!(parse_selector(&Bytes::new()).unwrap(), SourceSelector::First);
        assert_eq!(parse_selector(&Bytes::from_static(b" \n")).unwrap(), SourceSelector::First);
    }

    #[test]
    fn test_body_selects_index_or_url() {
        let selector = parse_selector(&Bytes::from_static(br#"{"index": 2}"#)).unwrap();
        assert_eq!(selector, SourceSelector::Index(2));

        let selector = parse_selector(&Bytes::from_static(br#"{"url": "https://sub.example/a"}"#)).unwrap();
        assert_eq!(selector, SourceSelector::Url("https://sub.example/a".into()));
    }

    #[test]
    fn test_url_and_index_together_rejected() {
        let err = parse_selector(&Bytes::from_static(br#"{"url": "https://a", "index": 0}"#)).unwrap_err();
        assert_eq!(err.code, "invalid_request");

        let err = parse_selector(&Bytes::from_static(b"not json")).unwrap_err();
        assert_eq!(err.code, "invalid_request");
    }
}
