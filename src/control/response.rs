//! Response envelope shared by every control endpoint.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::sources::ResolveError;
use crate::supervisor::SupervisorError;
use crate::sysproxy::SystemProxyError;

/// `{ success, code, message, data }` body returned by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(code: &str, message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            code: code.to_string(),
            message: message.into(),
            data: Some(data),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Failure carried as an `ApiResponse` with a non-2xx status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", "missing or invalid API key")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            code: self.code.to_string(),
            message: self.message,
            data: None,
        };
        (self.status, Json(body)).into_response()
    }
}

fn resolve_status(err: &ResolveError) -> StatusCode {
    match err {
        ResolveError::NoSources
        | ResolveError::SourceIndexOutOfRange { .. }
        | ResolveError::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
        ResolveError::FetchTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ResolveError::Fetch { .. }
        | ResolveError::HttpStatus { .. }
        | ResolveError::EmptyBody { .. }
        | ResolveError::MalformedYaml(_) => StatusCode::BAD_GATEWAY,
        ResolveError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        Self::new(resolve_status(&err), err.code(), err.to_string())
    }
}

impl From<SupervisorError> for ApiError {
    fn from(err: SupervisorError) -> Self {
        let status = match &err {
            SupervisorError::Resolve(e) => resolve_status(e),
            SupervisorError::NotReady { .. } => StatusCode::GATEWAY_TIMEOUT,
            SupervisorError::ExitedEarly { .. } => StatusCode::BAD_GATEWAY,
            SupervisorError::Spawn { .. }
            | SupervisorError::SystemProxy(_)
            | SupervisorError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<SystemProxyError> for ApiError {
    fn from(err: SystemProxyError) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "system_proxy_failed",
            err.to_string(),
        )
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;
