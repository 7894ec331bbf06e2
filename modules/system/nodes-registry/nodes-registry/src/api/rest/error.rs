use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use poolkit::PluginError;
use serde::Serialize;

use crate::domain::error::DomainError;

pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

pub type ApiResult<T> = Result<T, Problem>;

/// RFC 9457 problem body returned by every failing route.
#[derive(Debug, Clone, Serialize)]
pub struct Problem {
    #[serde(skip)]
    pub status: StatusCode,
    #[serde(rename = "status")]
    pub status_code: u16,
    pub title: String,
    pub detail: String,
    pub code: String,
}

impl Problem {
    #[must_use]
    pub fn new(status: StatusCode, title: &str, code: &str, detail: impl Into<String>) -> Self {
        Self {
            status,
            status_code: status.as_u16(),
            title: title.to_owned(),
            detail: detail.into(),
            code: code.to_owned(),
        }
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status = self.status;
        let mut resp = axum::Json(self).into_response();
        *resp.status_mut() = status;
        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_PROBLEM_JSON),
        );
        resp
    }
}

/// Map domain errors to HTTP problem responses
impl From<DomainError> for Problem {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NodeNotFound(id) => Self::new(
                StatusCode::NOT_FOUND,
                "Node not found",
                "NODE_NOT_FOUND",
                format!("No node with id {id}"),
            ),
            DomainError::InvalidInput(msg) => {
                Self::new(StatusCode::BAD_REQUEST, "Validation error", "VALIDATION_ERROR", msg)
            }
            DomainError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal registry error");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    "INTERNAL_ERROR",
                    "An internal error occurred",
                )
            }
        }
    }
}

/// Request filter rejections.
impl From<PluginError> for Problem {
    fn from(err: PluginError) -> Self {
        match err {
            PluginError::Unauthorized(msg) => {
                Self::new(StatusCode::UNAUTHORIZED, "Unauthorized", "UNAUTHORIZED", msg)
            }
            PluginError::Forbidden(msg) | PluginError::Rejected(msg) => {
                Self::new(StatusCode::FORBIDDEN, "Forbidden", "FORBIDDEN", msg)
            }
            other => {
                tracing::error!(error = %other, "Request filter failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    "INTERNAL_ERROR",
                    "An internal error occurred",
                )
            }
        }
    }
}
