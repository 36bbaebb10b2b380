//! HTTP error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::cache::FetchError;
use crate::registry::HostError;
use crate::render::RenderError;
use crate::viewer::ViewerError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Viewer(#[from] ViewerError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<axum::http::Error> for AppError {
    fn from(e: axum::http::Error) -> Self {
        AppError::Internal(format!("Failed to build response: {}", e))
    }
}

impl From<HostError> for AppError {
    fn from(e: HostError) -> Self {
        AppError::Viewer(ViewerError::Host(e))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Viewer(e) => match e {
                ViewerError::NotOpen | ViewerError::NoDocument | ViewerError::NothingToDownload => {
                    StatusCode::CONFLICT
                }
                ViewerError::OutOfRange(_) | ViewerError::UnknownAttachment(_) => StatusCode::NOT_FOUND,
                ViewerError::Host(HostError::ContextInvalidated)
                | ViewerError::Fetch(FetchError::ContextInvalidated) => StatusCode::GONE,
                ViewerError::Host(HostError::Markup(_)) => StatusCode::BAD_REQUEST,
                ViewerError::Fetch(FetchError::Timeout(_)) | ViewerError::Render(RenderError::Timeout(_)) => {
                    StatusCode::GATEWAY_TIMEOUT
                }
                ViewerError::Fetch(_) => StatusCode::BAD_GATEWAY,
                ViewerError::Render(RenderError::PageNotFound(_)) => StatusCode::NOT_FOUND,
                ViewerError::Render(RenderError::Unsupported(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                ViewerError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Viewer(e) => match e {
                ViewerError::NotOpen => "VIEWER_NOT_OPEN",
                ViewerError::OutOfRange(_) => "OUT_OF_RANGE",
                ViewerError::UnknownAttachment(_) => "UNKNOWN_ATTACHMENT",
                ViewerError::NoDocument => "NO_DOCUMENT",
                ViewerError::NothingToDownload => "NOTHING_TO_DOWNLOAD",
                ViewerError::Host(HostError::ContextInvalidated)
                | ViewerError::Fetch(FetchError::ContextInvalidated) => "CONTEXT_INVALIDATED",
                ViewerError::Host(_) => "HOST_ERROR",
                ViewerError::Fetch(_) => "FETCH_ERROR",
                ViewerError::Render(_) => "RENDER_ERROR",
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            details: cfg!(debug_assertions).then(|| format!("{:?}", self)),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::from(ViewerError::NotOpen).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::from(ViewerError::OutOfRange(4)).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::from(HostError::ContextInvalidated).status_code(), StatusCode::GONE);
        assert_eq!(
            AppError::from(ViewerError::Fetch(FetchError::Network("reset".into()))).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::BadRequest("empty body".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_codes() {
        assert_eq!(AppError::from(HostError::ContextInvalidated).code(), "CONTEXT_INVALIDATED");
        assert_eq!(AppError::from(ViewerError::NothingToDownload).code(), "NOTHING_TO_DOWNLOAD");
    }

    #[test]
    fn test_invalid_response_header_is_internal_error() {
        let built = Response::builder()
            .header("X-Raster-Scale", "bad\nvalue")
            .body(axum::body::Body::empty());
        let err = AppError::from(built.unwrap_err());

        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
