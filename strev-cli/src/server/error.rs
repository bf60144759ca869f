use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use platforms_parser::enrichment::EnrichmentError;
use platforms_parser::extractor::{ErrorKind, ExtractorError};
use platforms_parser::gateway::GatewayError;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

/// Error returned by every handler, rendered as `{error, detail?}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    detail: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn from_kind(kind: ErrorKind, detail: String) -> Self {
        let error = match kind {
            ErrorKind::MalformedInput => Self::bad_request("invalid request"),
            ErrorKind::NotFound => Self::not_found("not found upstream"),
            ErrorKind::RateLimited => Self::bad_gateway("upstream rate limit exceeded"),
            ErrorKind::UpstreamUnavailable => Self::bad_gateway("upstream unavailable"),
            ErrorKind::UpstreamRejected => Self::bad_gateway("upstream rejected the request"),
            ErrorKind::ExtractionFailure => Self::bad_gateway("upstream returned unusable data"),
        };
        error.with_detail(detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(
                status = %self.status,
                error = %self.message,
                detail = ?self.detail,
                "Request failed"
            );
        }
        let body = ErrorBody {
            error: self.message,
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ExtractorError> for ApiError {
    fn from(e: ExtractorError) -> Self {
        match e {
            ExtractorError::JsonError(e) => {
                let detail = e.to_string();
                Self::internal("serialization failure").with_detail(detail)
            }
            other => Self::from_kind(other.kind(), other.to_string()),
        }
    }
}

impl From<EnrichmentError> for ApiError {
    fn from(e: EnrichmentError) -> Self {
        Self::from_kind(e.kind(), e.to_string())
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::NoUrls | GatewayError::InvalidMethod(_) => {
                Self::bad_request(e.to_string())
            }
            GatewayError::HttpError(e) => {
                let detail = e.to_string();
                Self::bad_gateway("upstream failed").with_detail(detail)
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::internal("serialization failure").with_detail(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(ExtractorError::ValidationError("bad".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::from(ExtractorError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(ExtractorError::UpstreamStatus(503)).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(EnrichmentError::RateLimited { attempts: 3 }).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(ApiError::from(GatewayError::NoUrls).status(), StatusCode::BAD_REQUEST);
    }
}
