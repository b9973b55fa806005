//! Request, response, and error envelope types for the push gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Error payload mapped to the gateway HTTP error envelope.
#[derive(Debug)]
pub(super) struct PushGatewayApiError {
    pub(super) status: StatusCode,
    pub(super) code: &'static str,
    pub(super) message: String,
}

impl PushGatewayApiError {
    pub(super) fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub(super) fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub(super) fn invalid_token() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "invalid_token",
            "missing or invalid bearer token",
        )
    }

    pub(super) fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", message)
    }

    pub(super) fn queue_full(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "queue_full", message)
    }

    pub(super) fn shutting_down() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "gateway_shutting_down",
            "gateway is shutting down and no longer accepts messages",
        )
    }

    pub(super) fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl IntoResponse for PushGatewayApiError {
    fn into_response(self) -> Response {
        let error_type = if self.status.is_client_error() {
            "invalid_request_error"
        } else {
            "server_error"
        };
        (
            self.status,
            Json(json!({
                "error": {
                    "type": error_type,
                    "code": self.code,
                    "message": self.message,
                }
            })),
        )
            .into_response()
    }
}

/// Body accepted by `POST /send`. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub(super) struct PushSendRequest {
    #[serde(default)]
    pub(super) content: Option<String>,
    #[serde(default)]
    pub(super) image: Option<String>,
    #[serde(default)]
    pub(super) callback_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct PushSendResponse {
    pub(super) status: &'static str,
    pub(super) message_id: String,
    pub(super) queue_size: usize,
}

#[derive(Debug, Serialize)]
pub(super) struct PushHealthResponse {
    pub(super) status: &'static str,
    pub(super) queue_size: usize,
}
