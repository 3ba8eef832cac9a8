use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parley_agent::ProviderError;
use parley_core::ParleyError;
use parley_sessions::SessionError;
use serde_json::json;
use tracing::warn;

/// Handler error: a `ParleyError` rendered as `{ success, error, code }`.
#[derive(Debug)]
pub struct ApiError(pub ParleyError);

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(ParleyError::InvalidRequest(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ParleyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ParleyError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
            ParleyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ParleyError::LlmProvider(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self.0, "request failed");
        }
        let body = json!({
            "success": false,
            "error": self.0.to_string(),
            "code": self.0.code(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<ParleyError> for ApiError {
    fn from(err: ParleyError) -> Self {
        Self(err)
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self(err.into())
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        Self(err.into())
    }
}
