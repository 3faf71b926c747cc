//! Errors surfaced at the HTTP boundary.
//!
//! Each module reports its own failure type; [`ServiceError`] gathers them and decides the
//! status code. Validation failures become `400`, everything else `500`, and the body is always
//! `{"error": "<message>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::helper::InvalidColor;
use crate::qrcode::EncodeError;
use crate::upi::InvalidAmount;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request itself is malformed; raised before anything is encoded.
    #[error("{0}")]
    InvalidInput(String),

    /// The payload could not be turned into a symbol.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("failed to encode PNG: {0}")]
    Image(#[from] image::ImageError),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::Encode(_) | ServiceError::Image(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<InvalidAmount> for ServiceError {
    fn from(e: InvalidAmount) -> Self {
        ServiceError::InvalidInput(e.to_string())
    }
}

impl From<InvalidColor> for ServiceError {
    fn from(e: InvalidColor) -> Self {
        ServiceError::InvalidInput(e.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "QR generation failed");
        } else {
            warn!(error = %self, "rejected QR request");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
