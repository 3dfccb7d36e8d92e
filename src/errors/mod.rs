use std::io;

use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use serde_json::json;
use thiserror::Error;

/// Request-level failures. Per-file problems never surface here; they are
/// downgraded to warnings by the converter.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{message}")]
    NoValidOutput {
        message: String,
        warnings: Vec<String>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AudioResult<T> = Result<T, ConvertError>;

impl ConvertError {
    pub fn not_found() -> Self {
        ConvertError::NotFound("file not found".to_string())
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ConvertError::InvalidRequest(_) => "InvalidRequest",
            ConvertError::PayloadTooLarge(_) => "PayloadTooLarge",
            ConvertError::NoValidOutput { .. } => "NoValidOutput",
            ConvertError::NotFound(_) => "NotFound",
            ConvertError::Io(_) | ConvertError::Internal(_) => "Internal",
        }
    }
}

impl ResponseError for ConvertError {
    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ConvertError::NoValidOutput { message, warnings } => json!({
                "success": false,
                "error": message,
                "error_type": self.error_type(),
                "warnings": warnings,
            }),
            ConvertError::Io(_) | ConvertError::Internal(_) => {
                // Paths and OS messages stay in the server log.
                error!("internal error while handling request: {}", self);
                json!({
                    "success": false,
                    "error": "internal server error",
                    "error_type": self.error_type(),
                })
            }
            _ => json!({
                "success": false,
                "error": self.to_string(),
                "error_type": self.error_type(),
            }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ConvertError::InvalidRequest(_) | ConvertError::NoValidOutput { .. } => {
                StatusCode::BAD_REQUEST
            }
            ConvertError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ConvertError::NotFound(_) => StatusCode::NOT_FOUND,
            ConvertError::Io(_) | ConvertError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BlockingError> for ConvertError {
    fn from(err: BlockingError) -> ConvertError {
        ConvertError::Internal(err.to_string())
    }
}
