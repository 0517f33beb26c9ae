// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdlensError {
    #[error("Remote service error: {0}")]
    Remote(String),

    #[error("Malformed analysis result: {0}")]
    MalformedResult(String),

    #[error("Score {0} is outside the 0-5 rating range")]
    ScoreOutOfRange(i64),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AdlensError {
    fn label(&self) -> &'static str {
        match self {
            AdlensError::Remote(_) => "Analysis service error",
            AdlensError::MalformedResult(_) => "Malformed analysis result",
            AdlensError::ScoreOutOfRange(_) => "Out-of-range score",
            AdlensError::Validation(_) => "Validation error",
            AdlensError::ImageProcessing(_) => "Image processing error",
            AdlensError::NotFound(_) => "Not found",
            AdlensError::Unsupported(_) => "Unsupported operation",
            AdlensError::Redis(_) => "Database error",
            AdlensError::Serialization(_) => "Data processing error",
        }
    }
}

impl ResponseError for AdlensError {
    fn status_code(&self) -> StatusCode {
        match self {
            AdlensError::Remote(_) => StatusCode::BAD_GATEWAY,
            AdlensError::MalformedResult(_) | AdlensError::ScoreOutOfRange(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AdlensError::Validation(_) | AdlensError::ImageProcessing(_) => {
                StatusCode::BAD_REQUEST
            }
            AdlensError::NotFound(_) => StatusCode::NOT_FOUND,
            AdlensError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            AdlensError::Redis(_) | AdlensError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.label(),
            "message": self.to_string()
        }))
    }
}
