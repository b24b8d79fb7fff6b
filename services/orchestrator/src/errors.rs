use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    MissingFields(&'static [&'static str]),
    InvalidBody(String),
    Unauthorized,
    RateLimited,
    /// `details` is only rendered in development
    Internal { message: String, details: bool },
}

impl ApiError {
    pub fn internal(message: impl Into<String>, details: bool) -> Self {
        ApiError::Internal {
            message: message.into(),
            details,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::MissingFields(fields) => {
                write!(f, "Missing required fields: {}", fields.join(", "))
            }
            ApiError::InvalidBody(msg) => write!(f, "Invalid request body: {}", msg),
            ApiError::Unauthorized => write!(f, "Unauthorized"),
            ApiError::RateLimited => write!(f, "Rate limit exceeded"),
            ApiError::Internal { message, .. } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for ApiError {}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingFields(_) | ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::MissingFields(fields) => json!({
                "error": "Missing required fields",
                "required": fields
            }),
            ApiError::InvalidBody(msg) => json!({
                "error": "Invalid request body",
                "message": msg
            }),
            ApiError::Unauthorized => json!({ "error": "Unauthorized" }),
            ApiError::RateLimited => json!({
                "error": "Too many requests",
                "message": "Rate limit exceeded. Please try again later."
            }),
            ApiError::Internal { message, details: true } => json!({
                "error": "Internal server error",
                "message": message
            }),
            ApiError::Internal { details: false, .. } => json!({ "error": "Internal server error" }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
