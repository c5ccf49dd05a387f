use actix_web::{
    error::BlockingError,
    http::StatusCode,
    HttpResponse, ResponseError,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Prediction(#[from] bloomdiet_core::Error),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Prediction task failed: {0}")]
    Blocking(#[from] BlockingError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Prediction(e) if e.is_missing_fields() => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}
