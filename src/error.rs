use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use serde_json::json;
use thiserror::Error;

/// Errors the relay endpoint can return. Display strings double as the JSON
/// error bodies, so they are part of the HTTP contract.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Missing {0}.")]
    MissingCredential(String),
    #[error("Invalid JSON payload.")]
    InvalidPayload,
    #[error("Unsupported or missing model. Please select a valid model.")]
    UnsupportedModel,
    #[error("Message history is required.")]
    EmptyHistory,
    #[error("{0}")]
    Upstream(String),
}

impl actix_web::ResponseError for RelayError {
    fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InvalidPayload
            | RelayError::UnsupportedModel
            | RelayError::EmptyHistory => StatusCode::BAD_REQUEST,
            RelayError::MissingCredential(_) | RelayError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

/// Errors surfaced by the client-side submission flow.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a submission is already in flight")]
    Busy,
    #[error("{0}")]
    Relay(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}
