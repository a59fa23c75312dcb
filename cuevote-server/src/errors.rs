use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cuevote_core::CommandError;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource} not found")]
    NotFound { resource: &'static str },
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    /// Something the server depends on is unavailable, the request can be retried
    #[error("{0}")]
    Unavailable(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { resource: _ } => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<CommandError> for ServerError {
    fn from(value: CommandError) -> Self {
        match value {
            CommandError::NotFound { resource } => Self::NotFound { resource },
            CommandError::Validation(message) | CommandError::PolicyViolation(message) => {
                Self::BadRequest(message)
            }
            CommandError::Unauthorized(message) => Self::Unauthorized(message),
            CommandError::Transient(message) => Self::Unavailable(message),
        }
    }
}
