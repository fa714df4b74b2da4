use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Errors returned by request handlers.
///
/// Every variant except [`AppError::InternalServerError`] is HTTP-facing: it
/// carries a status and a message meant for the client as-is.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{1}")]
    Status(StatusCode, String),
    #[error(transparent)]
    InternalServerError(anyhow::Error),
}

impl AppError {
    pub fn is_http_facing(&self) -> bool {
        !matches!(self, AppError::InternalServerError(_))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Status(status, _) => *status,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> String {
        match self {
            AppError::NotFound(_) => "NOT_FOUND".to_string(),
            AppError::Unauthorized(_) => "UNAUTHORIZED".to_string(),
            AppError::Forbidden(_) => "FORBIDDEN".to_string(),
            AppError::Conflict(_) => "CONFLICT".to_string(),
            AppError::BadRequest(_) => "BAD_REQUEST".to_string(),
            AppError::Status(status, _) => format!("HTTP_{}", status.as_u16()),
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let error_message = match self {
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                "Internal server error".to_string()
            }
            AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::Conflict(msg)
            | AppError::BadRequest(msg)
            | AppError::Status(_, msg) => msg,
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            _ => AppError::InternalServerError(err.into()),
        }
    }
}
