use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::applications::validation::FieldErrors;
use crate::pages::flash::{redirect_with_flash, FlashLevel};

pub const GENERIC_ERROR_MESSAGE: &str = "An internal server error occurred. Please try again.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),

    #[error("database error: {0:#}")]
    Database(anyhow::Error),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("authentication required")]
    Unauthorized,

    #[error("invalid or missing form token")]
    Forbidden,

    #[error("{0}")]
    Conflict(String),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Storage(_)
            | AppError::Database(_)
            | AppError::Session(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON rendering, used by the `/api` routes.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation(fields) => json!({ "error": self.to_string(), "fields": fields }),
            _ if status.is_server_error() => {
                error!(error = %self, "request failed");
                json!({ "error": "internal server error" })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// The same taxonomy rendered for browser pages: redirects carrying a flash message.
#[derive(Debug)]
pub struct PageError(pub AppError);

impl From<AppError> for PageError {
    fn from(e: AppError) -> Self {
        Self(e)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self.0 {
            AppError::NotFound(what) => {
                redirect_with_flash("/", FlashLevel::Error, &format!("{what} not found!"))
            }
            AppError::Unauthorized => redirect_with_flash(
                "/admin/login",
                FlashLevel::Error,
                "Please log in to access the admin area.",
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Invalid or missing form token. Reload the page and try again.",
            )
                .into_response(),
            AppError::Conflict(msg) => {
                redirect_with_flash("/admin/dashboard", FlashLevel::Error, &msg)
            }
            other => {
                error!(error = %other, "request failed");
                redirect_with_flash("/", FlashLevel::Error, GENERIC_ERROR_MESSAGE)
            }
        }
    }
}
