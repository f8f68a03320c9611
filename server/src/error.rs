use axum::{
    http::{header::WWW_AUTHENTICATE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use rideshare_data_management::DataManagerError;
use rideshare_lib::{page::PageError, rules::SignupDenial};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Only the driver may change this ride")]
    Forbidden,

    #[error("You are not allowed to sign up for this ride")]
    SignupDenied(SignupDenial),

    #[error("{0}")]
    Invalid(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DataManagerError> for AppError {
    fn from(err: DataManagerError) -> Self {
        match err {
            DataManagerError::NotFound(what) => AppError::NotFound(what),
            DataManagerError::Page(err) => err.into(),
            DataManagerError::PermissionDenied => AppError::Forbidden,
            DataManagerError::SignupDenied(denial) => AppError::SignupDenied(denial),
            DataManagerError::InvalidRide(err) => AppError::Invalid(err.to_string()),
            DataManagerError::UsernameTaken(username) => AppError::Invalid(format!("username {username:?} is already taken")),
            DataManagerError::Database(msg) => AppError::Internal(msg),
        }
    }
}

impl From<PageError> for AppError {
    fn from(err: PageError) -> Self {
        AppError::NotFound(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden | AppError::SignupDenied(_) => StatusCode::FORBIDDEN,
            AppError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            AppError::SignupDenied(denial) => json!({ "error": self.to_string(), "reason": denial }),
            AppError::Internal(msg) => {
                tracing::error!("{msg}");
                json!({ "error": "Internal error" })
            }
            _ => json!({ "error": self.to_string() }),
        };

        match self {
            AppError::Unauthorized => (status, [(WWW_AUTHENTICATE, "Bearer")], Json(body)).into_response(),
            _ => (status, Json(body)).into_response(),
        }
    }
}
