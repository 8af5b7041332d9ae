use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use notelite_api::ErrorBody;

/// Failure of a request, mapped onto an HTTP status by `IntoResponse`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("missing or invalid session")]
    Unauthorized,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    #[error("document not found")]
    DocumentNotFound,

    #[error("no image metadata for this filename")]
    ImageNotFound,

    #[error("image metadata exists but the file is missing on disk")]
    ImageFileMissing,

    #[error("forbidden")]
    Forbidden,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("file too large")]
    TooLarge,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::UserNotFound
            | Self::DocumentNotFound
            | Self::ImageNotFound
            | Self::ImageFileMissing => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InvalidInput(_) | Self::TooLarge => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message sent to the client. Internal details are never included.
    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthorized => "Unauthorized".into(),
            Self::InvalidCredentials => "Invalid credentials".into(),
            Self::UserNotFound => "User not found".into(),
            Self::DocumentNotFound => "Document not found".into(),
            Self::ImageNotFound | Self::ImageFileMissing => "Image not found".into(),
            Self::Forbidden => "Forbidden".into(),
            Self::InvalidInput(msg) => msg.clone(),
            Self::TooLarge => "File too large".into(),
            Self::Internal(_) => "Internal server error".into(),
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Internal(e.into())
    }
}

impl From<r2d2::Error> for AppError {
    fn from(e: r2d2::Error) -> Self {
        Self::Internal(e.into())
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Internal(e) = &self {
            tracing::error!(error = ?e, "request failed");
        }
        let body = ErrorBody {
            error: self.public_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
