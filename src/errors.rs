use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use uuid::Uuid;

// --- Storage Errors ---

#[derive(Error, Debug)]
pub enum RepoError {
    /// Another meme already owns the same (name, url, caption) triple.
    #[error("A meme with the same name, url and caption already exists")]
    Duplicate,

    #[error("Meme {0} was modified concurrently")]
    ConcurrentUpdate(Uuid),

    #[error("Stored meme data could not be parsed: {0}")]
    DataCorruption(String),

    #[error("Database backend error: {0}")]
    BackendError(#[from] anyhow::Error),
}

// --- Web Layer Error ---

#[derive(Error, Debug)]
pub enum AppError {
    // Request validation
    #[error("Incomplete form data: {0}")]
    IncompleteFormData(String),
    #[error("Invalid JSON body: {0}")]
    InvalidJson(#[from] JsonRejection),

    // Resource outcomes
    #[error("Meme not found with ID: {0}")]
    MemeNotFound(String),
    #[error("Meme already exists")]
    MemeExists,
    #[error("Meme {0} was modified by another request")]
    UpdateConflict(Uuid),
    #[error("No route for {0}")]
    RouteNotFound(String),
    #[error("Method {0} not allowed on {1}")]
    MethodNotAllowed(String, String),

    // Storage faults
    #[error("Could not reach meme storage")]
    StorageUnavailable(#[source] RepoError),
    #[error("Could not perform meme storage operation")]
    RepositoryError(#[source] RepoError),

    // Configuration / Startup errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate => AppError::MemeExists,
            RepoError::ConcurrentUpdate(id) => AppError::UpdateConflict(id),
            e @ (RepoError::DataCorruption(_) | RepoError::BackendError(_)) => {
                AppError::RepositoryError(e)
            }
        }
    }
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl AppError {
    /// Status code and client-facing message. Server-side details stay in the logs.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            // 4xx Client Errors
            AppError::IncompleteFormData(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Please enter all fields: {}", detail),
            ),
            AppError::InvalidJson(rejection) => (rejection.status(), rejection.body_text()),
            AppError::MemeNotFound(_) => (StatusCode::NOT_FOUND, "404: Meme not found".to_string()),
            AppError::MemeExists => (StatusCode::CONFLICT, "Meme already exists".to_string()),
            AppError::UpdateConflict(_) => (
                StatusCode::CONFLICT,
                "Meme was modified by another request, please retry".to_string(),
            ),
            AppError::RouteNotFound(_) => (StatusCode::NOT_FOUND, "Route not found".to_string()),
            AppError::MethodNotAllowed(_, _) => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed".to_string(),
            ),
            // Listing reports an unreachable store as 404, which is what existing clients expect.
            AppError::StorageUnavailable(_) => (StatusCode::NOT_FOUND, "Could not connect".to_string()),

            // 5xx Server Errors
            AppError::RepositoryError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database operation failed".to_string(),
            ),
            AppError::ConfigError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server configuration error".to_string(),
            ),
            AppError::InitError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server initialization error".to_string(),
            ),
            AppError::InternalServerError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        match &self {
            AppError::StorageUnavailable(e) | AppError::RepositoryError(e) => {
                tracing::error!(error.source = ?e, error.status = %status, "Repository error occurred");
            }
            _ if status.is_server_error() => {
                tracing::error!(error.detail = %self, error.status = %status, "Responding with error");
            }
            _ => {
                tracing::debug!(error.detail = %self, error.status = %status, "Rejecting request");
            }
        }

        let body = Json(serde_json::json!({ "error": error_message }));
        (status, body).into_response()
    }
}
