use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileServerError {
    #[error("File not found: {0}")]
    NotFound(String),

    /// Target exists but is neither a regular file nor a directory
    /// (socket, FIFO, device). The 401 status is inherited behavior and
    /// kept for compatibility, even though 403 would be more conventional.
    #[error("Refusing to serve: {0}")]
    Unsupported(String),

    #[error("Cannot resolve path against proxy base")]
    InvalidProxyTarget,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for FileServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            FileServerError::NotFound(_) => StatusCode::NOT_FOUND,
            FileServerError::Unsupported(_) => StatusCode::UNAUTHORIZED,
            FileServerError::InvalidProxyTarget => StatusCode::INTERNAL_SERVER_ERROR,
            FileServerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}
