//! Error types for wicket

use hyper::StatusCode;

/// Main error type for gateway operations
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Driver errors keep the driver's message untouched.
    #[error("{0}")]
    Database(String),

    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("Invalid JSON: {}", err))
    }
}

impl From<hyper::Error> for GatewayError {
    fn from(err: hyper::Error) -> Self {
        Self::BadRequest(format!("Failed to read request body: {}", err))
    }
}

impl From<mongodb::error::Error> for GatewayError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for GatewayError {
    fn from(err: bson::ser::Error) -> Self {
        Self::BadRequest(format!("Invalid document: {}", err))
    }
}

impl From<bson::oid::Error> for GatewayError {
    fn from(err: bson::oid::Error) -> Self {
        Self::BadRequest(format!("Invalid id: {}", err))
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_flat_categories() {
        assert_eq!(
            GatewayError::Unauthorized("no token".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::BadRequest("missing id".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::NotFound("/nope".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::Database("E11000 duplicate key".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn database_errors_keep_driver_message() {
        let err = GatewayError::Database("connection reset by peer".into());
        assert_eq!(err.to_string(), "connection reset by peer");
    }
}
