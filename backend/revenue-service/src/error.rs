/// Error types for Revenue Service
///
/// `RevenueError` is the engine-level taxonomy used by the calculator, the
/// ledger and the aggregators. `AppError` is the HTTP-facing error that
/// handlers return; it is rendered as `{ "error", "status" }` JSON.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

/// Result type for HTTP handlers
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type for engine operations
pub type RevenueResult<T> = std::result::Result<T, RevenueError>;

/// Engine errors
///
/// A video that exists but is not public is not an error; the calculator
/// reports it as `CalculationOutcome::NotEligible`.
#[derive(Error, Debug)]
pub enum RevenueError {
    /// Missing video or player
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage or activity read failed before anything was committed; safe to retry
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Caller supplied an unusable argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Revenue policy configuration is inconsistent
    #[error("Invalid revenue policy: {0}")]
    InvalidPolicy(String),

    /// Unexpected failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RevenueError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RevenueError::Transient(_))
    }
}

impl From<sqlx::Error> for RevenueError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RevenueError::NotFound(err.to_string()),
            sqlx::Error::Database(ref db_err)
                if db_err.code().is_some_and(|code| is_retryable_sqlstate(&code)) =>
            {
                RevenueError::Transient(err.to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Tls(_) => RevenueError::Transient(err.to_string()),
            other => RevenueError::Internal(other.to_string()),
        }
    }
}

/// serialization_failure and deadlock_detected: the transaction was rolled
/// back whole and can be replayed
fn is_retryable_sqlstate(code: &str) -> bool {
    matches!(code, "40001" | "40P01")
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // Internal details stay in the logs
        let error_msg = match self {
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error while serving request");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(status).json(serde_json::json!({
            "error": error_msg,
            "status": status.as_u16(),
        }))
    }
}

impl From<RevenueError> for AppError {
    fn from(err: RevenueError) -> Self {
        match err {
            RevenueError::NotFound(msg) => AppError::NotFound(msg),
            RevenueError::InvalidInput(msg) => AppError::BadRequest(msg),
            RevenueError::Transient(msg) => AppError::Unavailable(msg),
            RevenueError::InvalidPolicy(msg) | RevenueError::Internal(msg) => {
                AppError::Internal(msg)
            }
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_transient() {
        let err: RevenueError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_transient());
    }

    #[test]
    fn test_serialization_and_deadlock_codes_are_retryable() {
        assert!(is_retryable_sqlstate("40001"));
        assert!(is_retryable_sqlstate("40P01"));
        assert!(!is_retryable_sqlstate("23505"));
        assert!(!is_retryable_sqlstate("42P01"));
    }

    #[test]
    fn test_protocol_error_is_internal() {
        let err: RevenueError = sqlx::Error::Protocol("bad frame".into()).into();
        assert!(matches!(err, RevenueError::Internal(_)));
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::from(RevenueError::NotFound("video".into())), 404),
            (AppError::from(RevenueError::InvalidInput("range".into())), 400),
            (AppError::from(RevenueError::Transient("db".into())), 503),
            (AppError::from(RevenueError::Internal("boom".into())), 500),
            (AppError::Unauthorized("token".into()), 401),
            (AppError::Forbidden("role".into()), 403),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code().as_u16(), status);
        }
    }
}
