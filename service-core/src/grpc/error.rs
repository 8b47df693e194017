//! Error conversion from `AppError` to `tonic::Status`.
//!
//! | AppError | gRPC Status |
//! |----------|-------------|
//! | `BadRequest` | `INVALID_ARGUMENT` |
//! | `NotFound` | `NOT_FOUND` |
//! | `Conflict` | `ALREADY_EXISTS` |
//! | `NotConfigured` | `FAILED_PRECONDITION` |
//! | `BadGateway` | `UNAVAILABLE` |
//! | `DatabaseError`, `RedisError`, `ConfigError`, `InternalError` | `INTERNAL` |

use tonic::Status;

use crate::error::AppError;

/// Extension trait for converting types into `tonic::Status`.
pub trait IntoStatus {
    /// Convert into a `tonic::Status`.
    fn into_status(self) -> Status;
}

impl IntoStatus for AppError {
    fn into_status(self) -> Status {
        match self {
            AppError::BadRequest(err) => Status::invalid_argument(err.to_string()),
            AppError::NotFound(err) => Status::not_found(err.to_string()),
            AppError::Conflict(err) => Status::already_exists(err.to_string()),
            AppError::NotConfigured(err) => Status::failed_precondition(err.to_string()),
            AppError::BadGateway(msg) => Status::unavailable(format!("Bad gateway: {}", msg)),
            AppError::DatabaseError(err) => {
                tracing::error!(error = %err, "Database error");
                Status::internal("Database error")
            }
            AppError::RedisError(err) => {
                tracing::error!(error = %err, "Redis error");
                Status::internal("Cache error")
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = %err, "Configuration error");
                Status::internal("Configuration error")
            }
            AppError::InternalError(err) => {
                // Log the full error but don't expose it to clients
                tracing::error!(error = %err, "Internal error");
                Status::internal("Internal server error")
            }
        }
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        err.into_status()
    }
}

/// Result type alias for gRPC handlers.
pub type GrpcResult<T> = Result<tonic::Response<T>, Status>;

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_not_found_to_status() {
        let err = AppError::NotFound(anyhow::anyhow!("Record not found"));
        let status: Status = err.into();
        assert_eq!(status.code(), Code::NotFound);
        assert!(status.message().contains("Record not found"));
    }

    #[test]
    fn test_conflict_to_status() {
        let err = AppError::Conflict(anyhow::anyhow!("Transaction already reconciled"));
        let status: Status = err.into();
        assert_eq!(status.code(), Code::AlreadyExists);
    }

    #[test]
    fn test_not_configured_to_status() {
        let err = AppError::NotConfigured(anyhow::anyhow!("No accounting integration"));
        let status: Status = err.into();
        assert_eq!(status.code(), Code::FailedPrecondition);
    }

    #[test]
    fn test_internal_message_is_not_leaked() {
        let err = AppError::DatabaseError(anyhow::anyhow!("connection refused on 10.0.0.3"));
        let status: Status = err.into();
        assert_eq!(status.code(), Code::Internal);
        assert!(!status.message().contains("10.0.0.3"));
    }
}
