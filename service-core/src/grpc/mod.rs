//! gRPC utilities shared by the reconciliation services.
//!
//! - Error conversion between `AppError` and `tonic::Status`
//! - Tenant/auth context extraction from request metadata

pub mod auth;
pub mod error;

pub use auth::{AuthContext, CapabilityChecker, TENANT_ID_KEY, USER_ID_KEY, extract_tenant_id};
pub use error::{GrpcResult, IntoStatus};

// Re-export commonly used tonic types
pub use tonic::{Code, Request, Response, Status};
