//! Tenant/auth context extraction for gRPC handlers.
//!
//! Services sit behind a gateway that authenticates the caller and forwards
//! the resolved tenant and user as request metadata (BFF trust model).
//! Handlers declare the capability they require; enforcement happens
//! upstream, so here the capability is recorded for audit and the tenant
//! context is extracted and validated.

use tonic::{Request, Status};

/// gRPC metadata key carrying the resolved tenant.
pub const TENANT_ID_KEY: &str = "x-tenant-id";

/// gRPC metadata key carrying the acting user.
pub const USER_ID_KEY: &str = "x-user-id";

/// Authentication context resolved for a request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub tenant_id: String,
}

/// Extract the tenant ID from request metadata, if present.
pub fn extract_tenant_id<T>(request: &Request<T>) -> Option<String> {
    request
        .metadata()
        .get(TENANT_ID_KEY)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Capability gate for gRPC handlers.
///
/// Rejects requests arriving without a tenant context; the capability key is
/// logged so audit trails show what each call required.
#[derive(Clone, Default)]
pub struct CapabilityChecker;

impl CapabilityChecker {
    pub fn new() -> Self {
        Self
    }

    #[allow(clippy::result_large_err)]
    pub fn require_capability<T>(
        &self,
        request: &Request<T>,
        capability: &str,
    ) -> Result<AuthContext, Status> {
        let tenant_id = extract_tenant_id(request)
            .ok_or_else(|| Status::unauthenticated("Missing tenant context"))?;

        let user_id = request
            .metadata()
            .get(USER_ID_KEY)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("system")
            .to_string();

        tracing::debug!(
            capability,
            tenant_id = %tenant_id,
            user_id = %user_id,
            "Capability resolved upstream"
        );

        Ok(AuthContext { user_id, tenant_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_tenant(tenant: &str) -> Request<()> {
        let mut req = Request::new(());
        req.metadata_mut()
            .insert(TENANT_ID_KEY, tenant.parse().unwrap());
        req
    }

    #[test]
    fn test_require_capability_extracts_context() {
        let checker = CapabilityChecker::new();
        let req = request_with_tenant("tenant-1");
        let ctx = checker.require_capability(&req, "reconciliation:read").unwrap();
        assert_eq!(ctx.tenant_id, "tenant-1");
        assert_eq!(ctx.user_id, "system");
    }

    #[test]
    fn test_missing_tenant_is_unauthenticated() {
        let checker = CapabilityChecker::new();
        let req = Request::new(());
        let err = checker
            .require_capability(&req, "reconciliation:read")
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unauthenticated);
    }
}
