//! Authenticated request context

use crate::api::types::ApiError;
use crate::core::constants::{ROLE_ADMIN, ROLE_MANAGER};

/// Identity attached to every authenticated request
///
/// Injected into request extensions by the auth middleware. The tenant id is
/// the scope for every query a handler runs; handlers never take a tenant id
/// from the request itself.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub tenant_id: String,
    pub role: String,
}

impl AuthContext {
    /// Managers and admins may run entity-wide mutations like bulk assignment
    pub fn is_manager(&self) -> bool {
        self.role == ROLE_MANAGER || self.role == ROLE_ADMIN
    }

    pub fn require_manager(&self) -> Result<(), ApiError> {
        if self.is_manager() {
            Ok(())
        } else {
            Err(ApiError::forbidden(
                "INSUFFICIENT_ROLE",
                "manager role or higher required",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: &str) -> AuthContext {
        AuthContext {
            user_id: "u1".to_string(),
            tenant_id: "t1".to_string(),
            role: role.to_string(),
        }
    }

    #[test]
    fn test_manager_gate() {
        assert!(ctx("manager").require_manager().is_ok());
        assert!(ctx("admin").require_manager().is_ok());
        assert!(ctx("member").require_manager().is_err());
        assert!(ctx("viewer").require_manager().is_err());
    }
}
