use crate::auth::token::Claims;
use crate::error::{AppError, AppResult};

/// Authorization policies used by every privileged mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Requester must own the resource or hold the Admin role.
    SelfOrAdmin { owner_id: i64 },
    /// Requester must hold the Admin role.
    AdminOnly,
}

/// Pure decision function: no database access, no side effects. A denial
/// must short-circuit the operation before anything is mutated, and the
/// message never reveals whether the resource exists.
pub fn authorize(claims: &Claims, policy: Policy) -> AppResult<()> {
    let allowed = match policy {
        Policy::SelfOrAdmin { owner_id } => claims.sub == owner_id || claims.role.is_admin(),
        Policy::AdminOnly => claims.role.is_admin(),
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You are not authorized to do this".to_string(),
        ))
    }
}
