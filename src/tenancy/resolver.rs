use uuid::Uuid;

use crate::error::ApiError;

use super::identity::{CallerIdentity, Role, TenantId, TenantScope};

/// Resolve the active tenant for a request.
///
/// The token is consulted first: an explicit active-tenant claim, then the
/// caller's single teacher association, then the caller's single membership.
/// Only when the token yields nothing is the `tenant_id` path parameter used.
/// Every tenant-scoped route goes through this one function so precedence
/// never differs between endpoints.
pub fn resolve(
    caller: Option<&CallerIdentity>,
    path_tenant: Option<&str>,
) -> Result<TenantScope, ApiError> {
    if let Some(tenant_id) = caller.and_then(tenant_from_token) {
        return Ok(TenantScope::new(tenant_id));
    }

    let raw = path_tenant
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("tenant context is required"))?;

    let tenant_id = Uuid::parse_str(raw)
        .map_err(|_| ApiError::bad_request(format!("invalid tenant id: {}", raw)))?;

    Ok(TenantScope::new(tenant_id))
}

fn tenant_from_token(caller: &CallerIdentity) -> Option<TenantId> {
    if let Some(active) = caller.active_tenant {
        return Some(active);
    }

    let teacher_tenants: Vec<TenantId> = caller
        .tenant_memberships
        .iter()
        .filter(|(_, role)| **role == Role::Teacher)
        .map(|(tenant, _)| *tenant)
        .collect();
    if teacher_tenants.len() == 1 {
        return Some(teacher_tenants[0]);
    }

    if caller.tenant_memberships.len() == 1 {
        return caller.tenant_memberships.keys().next().copied();
    }

    None
}
