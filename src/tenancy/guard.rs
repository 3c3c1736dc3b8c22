use crate::error::ApiError;

use super::identity::{CallerIdentity, Role, TenantScope};

/// Check that the caller holds at least `required` inside the tenant.
///
/// Fails closed: no caller is `Unauthorized`, no membership or a lower role
/// is `Forbidden`. Global roles on the identity never grant tenant access.
pub fn authorize<'a>(
    caller: Option<&'a CallerIdentity>,
    tenant: &TenantScope,
    required: Role,
) -> Result<&'a CallerIdentity, ApiError> {
    let caller = caller.ok_or_else(|| ApiError::unauthorized("authentication required"))?;

    match caller.role_in(&tenant.tenant_id) {
        Some(role) if role >= required => Ok(caller),
        Some(role) => {
            tracing::debug!(
                "caller {} has role {} in tenant {}, {} required",
                caller.user_id, role, tenant.tenant_id, required
            );
            Err(ApiError::forbidden(format!("{} role required", required)))
        }
        None => {
            tracing::debug!("caller {} is not a member of tenant {}", caller.user_id, tenant.tenant_id);
            Err(ApiError::forbidden("not a member of this tenant"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashMap};
    use uuid::Uuid;

    fn caller_with(tenant: Uuid, role: Role) -> CallerIdentity {
        let mut memberships = HashMap::new();
        memberships.insert(tenant, role);
        CallerIdentity {
            user_id: Uuid::new_v4(),
            roles: BTreeSet::from([Role::Admin]),
            tenant_memberships: memberships,
            active_tenant: None,
        }
    }

    #[test]
    fn higher_roles_inherit_lower_permissions() {
        let tenant = TenantScope::new(Uuid::new_v4());
        let admin = caller_with(tenant.tenant_id, Role::Admin);
        assert!(authorize(Some(&admin), &tenant, Role::Member).is_ok());
        assert!(authorize(Some(&admin), &tenant, Role::Teacher).is_ok());
        assert!(authorize(Some(&admin), &tenant, Role::Admin).is_ok());
    }

    #[test]
    fn lower_role_is_forbidden() {
        let tenant = TenantScope::new(Uuid::new_v4());
        let teacher = caller_with(tenant.tenant_id, Role::Teacher);
        let err = authorize(Some(&teacher), &tenant, Role::Admin).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn global_roles_do_not_cross_tenants() {
        let tenant = TenantScope::new(Uuid::new_v4());
        let outsider = caller_with(Uuid::new_v4(), Role::Admin);
        let err = authorize(Some(&outsider), &tenant, Role::Member).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn missing_caller_is_unauthorized() {
        let tenant = TenantScope::new(Uuid::new_v4());
        let err = authorize(None, &tenant, Role::Member).unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}
