// handlers/auth/whoami.rs - GET /api/v1/auth/whoami

use axum::Extension;
use serde_json::json;

use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::tenancy::{resolve, CallerIdentity};

/// Current caller as decoded from the token, plus the tenant the token resolves to
pub async fn whoami_get(caller: Option<Extension<CallerIdentity>>) -> ApiResult {
    let Some(Extension(caller)) = caller else {
        return Err(ApiError::unauthorized("authentication required"));
    };

    let resolved_tenant = resolve(Some(&caller), None).ok().map(|scope| scope.tenant_id);
    let memberships: Vec<_> = caller
        .tenant_memberships
        .iter()
        .map(|(tenant_id, role)| json!({"tenant_id": tenant_id, "role": role}))
        .collect();

    ApiResponse::success(
        "caller identity",
        json!({
            "user_id": caller.user_id,
            "roles": caller.roles,
            "tenants": memberships,
            "active_tenant": caller.active_tenant,
            "resolved_tenant": resolved_tenant,
        }),
    )
}
