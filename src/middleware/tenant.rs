use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};

use crate::error::ApiError;
use crate::tenancy::{resolve, CallerIdentity, TenantScope};

/// Caller plus resolved tenant for a tenant-scoped route.
///
/// Works on both the token-only routes and the `/tenants/:tenant_id/...`
/// routes; the path parameter is only a fallback when the token names no tenant.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub caller: CallerIdentity,
    pub tenant: TenantScope,
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let caller = parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("authentication required"))?;

        let path_tenant = match Path::<HashMap<String, String>>::from_request_parts(parts, state).await {
            Ok(Path(params)) => params.get("tenant_id").cloned(),
            Err(_) => None,
        };

        let tenant = resolve(Some(&caller), path_tenant.as_deref())?;
        Ok(Self { caller, tenant })
    }
}
