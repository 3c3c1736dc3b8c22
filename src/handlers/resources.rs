// handlers/resources.rs - GET/DELETE /api/v1[/tenants/:tenant_id]/<resource>[/:id]
//
// The entity is attached to each resource router as an Extension, so one set
// of handlers serves every resource.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Extension;

use super::path_id;
use crate::entities::EntitySpec;
use crate::filter::QueryParams;
use crate::middleware::{ApiResult, TenantContext};
use crate::pipeline;
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    Extension(entity): Extension<&'static EntitySpec>,
    ctx: TenantContext,
    Query(params): Query<QueryParams>,
) -> ApiResult {
    pipeline::list(state.store.as_ref(), entity, &ctx.caller, &ctx.tenant, &params).await
}

pub async fn show(
    State(state): State<AppState>,
    Extension(entity): Extension<&'static EntitySpec>,
    ctx: TenantContext,
    Path(path): Path<HashMap<String, String>>,
    Query(params): Query<QueryParams>,
) -> ApiResult {
    let id = path_id(&path)?;
    pipeline::show(state.store.as_ref(), entity, &ctx.caller, &ctx.tenant, id, &params).await
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(entity): Extension<&'static EntitySpec>,
    ctx: TenantContext,
    Path(path): Path<HashMap<String, String>>,
) -> ApiResult {
    let id = path_id(&path)?;
    pipeline::delete(state.store.as_ref(), entity, &ctx.caller, &ctx.tenant, id).await
}
