// handlers/attendance.rs - POST   /api/v1[/tenants/:tenant_id]/attendance
//                          DELETE /api/v1[/tenants/:tenant_id]/attendance/:id

use std::collections::HashMap;

use axum::extract::{rejection::JsonRejection, Path, State};
use axum::Json;

use super::billing::json_rejection;
use super::path_id;
use crate::middleware::{ApiResult, TenantContext};
use crate::services::attendance::{self, RecordAttendance};
use crate::state::AppState;

pub async fn record_post(
    State(state): State<AppState>,
    ctx: TenantContext,
    payload: Result<Json<RecordAttendance>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload.map_err(json_rejection)?;
    attendance::record_attendance(state.store.as_ref(), &ctx.caller, &ctx.tenant, request).await
}

pub async fn record_delete(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(path): Path<HashMap<String, String>>,
) -> ApiResult {
    let id = path_id(&path)?;
    attendance::delete_attendance(state.store.as_ref(), &ctx.caller, &ctx.tenant, id).await
}
