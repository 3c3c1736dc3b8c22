// handlers/billing.rs - POST /api/v1[/tenants/:tenant_id]/fee-rules
//                       POST /api/v1[/tenants/:tenant_id]/bill-batches/generate

use axum::extract::{rejection::JsonRejection, State};
use axum::Json;

use crate::error::ApiError;
use crate::middleware::{ApiResult, TenantContext};
use crate::services::billing::{self, CreateFeeRule, GenerateBillBatch};
use crate::state::AppState;

pub async fn fee_rule_post(
    State(state): State<AppState>,
    ctx: TenantContext,
    payload: Result<Json<CreateFeeRule>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload.map_err(json_rejection)?;
    billing::create_fee_rule(state.store.as_ref(), &ctx.caller, &ctx.tenant, request).await
}

pub async fn bill_batch_generate(
    State(state): State<AppState>,
    ctx: TenantContext,
    payload: Result<Json<GenerateBillBatch>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload.map_err(json_rejection)?;
    billing::generate_bill_batch(state.store.as_ref(), &ctx.caller, &ctx.tenant, request).await
}

pub(crate) fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(format!("Invalid JSON body: {}", rejection.body_text()))
}
