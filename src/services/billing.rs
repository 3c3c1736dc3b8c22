use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::{text_field, uuid_field};
use crate::database::{Insert, OnConflict, Row, Store};
use crate::entities::{ACADEMIC_TERMS, BILL_BATCHES, CLASS_SECTIONS, FEE_RULES, STUDENTS, STUDENT_BILLS};
use crate::error::ApiError;
use crate::filter::{Condition, FilterOrderInfo, SortDirection, SqlValue};
use crate::middleware::ApiResponse;
use crate::pipeline::{by_id, not_found};
use crate::tenancy::{authorize, CallerIdentity, Role, TenantScope};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFeeRule {
    #[validate(length(min = 1, max = 120, message = "name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 32, message = "option code must be 1-32 characters"))]
    pub option_code: String,
    #[validate(range(min = 0, message = "amount must not be negative"))]
    pub amount_idr: i64,
    pub term_id: Option<Uuid>,
    #[serde(default = "default_rule_status")]
    #[validate(length(min = 1, max = 32))]
    pub status: String,
}

fn default_rule_status() -> String {
    "active".to_string()
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateBillBatch {
    pub fee_rule_id: Uuid,
    /// Defaults to the fee rule's term
    pub term_id: Option<Uuid>,
    #[validate(range(min = 2000, max = 2100, message = "year is out of range"))]
    pub year: i32,
    #[validate(range(min = 1, max = 12, message = "month must be between 1 and 12"))]
    pub month: u32,
    pub due_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    /// Restrict billing to these sections; empty bills every active student
    #[serde(default)]
    pub class_section_ids: Vec<Uuid>,
}

pub async fn create_fee_rule(
    store: &dyn Store,
    caller: &CallerIdentity,
    tenant: &TenantScope,
    request: CreateFeeRule,
) -> Result<ApiResponse, ApiError> {
    authorize(Some(caller), tenant, FEE_RULES.write_role)?;
    request.validate()?;

    if let Some(term_id) = request.term_id {
        ensure_term(store, tenant, term_id).await?;
    }

    let insert = Insert::new(FEE_RULES.table, OnConflict::Fail)
        .value("tenant_id", tenant.tenant_id)
        .value("name", request.name.trim())
        .value("option_code", request.option_code.trim())
        .value("amount_idr", request.amount_idr)
        .value("term_id", request.term_id)
        .value("status", request.status);

    let row = store
        .insert(&insert)
        .await
        .map_err(|e| ApiError::conflict_or(e, "a fee rule with this option code already exists"))?
        .ok_or_else(|| ApiError::internal_server_error("fee rule was not created"))?;

    tracing::info!(tenant_id = %tenant.tenant_id, option_code = ?text_field(&row, "option_code"), "fee rule created");
    Ok(ApiResponse::item("fee rule created", row, None).created())
}

/// Create a bill batch for one fee rule and period, then one bill per active student.
///
/// The batch snapshots the fee rule and the billed class sections. A second batch for
/// the same fee rule and period is a conflict; bills that already exist are skipped.
/// The batch and its bills are written in one transaction.
pub async fn generate_bill_batch(
    store: &dyn Store,
    caller: &CallerIdentity,
    tenant: &TenantScope,
    request: GenerateBillBatch,
) -> Result<ApiResponse, ApiError> {
    authorize(Some(caller), tenant, Role::Admin)?;
    request.validate()?;

    let fee_rule = store
        .fetch_one(&by_id(&FEE_RULES, tenant, &request.fee_rule_id.to_string())?)
        .await?
        .ok_or_else(|| not_found(&FEE_RULES))?;

    if let Some(term_id) = request.term_id {
        ensure_term(store, tenant, term_id).await?;
    }
    let sections = load_sections(store, tenant, &request.class_section_ids).await?;
    let students = billable_students(store, tenant, &request.class_section_ids).await?;
    let snapshot: Vec<Value> = sections
        .iter()
        .map(|s| json!({"id": s.get("id"), "name": s.get("name"), "grade": s.get("grade")}))
        .collect();
    let snapshot = serde_json::to_string(&snapshot)
        .map_err(|_| ApiError::internal_server_error("failed to encode class sections"))?;

    let fee_rule_name = text_field(&fee_rule, "name").unwrap_or_default().to_string();
    let option_code = text_field(&fee_rule, "option_code").unwrap_or_default().to_string();
    let amount_idr = fee_rule.get("amount_idr").and_then(Value::as_i64).unwrap_or(0);
    let term_id = request.term_id.or_else(|| uuid_field(&fee_rule, "term_id"));
    let title = request
        .title
        .clone()
        .unwrap_or_else(|| format!("{} {}-{:02}", fee_rule_name, request.year, request.month));

    let batch_insert = Insert::new(BILL_BATCHES.table, OnConflict::Fail)
        .value("tenant_id", tenant.tenant_id)
        .value("fee_rule_id", request.fee_rule_id)
        .value("term_id", term_id)
        .value("year", i64::from(request.year))
        .value("month", i64::from(request.month))
        .value("title", title)
        .value("fee_rule_name", fee_rule_name)
        .value("option_code", option_code.clone())
        .value("amount_idr", amount_idr)
        .value("class_sections_snapshot", snapshot)
        .value("due_date", request.due_date)
        .value("status", "open")
        .value("created_by", caller.user_id);

    let mut tx = store.begin().await?;
    let mut batch = tx
        .insert(&batch_insert)
        .await
        .map_err(|e| ApiError::conflict_or(e, "a bill batch already exists for this fee rule and period"))?
        .ok_or_else(|| ApiError::internal_server_error("bill batch was not created"))?;
    let batch_id = uuid_field(&batch, "id").ok_or_else(|| ApiError::internal_server_error("bill batch has no id"))?;

    let mut bills_created = 0;
    let mut bills_skipped = 0;
    for student in &students {
        let Some(student_id) = uuid_field(student, "id") else { continue };
        let bill = Insert::new(STUDENT_BILLS.table, OnConflict::Ignore)
            .value("tenant_id", tenant.tenant_id)
            .value("batch_id", batch_id)
            .value("student_id", student_id)
            .value("term_id", term_id)
            .value("year", i64::from(request.year))
            .value("month", i64::from(request.month))
            .value("option_code", option_code.clone())
            .value("amount_idr", amount_idr)
            .value("due_date", request.due_date)
            .value("status", "unpaid");
        match tx.insert(&bill).await? {
            Some(_) => bills_created += 1,
            None => bills_skipped += 1,
        }
    }
    tx.commit().await?;

    tracing::info!(
        tenant_id = %tenant.tenant_id,
        %batch_id,
        bills_created,
        bills_skipped,
        "bill batch generated"
    );

    if let Some(decorate) = BILL_BATCHES.decorate {
        decorate(&mut batch);
    }
    Ok(ApiResponse::success(
        "bill batch generated",
        json!({"batch": batch, "bills_created": bills_created, "bills_skipped": bills_skipped}),
    )?
    .created())
}

/// The term must be a live term of this tenant
async fn ensure_term(store: &dyn Store, tenant: &TenantScope, term_id: Uuid) -> Result<(), ApiError> {
    let filter = by_id(&ACADEMIC_TERMS, tenant, &term_id.to_string())?;
    store.fetch_one(&filter).await?.ok_or_else(|| not_found(&ACADEMIC_TERMS))?;
    Ok(())
}

/// Live sections of the tenant, all of them or the requested ones. Unknown ids are a 404.
async fn load_sections(store: &dyn Store, tenant: &TenantScope, ids: &[Uuid]) -> Result<Vec<Row>, ApiError> {
    let mut filter = CLASS_SECTIONS.scoped_filter(tenant)?;
    let requested: BTreeSet<Uuid> = ids.iter().copied().collect();
    if !requested.is_empty() {
        filter.where_condition(Condition::In {
            column: "id".to_string(),
            values: requested.iter().copied().map(SqlValue::Uuid).collect(),
        })?;
    }
    filter.order(vec![
        FilterOrderInfo { column: "name".to_string(), sort: SortDirection::Asc },
        FilterOrderInfo { column: "id".to_string(), sort: SortDirection::Asc },
    ])?;

    let sections = store.fetch(&filter).await?;
    if sections.len() < requested.len() {
        return Err(not_found(&CLASS_SECTIONS));
    }
    Ok(sections)
}

async fn billable_students(store: &dyn Store, tenant: &TenantScope, section_ids: &[Uuid]) -> Result<Vec<Row>, ApiError> {
    let mut filter = STUDENTS.scoped_filter(tenant)?;
    filter.where_condition(Condition::eq("status", "active"))?;
    if !section_ids.is_empty() {
        filter.where_condition(Condition::In {
            column: "class_section_id".to_string(),
            values: section_ids.iter().copied().map(SqlValue::Uuid).collect(),
        })?;
    }
    filter.order(vec![FilterOrderInfo { column: "id".to_string(), sort: SortDirection::Asc }])?;
    Ok(store.fetch(&filter).await?)
}
