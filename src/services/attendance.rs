use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::{text_field, uuid_field};
use crate::database::{CounterBump, Insert, OnConflict, Store, Transaction};
use crate::entities::{ATTENDANCE, LECTURES, SEMESTER_STATS, STUDENTS};
use crate::error::ApiError;
use crate::filter::Condition;
use crate::middleware::ApiResponse;
use crate::pipeline::{by_id, not_found};
use crate::tenancy::{authorize, CallerIdentity, TenantScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    #[serde(alias = "permit", alias = "sick")]
    Excused,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Excused => "excused",
            AttendanceStatus::Late => "late",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "excused" | "permit" | "sick" => Some(AttendanceStatus::Excused),
            "late" => Some(AttendanceStatus::Late),
            _ => None,
        }
    }

    /// `semester_stats` column counting this status
    pub fn counter_column(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present_count",
            AttendanceStatus::Absent => "absent_count",
            AttendanceStatus::Excused => "excused_count",
            AttendanceStatus::Late => "late_count",
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordAttendance {
    pub lecture_id: Uuid,
    pub student_id: Uuid,
    pub status: AttendanceStatus,
    /// Defaults to the lecture date, then today
    pub recorded_on: Option<NaiveDate>,
    #[validate(length(max = 500, message = "note must be at most 500 characters"))]
    pub note: Option<String>,
}

/// Record one student's attendance for a lecture and count it in the semester stats
/// of the lecture's term. The record and the counter change commit together.
pub async fn record_attendance(
    store: &dyn Store,
    caller: &CallerIdentity,
    tenant: &TenantScope,
    request: RecordAttendance,
) -> Result<ApiResponse, ApiError> {
    authorize(Some(caller), tenant, ATTENDANCE.write_role)?;
    request.validate()?;

    let lecture = store
        .fetch_one(&by_id(&LECTURES, tenant, &request.lecture_id.to_string())?)
        .await?
        .ok_or_else(|| not_found(&LECTURES))?;
    store
        .fetch_one(&by_id(&STUDENTS, tenant, &request.student_id.to_string())?)
        .await?
        .ok_or_else(|| not_found(&STUDENTS))?;

    let term_id = uuid_field(&lecture, "term_id");
    let recorded_on = request
        .recorded_on
        .or_else(|| text_field(&lecture, "held_on").and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
        .unwrap_or_else(|| Utc::now().date_naive());

    let insert = Insert::new(ATTENDANCE.table, OnConflict::Fail)
        .value("tenant_id", tenant.tenant_id)
        .value("lecture_id", request.lecture_id)
        .value("student_id", request.student_id)
        .value("term_id", term_id)
        .value("status", request.status.as_str())
        .value("recorded_on", recorded_on)
        .value("note", request.note)
        .value("recorded_by", caller.user_id);

    let mut tx = store.begin().await?;
    let record = tx
        .insert(&insert)
        .await
        .map_err(|e| ApiError::conflict_or(e, "attendance already recorded for this student and lecture"))?
        .ok_or_else(|| ApiError::internal_server_error("attendance was not recorded"))?;

    match term_id {
        Some(term_id) => {
            adjust_semester_stats(tx.as_mut(), tenant, request.student_id, term_id, request.status, 1).await?
        }
        None => tracing::debug!(lecture_id = %request.lecture_id, "lecture has no term, stats not updated"),
    }
    tx.commit().await?;

    Ok(ApiResponse::item("attendance recorded", record, None).created())
}

/// Soft delete an attendance record and take it back out of the semester stats
pub async fn delete_attendance(
    store: &dyn Store,
    caller: &CallerIdentity,
    tenant: &TenantScope,
    id: &str,
) -> Result<ApiResponse, ApiError> {
    authorize(Some(caller), tenant, ATTENDANCE.write_role)?;

    let filter = by_id(&ATTENDANCE, tenant, id)?;
    let record = store.fetch_one(&filter).await?.ok_or_else(|| not_found(&ATTENDANCE))?;

    // Only the request that actually flips deleted_at may decrement
    let mut tx = store.begin().await?;
    let affected = tx.soft_delete(&filter, "deleted_at").await?;
    if affected == 0 {
        return Err(not_found(&ATTENDANCE));
    }

    let student_id = uuid_field(&record, "student_id");
    let term_id = uuid_field(&record, "term_id");
    let status = text_field(&record, "status").and_then(AttendanceStatus::parse);
    if let (Some(student_id), Some(term_id), Some(status)) = (student_id, term_id, status) {
        adjust_semester_stats(tx.as_mut(), tenant, student_id, term_id, status, -1).await?;
    }
    tx.commit().await?;

    Ok(ApiResponse::success("attendance record deleted", json!({ "id": id }))?)
}

/// Make sure the stats row exists, then apply `delta` to the status counter in one
/// statement. Counters are clamped at zero by the store.
pub async fn adjust_semester_stats(
    tx: &mut (dyn Transaction + '_),
    tenant: &TenantScope,
    student_id: Uuid,
    term_id: Uuid,
    status: AttendanceStatus,
    delta: i64,
) -> Result<(), ApiError> {
    let seed = Insert::new(SEMESTER_STATS.table, OnConflict::Ignore)
        .value("tenant_id", tenant.tenant_id)
        .value("student_id", student_id)
        .value("term_id", term_id)
        .value("present_count", 0i64)
        .value("absent_count", 0i64)
        .value("excused_count", 0i64)
        .value("late_count", 0i64);
    tx.insert(&seed).await?;

    let mut filter = SEMESTER_STATS.scoped_filter(tenant)?;
    filter
        .where_condition(Condition::eq("student_id", student_id))?
        .where_condition(Condition::eq("term_id", term_id))?;
    tx.bump_counter(&CounterBump {
        filter,
        column: status.counter_column().to_string(),
        delta,
    })
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::faulty::FaultyStore;
    use crate::database::{is_alive, MemoryStore};
    use crate::tenancy::Role;
    use std::collections::HashMap;

    struct Fixture {
        store: MemoryStore,
        tenant: TenantScope,
        teacher: CallerIdentity,
        lecture: Uuid,
        student: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let tenant_id = Uuid::new_v4();
        let (lecture, student, term) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store
            .seed("lectures", json!({"id": lecture, "tenant_id": tenant_id, "term_id": term, "held_on": "2024-03-05"}))
            .await;
        store
            .seed("students", json!({"id": student, "tenant_id": tenant_id, "status": "active"}))
            .await;
        Fixture {
            store,
            tenant: TenantScope::new(tenant_id),
            teacher: CallerIdentity {
                user_id: Uuid::new_v4(),
                roles: Default::default(),
                tenant_memberships: HashMap::from([(tenant_id, Role::Teacher)]),
                active_tenant: Some(tenant_id),
            },
            lecture,
            student,
        }
    }

    fn record(f: &Fixture, status: AttendanceStatus) -> RecordAttendance {
        RecordAttendance {
            lecture_id: f.lecture,
            student_id: f.student,
            status,
            recorded_on: None,
            note: None,
        }
    }

    #[test]
    fn status_aliases() {
        assert_eq!(AttendanceStatus::parse("Sick"), Some(AttendanceStatus::Excused));
        assert_eq!(AttendanceStatus::parse("gone"), None);
    }

    #[tokio::test]
    async fn record_bumps_and_delete_restores_stats() {
        let f = fixture().await;
        let response = record_attendance(&f.store, &f.teacher, &f.tenant, record(&f, AttendanceStatus::Absent))
            .await
            .unwrap();
        assert_eq!(response.data["recorded_on"], "2024-03-05");
        let stats = f.store.rows("semester_stats").await;
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0]["absent_count"], 1);

        let err = record_attendance(&f.store, &f.teacher, &f.tenant, record(&f, AttendanceStatus::Absent))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);

        let id = response.data["id"].as_str().unwrap().to_string();
        delete_attendance(&f.store, &f.teacher, &f.tenant, &id).await.unwrap();
        assert_eq!(f.store.rows("semester_stats").await[0]["absent_count"], 0);

        // Second delete finds nothing and leaves the counter alone
        let err = delete_attendance(&f.store, &f.teacher, &f.tenant, &id).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(f.store.rows("semester_stats").await[0]["absent_count"], 0);
    }

    #[tokio::test]
    async fn decrement_is_clamped_at_zero() {
        let f = fixture().await;
        let term = Uuid::new_v4();
        let mut tx = f.store.begin().await.unwrap();
        adjust_semester_stats(tx.as_mut(), &f.tenant, f.student, term, AttendanceStatus::Late, -1)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(f.store.rows("semester_stats").await[0]["late_count"], 0);
    }

    #[tokio::test]
    async fn members_cannot_record() {
        let f = fixture().await;
        let mut member = f.teacher.clone();
        member.tenant_memberships.insert(f.tenant.tenant_id, Role::Member);
        let err = record_attendance(&f.store, &member, &f.tenant, record(&f, AttendanceStatus::Present))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn failed_stats_write_drops_the_record() {
        let f = fixture().await;
        let (first, retry) = (record(&f, AttendanceStatus::Present), record(&f, AttendanceStatus::Present));
        let store = FaultyStore::new(f.store, "semester_stats", 1);

        let err = record_attendance(&store, &f.teacher, &f.tenant, first).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(store.inner.rows("attendance_records").await.is_empty());
        assert!(store.inner.rows("semester_stats").await.is_empty());

        record_attendance(&store, &f.teacher, &f.tenant, retry).await.unwrap();
        assert_eq!(store.inner.rows("attendance_records").await.len(), 1);
        assert_eq!(store.inner.rows("semester_stats").await[0]["present_count"], 1);
    }

    #[tokio::test]
    async fn failed_decrement_keeps_the_record_alive() {
        let f = fixture().await;
        let request = record(&f, AttendanceStatus::Absent);
        // Recording writes the stats seed and bump, so the third stats write is the
        // seed issued by the delete
        let store = FaultyStore::new(f.store, "semester_stats", 3);
        let created = record_attendance(&store, &f.teacher, &f.tenant, request).await.unwrap();
        let id = created.data["id"].as_str().unwrap().to_string();

        let err = delete_attendance(&store, &f.teacher, &f.tenant, &id).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        let records = store.inner.rows("attendance_records").await;
        assert!(is_alive(&records[0], "deleted_at"));
        assert_eq!(store.inner.rows("semester_stats").await[0]["absent_count"], 1);

        delete_attendance(&store, &f.teacher, &f.tenant, &id).await.unwrap();
        let records = store.inner.rows("attendance_records").await;
        assert!(!is_alive(&records[0], "deleted_at"));
        assert_eq!(store.inner.rows("semester_stats").await[0]["absent_count"], 0);
    }
}
