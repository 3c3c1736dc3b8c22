use super::EntitySpec;
use crate::filter::{FieldType, FilterField, FilterSpec, PeriodColumns, PeriodFilter, SortField, SortSpec};
use crate::relations::{Relation, RelationLink};
use crate::tenancy::Role;

pub static LECTURES: EntitySpec = EntitySpec {
    resource: "lectures",
    table: "lectures",
    tenant_column: "tenant_id",
    key_column: "id",
    deleted_column: Some("deleted_at"),
    filters: FilterSpec {
        fields: &[
            FilterField::eq("status", "status", FieldType::Text),
            FilterField::eq("class_section_id", "class_section_id", FieldType::Uuid),
            FilterField::eq("teacher_id", "teacher_id", FieldType::Uuid),
            FilterField::from_date("date_from", "held_on"),
            FilterField::to_date("date_to", "held_on"),
        ],
        period: Some(PeriodFilter {
            term_column: "term_id",
            fallback: PeriodColumns::DateRange { column: "held_on" },
        }),
        search: &["title"],
    },
    sort: SortSpec {
        fields: &[
            SortField { key: "held_on", column: "held_on" },
            SortField { key: "date", column: "held_on" },
            SortField { key: "title", column: "title" },
            SortField { key: "created_at", column: "created_at" },
        ],
        default_key: "held_on",
        strict: false,
    },
    relations: &[
        RelationLink::new(Relation::ClassSection, "class_section_id"),
        RelationLink::new(Relation::Teacher, "teacher_id"),
        RelationLink::new(Relation::AcademicTerm, "term_id"),
    ],
    read_role: Role::Member,
    write_role: Role::Teacher,
    singular: "lecture",
    plural: "lectures",
    decorate: None,
};

pub static ATTENDANCE: EntitySpec = EntitySpec {
    resource: "attendance",
    table: "attendance_records",
    tenant_column: "tenant_id",
    key_column: "id",
    deleted_column: Some("deleted_at"),
    filters: FilterSpec {
        fields: &[
            FilterField::eq("status", "status", FieldType::Text),
            FilterField::eq("lecture_id", "lecture_id", FieldType::Uuid),
            FilterField::eq("student_id", "student_id", FieldType::Uuid),
            FilterField::from_date("date_from", "recorded_on"),
            FilterField::to_date("date_to", "recorded_on"),
        ],
        period: Some(PeriodFilter {
            term_column: "term_id",
            fallback: PeriodColumns::DateRange { column: "recorded_on" },
        }),
        search: &["note"],
    },
    sort: SortSpec {
        fields: &[
            SortField { key: "recorded_on", column: "recorded_on" },
            SortField { key: "date", column: "recorded_on" },
            SortField { key: "status", column: "status" },
            SortField { key: "created_at", column: "created_at" },
        ],
        default_key: "recorded_on",
        strict: false,
    },
    relations: &[
        RelationLink::new(Relation::Lecture, "lecture_id"),
        RelationLink::new(Relation::Student, "student_id"),
        RelationLink::new(Relation::AcademicTerm, "term_id"),
    ],
    read_role: Role::Teacher,
    write_role: Role::Teacher,
    singular: "attendance record",
    plural: "attendance records",
    decorate: None,
};

/// Counters maintained by attendance writes; never soft-deleted
pub static SEMESTER_STATS: EntitySpec = EntitySpec {
    resource: "semester-stats",
    table: "semester_stats",
    tenant_column: "tenant_id",
    key_column: "id",
    deleted_column: None,
    filters: FilterSpec {
        fields: &[
            FilterField::eq("student_id", "student_id", FieldType::Uuid),
            FilterField::eq("term_id", "term_id", FieldType::Uuid),
        ],
        period: None,
        search: &[],
    },
    sort: SortSpec {
        fields: &[
            SortField { key: "updated_at", column: "updated_at" },
            SortField { key: "present", column: "present_count" },
            SortField { key: "absent", column: "absent_count" },
            SortField { key: "excused", column: "excused_count" },
            SortField { key: "late", column: "late_count" },
        ],
        default_key: "updated_at",
        strict: true,
    },
    relations: &[
        RelationLink::new(Relation::Student, "student_id"),
        RelationLink::new(Relation::AcademicTerm, "term_id"),
    ],
    read_role: Role::Teacher,
    write_role: Role::Admin,
    singular: "semester stat",
    plural: "semester stats",
    decorate: None,
};
