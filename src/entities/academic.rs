use super::EntitySpec;
use crate::filter::{FieldType, FilterField, FilterSpec, SortField, SortSpec};
use crate::relations::{Relation, RelationLink};
use crate::tenancy::Role;

pub static ACADEMIC_TERMS: EntitySpec = EntitySpec {
    resource: "academic-terms",
    table: "academic_terms",
    tenant_column: "tenant_id",
    key_column: "id",
    deleted_column: Some("deleted_at"),
    filters: FilterSpec {
        fields: &[
            FilterField::eq("status", "status", FieldType::Text),
            FilterField::eq("year", "year", FieldType::Int),
            FilterField::eq("semester", "semester", FieldType::Int),
            FilterField::from_date("date_from", "starts_on"),
            FilterField::to_date("date_to", "ends_on"),
        ],
        period: None,
        search: &["name"],
    },
    sort: SortSpec {
        fields: &[
            SortField { key: "starts_on", column: "starts_on" },
            SortField { key: "name", column: "name" },
            SortField { key: "year", column: "year" },
            SortField { key: "created_at", column: "created_at" },
        ],
        default_key: "starts_on",
        strict: false,
    },
    relations: &[],
    read_role: Role::Member,
    write_role: Role::Admin,
    singular: "academic term",
    plural: "academic terms",
    decorate: None,
};

pub static CLASS_SECTIONS: EntitySpec = EntitySpec {
    resource: "class-sections",
    table: "class_sections",
    tenant_column: "tenant_id",
    key_column: "id",
    deleted_column: Some("deleted_at"),
    filters: FilterSpec {
        fields: &[
            FilterField::eq("status", "status", FieldType::Text),
            FilterField::ieq("grade", "grade"),
            FilterField::eq("homeroom_teacher_id", "homeroom_teacher_id", FieldType::Uuid),
        ],
        period: None,
        search: &["name"],
    },
    sort: SortSpec {
        fields: &[
            SortField { key: "name", column: "name" },
            SortField { key: "grade", column: "grade" },
            SortField { key: "created_at", column: "created_at" },
        ],
        default_key: "name",
        strict: false,
    },
    relations: &[RelationLink::new(Relation::Teacher, "homeroom_teacher_id")],
    read_role: Role::Member,
    write_role: Role::Admin,
    singular: "class section",
    plural: "class sections",
    decorate: None,
};

pub static TEACHERS: EntitySpec = EntitySpec {
    resource: "teachers",
    table: "teachers",
    tenant_column: "tenant_id",
    key_column: "id",
    deleted_column: Some("deleted_at"),
    filters: FilterSpec {
        fields: &[
            FilterField::eq("status", "status", FieldType::Text),
            FilterField::ieq("email", "email"),
        ],
        period: None,
        search: &["full_name", "email", "phone"],
    },
    sort: SortSpec {
        fields: &[
            SortField { key: "full_name", column: "full_name" },
            SortField { key: "name", column: "full_name" },
            SortField { key: "created_at", column: "created_at" },
        ],
        default_key: "full_name",
        strict: false,
    },
    relations: &[],
    read_role: Role::Teacher,
    write_role: Role::Admin,
    singular: "teacher",
    plural: "teachers",
    decorate: None,
};

pub static STUDENTS: EntitySpec = EntitySpec {
    resource: "students",
    table: "students",
    tenant_column: "tenant_id",
    key_column: "id",
    deleted_column: Some("deleted_at"),
    filters: FilterSpec {
        fields: &[
            FilterField::eq("status", "status", FieldType::Text),
            FilterField::eq("class_section_id", "class_section_id", FieldType::Uuid),
            FilterField::ieq("gender", "gender"),
            FilterField::eq("student_number", "student_number", FieldType::Text),
        ],
        period: None,
        search: &["full_name", "student_number"],
    },
    sort: SortSpec {
        fields: &[
            SortField { key: "full_name", column: "full_name" },
            SortField { key: "name", column: "full_name" },
            SortField { key: "student_number", column: "student_number" },
            SortField { key: "created_at", column: "created_at" },
        ],
        default_key: "full_name",
        strict: false,
    },
    relations: &[RelationLink::new(Relation::ClassSection, "class_section_id")],
    read_role: Role::Teacher,
    write_role: Role::Admin,
    singular: "student",
    plural: "students",
    decorate: None,
};
