use serde_json::Value;

use super::EntitySpec;
use crate::database::Row;
use crate::filter::{FieldType, FilterField, FilterSpec, PeriodColumns, PeriodFilter, SortField, SortSpec};
use crate::relations::{Relation, RelationLink};
use crate::tenancy::Role;

const BILLING_PERIOD: PeriodFilter = PeriodFilter {
    term_column: "term_id",
    fallback: PeriodColumns::YearMonth { year_column: "year", month_column: "month" },
};

pub static FEE_RULES: EntitySpec = EntitySpec {
    resource: "fee-rules",
    table: "fee_rules",
    tenant_column: "tenant_id",
    key_column: "id",
    deleted_column: Some("deleted_at"),
    filters: FilterSpec {
        fields: &[
            FilterField::eq("status", "status", FieldType::Text),
            FilterField::ieq("option_code", "option_code"),
            FilterField::eq("term_id", "term_id", FieldType::Uuid),
        ],
        period: None,
        search: &["name", "option_code"],
    },
    sort: SortSpec {
        fields: &[
            SortField { key: "created_at", column: "created_at" },
            SortField { key: "amount", column: "amount_idr" },
            SortField { key: "amount_idr", column: "amount_idr" },
            SortField { key: "name", column: "name" },
            SortField { key: "option_code", column: "option_code" },
        ],
        default_key: "created_at",
        strict: false,
    },
    relations: &[RelationLink::new(Relation::AcademicTerm, "term_id")],
    read_role: Role::Member,
    write_role: Role::Admin,
    singular: "fee rule",
    plural: "fee rules",
    decorate: None,
};

pub static BILL_BATCHES: EntitySpec = EntitySpec {
    resource: "bill-batches",
    table: "bill_batches",
    tenant_column: "tenant_id",
    key_column: "id",
    deleted_column: Some("deleted_at"),
    filters: FilterSpec {
        fields: &[
            FilterField::eq("status", "status", FieldType::Text),
            FilterField::eq("fee_rule_id", "fee_rule_id", FieldType::Uuid),
            FilterField::ieq("option_code", "option_code"),
            FilterField::from_date("date_from", "due_date"),
            FilterField::to_date("date_to", "due_date"),
        ],
        period: Some(BILLING_PERIOD),
        search: &["title", "fee_rule_name"],
    },
    sort: SortSpec {
        fields: &[
            SortField { key: "created_at", column: "created_at" },
            SortField { key: "due_date", column: "due_date" },
            SortField { key: "year", column: "year" },
            SortField { key: "month", column: "month" },
            SortField { key: "amount", column: "amount_idr" },
        ],
        default_key: "created_at",
        strict: false,
    },
    relations: &[
        RelationLink::new(Relation::FeeRule, "fee_rule_id"),
        RelationLink::new(Relation::AcademicTerm, "term_id"),
    ],
    read_role: Role::Teacher,
    write_role: Role::Admin,
    singular: "bill batch",
    plural: "bill batches",
    decorate: Some(decode_class_sections),
};

pub static STUDENT_BILLS: EntitySpec = EntitySpec {
    resource: "student-bills",
    table: "student_bills",
    tenant_column: "tenant_id",
    key_column: "id",
    deleted_column: Some("deleted_at"),
    filters: FilterSpec {
        fields: &[
            FilterField::eq("status", "status", FieldType::Text),
            FilterField::eq("batch_id", "batch_id", FieldType::Uuid),
            FilterField::eq("student_id", "student_id", FieldType::Uuid),
            FilterField::ieq("option_code", "option_code"),
            FilterField::from_date("date_from", "due_date"),
            FilterField::to_date("date_to", "due_date"),
        ],
        period: Some(BILLING_PERIOD),
        search: &["option_code"],
    },
    sort: SortSpec {
        fields: &[
            SortField { key: "created_at", column: "created_at" },
            SortField { key: "due_date", column: "due_date" },
            SortField { key: "amount", column: "amount_idr" },
            SortField { key: "year", column: "year" },
            SortField { key: "month", column: "month" },
        ],
        default_key: "due_date",
        strict: false,
    },
    relations: &[
        RelationLink::new(Relation::BillBatch, "batch_id"),
        RelationLink::new(Relation::Student, "student_id"),
        RelationLink::new(Relation::AcademicTerm, "term_id"),
    ],
    read_role: Role::Member,
    write_role: Role::Admin,
    singular: "student bill",
    plural: "student bills",
    decorate: None,
};

/// Replace the JSON-encoded `class_sections_snapshot` column with a `class_sections`
/// array. Missing or undecodable snapshots become `[]`.
pub fn decode_class_sections(row: &mut Row) {
    let sections = match row.remove("class_sections_snapshot") {
        Some(Value::Array(items)) => Value::Array(items),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => Value::Array(items),
            Ok(_) | Err(_) => {
                tracing::debug!("class_sections_snapshot is not a JSON array, using []");
                Value::Array(Vec::new())
            }
        },
        _ => Value::Array(Vec::new()),
    };
    row.insert("class_sections".to_string(), sections);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decoded(row: Value) -> Value {
        let mut row = row.as_object().cloned().unwrap();
        decode_class_sections(&mut row);
        row["class_sections"].clone()
    }

    #[test]
    fn raw_snapshot_column_is_removed() {
        let mut row = json!({"class_sections_snapshot": "[]", "name": "May"}).as_object().cloned().unwrap();
        decode_class_sections(&mut row);
        assert!(!row.contains_key("class_sections_snapshot"));
        assert_eq!(row["class_sections"], json!([]));
    }

    #[test]
    fn snapshot_decodes_to_array() {
        let sections = decoded(json!({"class_sections_snapshot": "[{\"id\":\"a\",\"name\":\"7A\",\"grade\":\"7\"}]"}));
        assert_eq!(sections[0]["name"], "7A");
    }

    #[test]
    fn broken_or_missing_snapshot_is_empty_array() {
        assert_eq!(decoded(json!({"class_sections_snapshot": "{not json"})), json!([]));
        assert_eq!(decoded(json!({"class_sections_snapshot": "{\"a\":1}"})), json!([]));
        assert_eq!(decoded(json!({"class_sections_snapshot": null})), json!([]));
        assert_eq!(decoded(json!({})), json!([]));
    }
}
