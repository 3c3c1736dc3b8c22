//! Compile-time whitelists describing which query-string keys an entity
//! accepts and how each maps onto a column.

use chrono::NaiveDate;
use uuid::Uuid;

use super::types::{FilterOp, SqlValue};

/// How a whitelisted filter compares its column against the request value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Eq,
    IEq,
    Gte,
    Lte,
}

impl FilterKind {
    pub fn op(&self) -> FilterOp {
        match self {
            FilterKind::Eq => FilterOp::Eq,
            FilterKind::IEq => FilterOp::IEq,
            FilterKind::Gte => FilterOp::Gte,
            FilterKind::Lte => FilterOp::Lte,
        }
    }
}

/// Value type used to parse the raw query-string value before binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Int,
    Uuid,
    Date,
    Bool,
}

impl FieldType {
    pub fn parse(&self, raw: &str) -> Option<SqlValue> {
        let raw = raw.trim();
        match self {
            FieldType::Text => {
                if raw.is_empty() {
                    None
                } else {
                    Some(SqlValue::Text(raw.to_string()))
                }
            }
            FieldType::Int => raw.parse::<i64>().ok().map(SqlValue::Int),
            FieldType::Uuid => Uuid::parse_str(raw).ok().map(SqlValue::Uuid),
            FieldType::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().map(SqlValue::Date),
            FieldType::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(SqlValue::Bool(true)),
                "false" | "0" => Some(SqlValue::Bool(false)),
                _ => None,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Int => "integer",
            FieldType::Uuid => "uuid",
            FieldType::Date => "date (YYYY-MM-DD)",
            FieldType::Bool => "boolean",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FilterField {
    pub param: &'static str,
    pub column: &'static str,
    pub kind: FilterKind,
    pub value_type: FieldType,
}

impl FilterField {
    pub const fn eq(param: &'static str, column: &'static str, value_type: FieldType) -> Self {
        Self { param, column, kind: FilterKind::Eq, value_type }
    }

    pub const fn ieq(param: &'static str, column: &'static str) -> Self {
        Self { param, column, kind: FilterKind::IEq, value_type: FieldType::Text }
    }

    pub const fn from_date(param: &'static str, column: &'static str) -> Self {
        Self { param, column, kind: FilterKind::Gte, value_type: FieldType::Date }
    }

    pub const fn to_date(param: &'static str, column: &'static str) -> Self {
        Self { param, column, kind: FilterKind::Lte, value_type: FieldType::Date }
    }
}

/// Where the `year`/`month` fallback of a period filter lands
#[derive(Debug, Clone, Copy)]
pub enum PeriodColumns {
    /// Integer year and month columns
    YearMonth {
        year_column: &'static str,
        month_column: &'static str,
    },
    /// Half-open range over a date column
    DateRange { column: &'static str },
}

/// Two mutually exclusive ways of selecting a period: a specific term id, or
/// the `year` (+ optional `month`) composite fallback.
#[derive(Debug, Clone, Copy)]
pub struct PeriodFilter {
    pub term_column: &'static str,
    pub fallback: PeriodColumns,
}

#[derive(Debug, Clone, Copy)]
pub struct FilterSpec {
    pub fields: &'static [FilterField],
    pub period: Option<PeriodFilter>,
    /// Columns matched by the `q` parameter
    pub search: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct SortField {
    pub key: &'static str,
    pub column: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct SortSpec {
    pub fields: &'static [SortField],
    pub default_key: &'static str,
    /// Reject unknown sort keys instead of falling back to the default
    pub strict: bool,
}

impl SortSpec {
    pub fn column_for(&self, key: &str) -> Option<&'static str> {
        self.fields.iter().find(|f| f.key == key).map(|f| f.column)
    }

    pub fn default_column(&self) -> &'static str {
        self.column_for(self.default_key).unwrap_or("created_at")
    }
}
