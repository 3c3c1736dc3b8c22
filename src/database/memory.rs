//! In-process [`Store`] used by the integration tests and `serve --memory`.
//!
//! Conditions are evaluated against JSON rows with the same semantics the
//! PostgreSQL store gets from SQL: NULL never compares, `ASC` sorts nulls
//! last, `DESC` sorts them first.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tokio::sync::{RwLock, RwLockWriteGuard};
use uuid::Uuid;

use super::manager::DatabaseError;
use super::store::{is_alive, CounterBump, Insert, OnConflict, Row, Store, Transaction};
use crate::filter::{Condition, Filter, FilterOp, FilterOrderInfo, SortDirection, SqlValue};

/// Unique index mirrored from the migrations
#[derive(Debug, Clone, Copy)]
pub struct UniqueConstraint {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [&'static str],
    /// Partial index over rows with `deleted_at IS NULL`
    pub live_only: bool,
}

pub const UNIQUE_CONSTRAINTS: &[UniqueConstraint] = &[
    UniqueConstraint {
        name: "fee_rules_live_option_code_key",
        table: "fee_rules",
        columns: &["tenant_id", "option_code"],
        live_only: true,
    },
    UniqueConstraint {
        name: "bill_batches_live_period_key",
        table: "bill_batches",
        columns: &["tenant_id", "fee_rule_id", "year", "month"],
        live_only: true,
    },
    UniqueConstraint {
        name: "student_bills_batch_student_key",
        table: "student_bills",
        columns: &["batch_id", "student_id"],
        live_only: false,
    },
    UniqueConstraint {
        name: "attendance_records_live_lecture_student_key",
        table: "attendance_records",
        columns: &["lecture_id", "student_id"],
        live_only: true,
    },
    UniqueConstraint {
        name: "semester_stats_student_term_key",
        table: "semester_stats",
        columns: &["tenant_id", "student_id", "term_id"],
        live_only: false,
    },
];

const DELETED_AT: &str = "deleted_at";

type Tables = HashMap<String, Vec<Row>>;

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    queries: RwLock<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a row as-is, skipping constraint checks. `created_at` is filled when absent.
    pub async fn seed(&self, table: &str, row: Value) -> Row {
        let mut row = match row {
            Value::Object(map) => map,
            _ => Row::new(),
        };
        row.entry("created_at")
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.read().await.get(table).cloned().unwrap_or_default()
    }

    /// Statements issued so far, in order
    pub async fn queries(&self) -> Vec<String> {
        self.queries.read().await.clone()
    }

    pub async fn reset_queries(&self) {
        self.queries.write().await.clear();
    }

    async fn log(&self, statement: String) {
        tracing::trace!("memory store: {}", statement);
        self.queries.write().await.push(statement);
    }

    fn select(rows: &[Row], filter: &Filter) -> Vec<Row> {
        let mut selected: Vec<Row> = rows
            .iter()
            .filter(|row| matches_all(row, filter.conditions()))
            .cloned()
            .collect();
        selected.sort_by(|a, b| compare_rows(a, b, filter.order_data()));

        let offset = filter.offset_value().unwrap_or(0).max(0) as usize;
        let iter = selected.into_iter().skip(offset);
        match filter.limit_value() {
            Some(limit) => iter.take(limit.max(0) as usize).collect(),
            None => iter.collect(),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn count(&self, filter: &Filter) -> Result<i64, DatabaseError> {
        self.log(filter.to_count_sql().query).await;
        let tables = self.tables.read().await;
        let count = tables
            .get(filter.table_name())
            .map(|rows| rows.iter().filter(|row| matches_all(row, filter.conditions())).count())
            .unwrap_or(0);
        Ok(count as i64)
    }

    async fn fetch(&self, filter: &Filter) -> Result<Vec<Row>, DatabaseError> {
        self.log(filter.to_sql().query).await;
        let tables = self.tables.read().await;
        Ok(tables
            .get(filter.table_name())
            .map(|rows| Self::select(rows, filter))
            .unwrap_or_default())
    }

    async fn insert(&self, insert: &Insert) -> Result<Option<Row>, DatabaseError> {
        self.log(format!("INSERT INTO \"{}\"", insert.table)).await;
        insert_row(&mut *self.tables.write().await, insert)
    }

    async fn soft_delete(&self, filter: &Filter, column: &str) -> Result<u64, DatabaseError> {
        self.log(filter.to_soft_delete_sql(column, Utc::now())?.query).await;
        Ok(soft_delete_rows(&mut *self.tables.write().await, filter, column))
    }

    async fn bump_counter(&self, bump: &CounterBump) -> Result<u64, DatabaseError> {
        self.log(bump.filter.to_counter_sql(&bump.column, bump.delta)?.query).await;
        Ok(bump_rows(&mut *self.tables.write().await, bump))
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn Transaction + 'a>, DatabaseError> {
        let tables = self.tables.write().await;
        let snapshot = Some(tables.clone());
        Ok(Box::new(MemoryTransaction { store: self, tables, snapshot }))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Holds the table lock for its whole life, so transactions run one at a time.
/// The snapshot is put back on drop unless the transaction committed.
struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    tables: RwLockWriteGuard<'a, Tables>,
    snapshot: Option<Tables>,
}

#[async_trait]
impl Transaction for MemoryTransaction<'_> {
    async fn insert(&mut self, insert: &Insert) -> Result<Option<Row>, DatabaseError> {
        self.store.log(format!("INSERT INTO \"{}\"", insert.table)).await;
        insert_row(&mut self.tables, insert)
    }

    async fn soft_delete(&mut self, filter: &Filter, column: &str) -> Result<u64, DatabaseError> {
        self.store.log(filter.to_soft_delete_sql(column, Utc::now())?.query).await;
        Ok(soft_delete_rows(&mut self.tables, filter, column))
    }

    async fn bump_counter(&mut self, bump: &CounterBump) -> Result<u64, DatabaseError> {
        self.store.log(bump.filter.to_counter_sql(&bump.column, bump.delta)?.query).await;
        Ok(bump_rows(&mut self.tables, bump))
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        let mut tx = self;
        tx.snapshot = None;
        Ok(())
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            tracing::debug!("memory store: rolling back");
            *self.tables = snapshot;
        }
    }
}

fn insert_row(tables: &mut Tables, insert: &Insert) -> Result<Option<Row>, DatabaseError> {
    let row: Row = insert
        .values
        .iter()
        .map(|(column, value)| (column.clone(), value.to_json()))
        .collect();
    let rows = tables.entry(insert.table.clone()).or_default();

    let violated = UNIQUE_CONSTRAINTS
        .iter()
        .filter(|c| c.table == insert.table)
        .filter(|c| !c.live_only || is_alive(&row, DELETED_AT))
        .find(|c| {
            rows.iter().any(|existing| {
                (!c.live_only || is_alive(existing, DELETED_AT))
                    && c.columns.iter().all(|col| {
                        let value = row.get(*col).unwrap_or(&Value::Null);
                        !value.is_null() && existing.get(*col) == Some(value)
                    })
            })
        });

    match (violated, insert.on_conflict) {
        (Some(constraint), OnConflict::Fail) => Err(DatabaseError::UniqueViolation(constraint.name.to_string())),
        (Some(_), OnConflict::Ignore) => Ok(None),
        (None, _) => {
            rows.push(row.clone());
            Ok(Some(row))
        }
    }
}

fn soft_delete_rows(tables: &mut Tables, filter: &Filter, column: &str) -> u64 {
    let now = Value::String(Utc::now().to_rfc3339());
    let mut affected = 0;
    if let Some(rows) = tables.get_mut(filter.table_name()) {
        for row in rows.iter_mut().filter(|row| matches_all(row, filter.conditions())) {
            row.insert(column.to_string(), now.clone());
            affected += 1;
        }
    }
    affected
}

fn bump_rows(tables: &mut Tables, bump: &CounterBump) -> u64 {
    let now = Value::String(Utc::now().to_rfc3339());
    let mut affected = 0;
    if let Some(rows) = tables.get_mut(bump.filter.table_name()) {
        for row in rows.iter_mut().filter(|row| matches_all(row, bump.filter.conditions())) {
            let current = row.get(&bump.column).and_then(Value::as_i64).unwrap_or(0);
            row.insert(bump.column.clone(), Value::from((current + bump.delta).max(0)));
            row.insert("updated_at".to_string(), now.clone());
            affected += 1;
        }
    }
    affected
}

fn matches_all(row: &Row, conditions: &[Condition]) -> bool {
    conditions.iter().all(|c| matches(row, c))
}

fn matches(row: &Row, condition: &Condition) -> bool {
    match condition {
        Condition::Compare { column, op, value } => {
            let cell = row.get(column).unwrap_or(&Value::Null);
            match (op, value) {
                (FilterOp::Eq, SqlValue::Null) => cell.is_null(),
                (FilterOp::Eq, _) => compare_cell(cell, value) == Some(Ordering::Equal),
                (FilterOp::IEq, SqlValue::Text(text)) => {
                    cell.as_str().map_or(false, |s| s.to_lowercase() == text.to_lowercase())
                }
                (FilterOp::ILike, SqlValue::Text(pattern)) => {
                    cell.as_str().map_or(false, |s| like_match(&s.to_lowercase(), &pattern.to_lowercase()))
                }
                (FilterOp::IEq, _) | (FilterOp::ILike, _) => false,
                (FilterOp::Gte, _) => matches!(compare_cell(cell, value), Some(Ordering::Greater | Ordering::Equal)),
                (FilterOp::Lt, _) => compare_cell(cell, value) == Some(Ordering::Less),
                (FilterOp::Lte, _) => matches!(compare_cell(cell, value), Some(Ordering::Less | Ordering::Equal)),
            }
        }
        Condition::In { column, values } => {
            let cell = row.get(column).unwrap_or(&Value::Null);
            values.iter().any(|v| compare_cell(cell, v) == Some(Ordering::Equal))
        }
        Condition::IsNull(column) => row.get(column).map_or(true, Value::is_null),
        Condition::AnyOf(group) => group.iter().any(|c| matches(row, c)),
    }
}

/// Typed comparison of a JSON cell against a bound value; `None` when either side is NULL
/// or the cell does not hold the value's type.
fn compare_cell(cell: &Value, value: &SqlValue) -> Option<Ordering> {
    match value {
        SqlValue::Null => None,
        SqlValue::Bool(b) => Some(cell.as_bool()?.cmp(b)),
        SqlValue::Int(i) => Some(cell.as_i64()?.cmp(i)),
        SqlValue::Text(s) => Some(cell.as_str()?.cmp(s.as_str())),
        SqlValue::Uuid(u) => Some(Uuid::parse_str(cell.as_str()?).ok()?.cmp(u)),
        SqlValue::Date(d) => Some(parse_date(cell.as_str()?)?.cmp(d)),
        SqlValue::Timestamp(ts) => Some(parse_timestamp(cell.as_str()?)?.cmp(ts)),
        SqlValue::Json(v) => (cell == v).then_some(Ordering::Equal),
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|ts| ts.with_timezone(&Utc))
}

fn compare_rows(a: &Row, b: &Row, order: &[FilterOrderInfo]) -> Ordering {
    for info in order {
        let left = a.get(&info.column).unwrap_or(&Value::Null);
        let right = b.get(&info.column).unwrap_or(&Value::Null);
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            // Postgres: NULLS LAST for ASC, NULLS FIRST for DESC
            (true, false) => match info.sort {
                SortDirection::Asc => Ordering::Greater,
                SortDirection::Desc => Ordering::Less,
            },
            (false, true) => match info.sort {
                SortDirection::Asc => Ordering::Less,
                SortDirection::Desc => Ordering::Greater,
            },
            (false, false) => match info.sort {
                SortDirection::Asc => compare_values(left, right),
                SortDirection::Desc => compare_values(right, left),
            },
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .unwrap_or(0.0)
                .partial_cmp(&y.as_f64().unwrap_or(0.0))
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x.cmp(y),
        },
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[derive(Debug, PartialEq)]
enum LikeToken {
    AnyRun,
    AnyOne,
    Literal(char),
}

fn like_tokens(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '\\' => LikeToken::Literal(chars.next().unwrap_or('\\')),
            '%' => LikeToken::AnyRun,
            '_' => LikeToken::AnyOne,
            other => LikeToken::Literal(other),
        });
    }
    tokens
}

/// SQL `LIKE` with `\` as the escape character
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let tokens = like_tokens(pattern);
    // matched[j]: tokens[..i] match text[..j]
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;
    for token in &tokens {
        let mut next = vec![false; text.len() + 1];
        for j in 0..=text.len() {
            next[j] = match token {
                LikeToken::AnyRun => matched[j] || (j > 0 && next[j - 1]),
                LikeToken::AnyOne => j > 0 && matched[j - 1],
                LikeToken::Literal(c) => j > 0 && matched[j - 1] && text[j - 1] == *c,
            };
        }
        matched = next;
    }
    matched[text.len()]
}
