use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::manager::DatabaseError;
use crate::filter::{Filter, SqlValue};

/// A fetched row, keyed by column name
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    /// Surface the violation as [`DatabaseError::UniqueViolation`]
    Fail,
    /// `ON CONFLICT DO NOTHING`; the insert yields no row
    Ignore,
}

/// A single-row insert. `id`, `created_at` and `updated_at` are filled in
/// by [`Insert::new`] so every store writes the same shape.
#[derive(Debug, Clone)]
pub struct Insert {
    pub table: String,
    pub values: Vec<(String, SqlValue)>,
    pub on_conflict: OnConflict,
}

impl Insert {
    pub fn new(table: impl Into<String>, on_conflict: OnConflict) -> Self {
        let now = Utc::now();
        Self {
            table: table.into(),
            values: vec![
                ("id".to_string(), SqlValue::Uuid(Uuid::new_v4())),
                ("created_at".to_string(), SqlValue::Timestamp(now)),
                ("updated_at".to_string(), SqlValue::Timestamp(now)),
            ],
            on_conflict,
        }
    }

    /// Set a column, replacing an earlier value for the same column
    pub fn value(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        match self.values.iter_mut().find(|(c, _)| c == column) {
            Some(slot) => slot.1 = value,
            None => self.values.push((column.to_string(), value)),
        }
        self
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }
}

/// Atomic `column += delta` clamped at zero, over the rows a filter selects
#[derive(Debug, Clone)]
pub struct CounterBump {
    pub filter: Filter,
    pub column: String,
    pub delta: i64,
}

/// Relational storage used by the request pipeline and the write services.
///
/// Every read and write takes a [`Filter`], which always carries the tenant
/// predicate.
#[async_trait]
pub trait Store: Send + Sync {
    async fn count(&self, filter: &Filter) -> Result<i64, DatabaseError>;

    async fn fetch(&self, filter: &Filter) -> Result<Vec<Row>, DatabaseError>;

    async fn fetch_one(&self, filter: &Filter) -> Result<Option<Row>, DatabaseError> {
        let mut filter = filter.clone();
        filter.limit(1, None);
        Ok(self.fetch(&filter).await?.into_iter().next())
    }

    async fn insert(&self, insert: &Insert) -> Result<Option<Row>, DatabaseError>;

    /// Stamp `column` with the current time; returns affected rows
    async fn soft_delete(&self, filter: &Filter, column: &str) -> Result<u64, DatabaseError>;

    async fn bump_counter(&self, bump: &CounterBump) -> Result<u64, DatabaseError>;

    /// Open a unit of work. Do all reads first: a store may hold its write
    /// lock until the transaction ends.
    async fn begin<'a>(&'a self) -> Result<Box<dyn Transaction + 'a>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

/// Writes that become visible together on [`Transaction::commit`].
/// Dropping a transaction without committing rolls all of them back.
#[async_trait]
pub trait Transaction: Send {
    async fn insert(&mut self, insert: &Insert) -> Result<Option<Row>, DatabaseError>;

    async fn soft_delete(&mut self, filter: &Filter, column: &str) -> Result<u64, DatabaseError>;

    async fn bump_counter(&mut self, bump: &CounterBump) -> Result<u64, DatabaseError>;

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;
}

/// A row is alive while its soft-delete column is absent or null
pub fn is_alive(row: &Row, deleted_column: &str) -> bool {
    row.get(deleted_column).map_or(true, Value::is_null)
}
