use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Executor, PgPool, Postgres, Row as _};

use super::manager::DatabaseError;
use super::store::{CounterBump, Insert, OnConflict, Row, Store, Transaction};
use crate::config::config;
use crate::filter::{Filter, SqlResult, SqlValue};

/// PostgreSQL-backed [`Store`]; rows come back through `row_to_json`
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn count(&self, filter: &Filter) -> Result<i64, DatabaseError> {
        let rows = fetch_rows(&self.pool, &filter.to_count_sql()).await?;
        match rows.first() {
            Some(row) => Ok(row.try_get::<i64, _>("count")?),
            None => Ok(0),
        }
    }

    async fn fetch(&self, filter: &Filter) -> Result<Vec<Row>, DatabaseError> {
        let rows = fetch_rows(&self.pool, &filter.to_sql()).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn insert(&self, insert: &Insert) -> Result<Option<Row>, DatabaseError> {
        let rows = fetch_rows(&self.pool, &insert_sql(insert)?).await?;
        rows.first().map(decode_row).transpose()
    }

    async fn soft_delete(&self, filter: &Filter, column: &str) -> Result<u64, DatabaseError> {
        execute(&self.pool, &filter.to_soft_delete_sql(column, Utc::now())?).await
    }

    async fn bump_counter(&self, bump: &CounterBump) -> Result<u64, DatabaseError> {
        execute(&self.pool, &bump.filter.to_counter_sql(&bump.column, bump.delta)?).await
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn Transaction + 'a>, DatabaseError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// A `BEGIN ... COMMIT` block on one pooled connection. sqlx rolls back on drop.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn insert(&mut self, insert: &Insert) -> Result<Option<Row>, DatabaseError> {
        let rows = fetch_rows(&mut *self.tx, &insert_sql(insert)?).await?;
        rows.first().map(decode_row).transpose()
    }

    async fn soft_delete(&mut self, filter: &Filter, column: &str) -> Result<u64, DatabaseError> {
        execute(&mut *self.tx, &filter.to_soft_delete_sql(column, Utc::now())?).await
    }

    async fn bump_counter(&mut self, bump: &CounterBump) -> Result<u64, DatabaseError> {
        execute(&mut *self.tx, &bump.filter.to_counter_sql(&bump.column, bump.delta)?).await
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        let PgTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}

async fn fetch_rows<'c, E>(executor: E, sql: &SqlResult) -> Result<Vec<PgRow>, DatabaseError>
where
    E: Executor<'c, Database = Postgres>,
{
    let started = Instant::now();
    let rows = bind_all(sqlx::query(&sql.query), &sql.params).fetch_all(executor).await;
    log_query(&sql.query, started);
    Ok(rows?)
}

async fn execute<'c, E>(executor: E, sql: &SqlResult) -> Result<u64, DatabaseError>
where
    E: Executor<'c, Database = Postgres>,
{
    let started = Instant::now();
    let result = bind_all(sqlx::query(&sql.query), &sql.params).execute(executor).await;
    log_query(&sql.query, started);
    Ok(result?.rows_affected())
}

/// `INSERT ... RETURNING row_to_json(...)`. Null values are left to column defaults.
fn insert_sql(insert: &Insert) -> Result<SqlResult, DatabaseError> {
    Filter::validate_column(&insert.table)?;
    let mut columns = Vec::new();
    let mut placeholders = Vec::new();
    let mut params = Vec::new();
    for (column, value) in insert.values.iter().filter(|(_, v)| !v.is_null()) {
        Filter::validate_column(column)?;
        params.push(value.clone());
        columns.push(format!("\"{}\"", column));
        placeholders.push(format!("${}", params.len()));
    }

    let conflict = match insert.on_conflict {
        OnConflict::Fail => "",
        OnConflict::Ignore => " ON CONFLICT DO NOTHING",
    };
    Ok(SqlResult {
        query: format!(
            "INSERT INTO \"{table}\" ({}) VALUES ({}){conflict} RETURNING row_to_json(\"{table}\") AS row",
            columns.join(", "),
            placeholders.join(", "),
            table = insert.table,
            conflict = conflict,
        ),
        params,
    })
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for value in params {
        query = match value {
            SqlValue::Null => query.bind(Option::<String>::None),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Uuid(u) => query.bind(*u),
            SqlValue::Date(d) => query.bind(*d),
            SqlValue::Timestamp(ts) => query.bind(*ts),
            SqlValue::Json(v) => query.bind(sqlx::types::Json(v)),
        };
    }
    query
}

fn decode_row(row: &PgRow) -> Result<Row, DatabaseError> {
    match row.try_get::<Value, _>("row")? {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::QueryError(format!("expected a JSON object row, got {}", other))),
    }
}

fn log_query(sql: &str, started: Instant) {
    let settings = &config().database;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if settings.enable_query_logging {
        tracing::debug!(elapsed_ms, "SQL: {}", sql);
    }
    if settings.enable_slow_query_warning && elapsed_ms >= settings.slow_query_threshold_ms {
        tracing::warn!(elapsed_ms, "Slow query: {}", sql);
    }
}
