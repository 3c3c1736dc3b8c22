//! Test store that fails one chosen write, for exercising rollback paths.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::manager::DatabaseError;
use super::memory::MemoryStore;
use super::store::{CounterBump, Insert, Row, Store, Transaction};
use crate::filter::Filter;

/// Wraps a [`MemoryStore`] and fails the `fail_on`-th write (1-based) to
/// `table`. Inserts, soft deletes and counter bumps all count as writes.
/// Later writes succeed again, so a retry can go through.
pub struct FaultyStore {
    pub inner: MemoryStore,
    table: &'static str,
    fail_on: usize,
    writes: Arc<AtomicUsize>,
}

impl FaultyStore {
    pub fn new(inner: MemoryStore, table: &'static str, fail_on: usize) -> Self {
        Self { inner, table, fail_on, writes: Arc::new(AtomicUsize::new(0)) }
    }
}

fn check(table: &str, target: &str, fail_on: usize, writes: &AtomicUsize) -> Result<(), DatabaseError> {
    if table != target {
        return Ok(());
    }
    let n = writes.fetch_add(1, Ordering::SeqCst) + 1;
    if n == fail_on {
        return Err(DatabaseError::QueryError(format!("injected failure on write {} to {}", n, table)));
    }
    Ok(())
}

#[async_trait]
impl Store for FaultyStore {
    async fn count(&self, filter: &Filter) -> Result<i64, DatabaseError> {
        self.inner.count(filter).await
    }

    async fn fetch(&self, filter: &Filter) -> Result<Vec<Row>, DatabaseError> {
        self.inner.fetch(filter).await
    }

    async fn insert(&self, insert: &Insert) -> Result<Option<Row>, DatabaseError> {
        check(&insert.table, self.table, self.fail_on, &self.writes)?;
        self.inner.insert(insert).await
    }

    async fn soft_delete(&self, filter: &Filter, column: &str) -> Result<u64, DatabaseError> {
        check(filter.table_name(), self.table, self.fail_on, &self.writes)?;
        self.inner.soft_delete(filter, column).await
    }

    async fn bump_counter(&self, bump: &CounterBump) -> Result<u64, DatabaseError> {
        check(bump.filter.table_name(), self.table, self.fail_on, &self.writes)?;
        self.inner.bump_counter(bump).await
    }

    async fn begin<'a>(&'a self) -> Result<Box<dyn Transaction + 'a>, DatabaseError> {
        Ok(Box::new(FaultyTransaction {
            inner: self.inner.begin().await?,
            table: self.table,
            fail_on: self.fail_on,
            writes: self.writes.clone(),
        }))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        self.inner.health_check().await
    }
}

struct FaultyTransaction<'a> {
    inner: Box<dyn Transaction + 'a>,
    table: &'static str,
    fail_on: usize,
    writes: Arc<AtomicUsize>,
}

#[async_trait]
impl Transaction for FaultyTransaction<'_> {
    async fn insert(&mut self, insert: &Insert) -> Result<Option<Row>, DatabaseError> {
        check(&insert.table, self.table, self.fail_on, &self.writes)?;
        self.inner.insert(insert).await
    }

    async fn soft_delete(&mut self, filter: &Filter, column: &str) -> Result<u64, DatabaseError> {
        check(filter.table_name(), self.table, self.fail_on, &self.writes)?;
        self.inner.soft_delete(filter, column).await
    }

    async fn bump_counter(&mut self, bump: &CounterBump) -> Result<u64, DatabaseError> {
        check(bump.filter.table_name(), self.table, self.fail_on, &self.writes)?;
        self.inner.bump_counter(bump).await
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        self.inner.commit().await
    }
}
