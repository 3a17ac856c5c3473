//! Execution collaborator.
//!
//! The query layer never talks to a driver directly. Anything that can run
//! SQL text with `?` placeholders implements [`Executor`]; the PostgreSQL
//! implementation lives in [`crate::pg`].

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::meta::Record;
use crate::value::Value;
use std::future::Future;

/// Optional driver capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverFeature {
    /// `INSERT ... RETURNING` rows can be read back.
    Returning,
    /// The driver reports the last generated id after an INSERT.
    LastInsertId,
    /// `begin` / `commit` / `rollback` are available.
    Transactions,
}

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecResult {
    /// `None` when the driver cannot tell.
    pub rows_affected: Option<u64>,
    pub last_insert_id: Option<Value>,
}

impl ExecResult {
    pub fn new(rows_affected: u64) -> Self {
        Self {
            rows_affected: Some(rows_affected),
            last_insert_id: None,
        }
    }

    pub fn with_last_insert_id(mut self, id: impl Into<Value>) -> Self {
        self.last_insert_id = Some(id.into());
        self
    }
}

/// One result row, column names paired with values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    /// Like [`Row::get`], failing with a mapping error for unknown columns.
    pub fn try_get(&self, column: &str) -> OrmResult<&Value> {
        self.get(column)
            .ok_or_else(|| OrmError::mapping(format!("column '{column}' not present in row")))
    }

    /// Copy every column onto `record` and mark it persisted.
    pub fn apply_to<R: Record>(&self, record: &mut R) -> OrmResult<()> {
        for (column, value) in self.columns.iter().zip(&self.values) {
            record.set(column, value.clone())?;
        }
        record.set_persisted(true);
        Ok(())
    }
}

/// Runs SQL text with `?` placeholders.
///
/// Implementations translate placeholders with
/// [`Dialect::native_placeholders`] when their driver needs it.
pub trait Executor: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Run a statement that returns no rows.
    fn execute(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = OrmResult<ExecResult>> + Send;

    /// Run a statement with a single-column `RETURNING` clause and collect
    /// that column, one value per row in execution order.
    fn execute_returning(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = OrmResult<Vec<Value>>> + Send {
        let _ = (sql, args);
        async { Err(OrmError::unsupported("RETURNING is not supported by this executor")) }
    }

    /// Run a query and collect all rows.
    fn query(&self, sql: &str, args: &[Value]) -> impl Future<Output = OrmResult<Vec<Row>>> + Send;

    fn supports_feature(&self, feature: DriverFeature) -> bool;

    fn begin(&self) -> impl Future<Output = OrmResult<()>> + Send {
        async { Err(OrmError::unsupported("transactions are not supported by this executor")) }
    }

    fn commit(&self) -> impl Future<Output = OrmResult<()>> + Send {
        async { Err(OrmError::unsupported("transactions are not supported by this executor")) }
    }

    fn rollback(&self) -> impl Future<Output = OrmResult<()>> + Send {
        async { Err(OrmError::unsupported("transactions are not supported by this executor")) }
    }
}
