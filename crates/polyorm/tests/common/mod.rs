//! In-memory executor and record used by the integration tests.

#![allow(dead_code)]

use polyorm::{
    ColumnDescriptor, Dialect, DriverFeature, ExecResult, Executor, OrmError, OrmResult, Record,
    Row, TableDescriptor, Value,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Records every statement and replays queued results in order.
#[derive(Debug)]
pub struct MockExecutor {
    dialect: Dialect,
    features: Vec<DriverFeature>,
    statements: Mutex<Vec<(String, Vec<Value>)>>,
    exec_results: Mutex<VecDeque<OrmResult<ExecResult>>>,
    returning: Mutex<VecDeque<Vec<Value>>>,
    rows: Mutex<VecDeque<Vec<Row>>>,
    transactions: Mutex<Vec<&'static str>>,
}

impl MockExecutor {
    pub fn new(dialect: Dialect, features: &[DriverFeature]) -> Self {
        Self {
            dialect,
            features: features.to_vec(),
            statements: Mutex::new(Vec::new()),
            exec_results: Mutex::new(VecDeque::new()),
            returning: Mutex::new(VecDeque::new()),
            rows: Mutex::new(VecDeque::new()),
            transactions: Mutex::new(Vec::new()),
        }
    }

    pub fn push_exec(&self, result: OrmResult<ExecResult>) {
        self.exec_results.lock().unwrap().push_back(result);
    }

    pub fn push_returning(&self, ids: Vec<Value>) {
        self.returning.lock().unwrap().push_back(ids);
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.rows.lock().unwrap().push_back(rows);
    }

    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.statements.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|(sql, _)| sql).collect()
    }

    pub fn transactions(&self) -> Vec<&'static str> {
        self.transactions.lock().unwrap().clone()
    }

    fn record(&self, sql: &str, args: &[Value]) {
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), args.to_vec()));
    }

    fn transaction(&self, step: &'static str) -> OrmResult<()> {
        if !self.supports_feature(DriverFeature::Transactions) {
            return Err(OrmError::unsupported("no transactions"));
        }
        self.transactions.lock().unwrap().push(step);
        Ok(())
    }
}

impl Executor for MockExecutor {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
        self.record(sql, args);
        self.exec_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ExecResult::new(1)))
    }

    async fn execute_returning(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Value>> {
        self.record(sql, args);
        Ok(self.returning.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        self.record(sql, args);
        Ok(self.rows.lock().unwrap().pop_front().unwrap_or_default())
    }

    fn supports_feature(&self, feature: DriverFeature) -> bool {
        self.features.contains(&feature)
    }

    async fn begin(&self) -> OrmResult<()> {
        self.transaction("begin")
    }

    async fn commit(&self) -> OrmResult<()> {
        self.transaction("commit")
    }

    async fn rollback(&self) -> OrmResult<()> {
        self.transaction("rollback")
    }
}

/// A column map standing in for a mapped struct.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Obj {
    pub values: HashMap<String, Value>,
    pub persisted: bool,
}

impl Obj {
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.values.insert(column.to_string(), value.into());
        self
    }

    pub fn named(name: &str) -> Self {
        Self::default().with("name", name)
    }
}

impl Record for Obj {
    fn get(&self, column: &str) -> Option<Value> {
        self.values.get(column).cloned()
    }

    fn set(&mut self, column: &str, value: Value) -> OrmResult<()> {
        self.values.insert(column.to_string(), value);
        Ok(())
    }

    fn is_persisted(&self) -> bool {
        self.persisted
    }

    fn set_persisted(&mut self, persisted: bool) {
        self.persisted = persisted;
    }
}

/// `users(id PK AUTO, name)`
pub fn users() -> TableDescriptor {
    TableDescriptor::new("users")
        .column(ColumnDescriptor::new("id").primary_key().auto_increment())
        .column(ColumnDescriptor::new("name"))
}

/// `accounts(id PK AUTO, name, created_at, updated_at, deleted_at)`
pub fn accounts() -> TableDescriptor {
    TableDescriptor::new("accounts")
        .column(ColumnDescriptor::new("id").primary_key().auto_increment())
        .column(ColumnDescriptor::new("name"))
        .column(ColumnDescriptor::new("created_at").created_at())
        .column(ColumnDescriptor::new("updated_at").updated_at())
        .column(ColumnDescriptor::new("deleted_at").deleted_at())
}
