//! Recording backend shared by the integration tests
//!
//! Implements the backend traits in memory: every statement is captured with
//! its positional binds, responses are scripted in order and commit/rollback
//! calls are counted.

#![allow(dead_code)]

pub mod models;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use joinery_orm::{
    DatabaseError, DatabasePool, DatabaseRow, DatabaseTransaction, DatabaseValue, OrmContext,
    OrmError, OrmResult, SqlDialect,
};

/// One statement as the driver would have received it
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<DatabaseValue>,
}

/// Scripted outcome of the next statement
#[derive(Debug, Clone)]
pub enum Response {
    Rows(Vec<MockRow>),
    Affected(u64),
    /// Raw driver error text, translated for the pool's dialect
    Fail(String),
}

#[derive(Debug, Default)]
pub struct State {
    pub statements: Vec<Statement>,
    pub responses: VecDeque<Response>,
    pub begun: usize,
    pub commits: usize,
    pub rollbacks: usize,
}

#[derive(Clone)]
pub struct RecordingPool {
    state: Arc<Mutex<State>>,
    dialect: SqlDialect,
}

/// Route the crate's tracing output to the test harness (`RUST_LOG=joinery_orm=debug`)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl RecordingPool {
    pub fn new(dialect: SqlDialect) -> Self {
        init_tracing();
        Self {
            state: Arc::new(Mutex::new(State::default())),
            dialect,
        }
    }

    pub fn postgres() -> Self {
        Self::new(SqlDialect::PostgreSQL)
    }

    pub fn mysql() -> Self {
        Self::new(SqlDialect::MySQL)
    }

    /// Queue the response for the next statement
    pub fn respond(&self, response: Response) -> &Self {
        self.state().responses.push_back(response);
        self
    }

    pub fn respond_rows(&self, rows: Vec<MockRow>) -> &Self {
        self.respond(Response::Rows(rows))
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.state().statements.clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.state().statements.iter().map(|s| s.sql.clone()).collect()
    }

    pub fn commits(&self) -> usize {
        self.state().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state().rollbacks
    }

    pub fn context(&self) -> OrmContext {
        OrmContext::new(Arc::new(self.clone()))
    }
}

#[async_trait]
impl DatabasePool for RecordingPool {
    async fn begin_transaction(&self) -> OrmResult<Box<dyn DatabaseTransaction>> {
        self.state().begun += 1;
        Ok(Box::new(RecordingTransaction {
            state: Arc::clone(&self.state),
            dialect: self.dialect,
        }))
    }

    fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    async fn close(&self) -> OrmResult<()> {
        Ok(())
    }
}

pub struct RecordingTransaction {
    state: Arc<Mutex<State>>,
    dialect: SqlDialect,
}

impl RecordingTransaction {
    fn record(&self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Option<Response>> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        match state.responses.pop_front() {
            Some(Response::Fail(message)) => {
                Err(OrmError::Database(DatabaseError::translate(self.dialect, message)))
            }
            other => Ok(other),
        }
    }
}

#[async_trait]
impl DatabaseTransaction for RecordingTransaction {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        Ok(match self.record(sql, params)? {
            Some(Response::Affected(n)) => n,
            Some(Response::Rows(rows)) => rows.len() as u64,
            _ => 1,
        })
    }

    async fn fetch_all(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> OrmResult<Vec<Box<dyn DatabaseRow>>> {
        Ok(match self.record(sql, params)? {
            Some(Response::Rows(rows)) => rows
                .into_iter()
                .map(|row| Box::new(row) as Box<dyn DatabaseRow>)
                .collect(),
            _ => Vec::new(),
        })
    }

    async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> OrmResult<Option<Box<dyn DatabaseRow>>> {
        Ok(match self.record(sql, params)? {
            Some(Response::Rows(rows)) => rows
                .into_iter()
                .next()
                .map(|row| Box::new(row) as Box<dyn DatabaseRow>),
            _ => None,
        })
    }

    async fn commit(self: Box<Self>) -> OrmResult<()> {
        self.state.lock().unwrap().commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> OrmResult<()> {
        self.state.lock().unwrap().rollbacks += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockRow {
    columns: Vec<String>,
    values: Vec<DatabaseValue>,
}

impl DatabaseRow for MockRow {
    fn get_by_index(&self, index: usize) -> OrmResult<DatabaseValue> {
        self.values
            .get(index)
            .cloned()
            .ok_or_else(|| OrmError::Query(format!("Column index {} out of range", index)))
    }

    fn column_count(&self) -> usize {
        self.values.len()
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.clone()
    }
}

/// Build a row from `(column, value)` pairs
pub fn row<const N: usize>(cells: [(&str, DatabaseValue); N]) -> MockRow {
    let (columns, values) = cells
        .into_iter()
        .map(|(column, value)| (column.to_string(), value))
        .unzip();
    MockRow { columns, values }
}
