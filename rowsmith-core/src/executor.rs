//! Statement execution and connection pool interface

use crate::{RawRows, Result, Value};
use std::future::Future;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Outcome of a statement that returns no rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    /// Identifier the backend assigned to the last inserted row, when it
    /// reports one
    pub last_insert_id: Option<u64>,
}

/// Trait for database connection pools
pub trait ConnectionPool: Send + Sync + Clone {
    /// The transaction type for this pool
    type Transaction: Transaction;

    /// Execute a statement that returns no rows (INSERT, UPDATE, DELETE, ...)
    fn execute(&self, sql: &str, params: &[Value]) -> impl Future<Output = Result<ExecResult>> + Send;

    /// Execute a statement and pull every row as raw values
    fn query(&self, sql: &str, params: &[Value]) -> impl Future<Output = Result<RawRows>> + Send;

    /// Start a new transaction
    fn begin(&self) -> impl Future<Output = Result<Self::Transaction>> + Send;
}

/// Trait for database transactions
pub trait Transaction: Send {
    /// Execute a statement that returns no rows
    fn execute(&mut self, sql: &str, params: &[Value]) -> impl Future<Output = Result<ExecResult>> + Send;

    /// Execute a statement and pull every row as raw values
    fn query(&mut self, sql: &str, params: &[Value]) -> impl Future<Output = Result<RawRows>> + Send;

    /// Commit the transaction
    fn commit(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;

    /// Rollback the transaction
    fn rollback(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}

/// Recording pool for unit tests: every call is logged, results are scripted.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Execute {
            sql: String,
            params: Vec<Value>,
            in_tx: bool,
        },
        Query {
            sql: String,
            params: Vec<Value>,
            in_tx: bool,
        },
        Begin,
        Commit,
        Rollback,
    }

    #[derive(Default)]
    struct MockState {
        calls: Vec<Call>,
        rows: VecDeque<RawRows>,
        exec_results: VecDeque<ExecResult>,
        failure: Option<String>,
    }

    #[derive(Clone, Default)]
    pub struct MockPool {
        state: Arc<Mutex<MockState>>,
    }

    impl MockPool {
        pub fn new() -> Self {
            Self::default()
        }

        /// Rows returned by the next query
        pub fn push_rows(&self, rows: RawRows) {
            self.state.lock().unwrap().rows.push_back(rows);
        }

        /// Result returned by the next execute
        pub fn push_exec(&self, result: ExecResult) {
            self.state.lock().unwrap().exec_results.push_back(result);
        }

        /// Make the next backend call fail with a driver error
        pub fn fail_next(&self, message: &str) {
            self.state.lock().unwrap().failure = Some(message.to_string());
        }

        pub fn calls(&self) -> Vec<Call> {
            self.state.lock().unwrap().calls.clone()
        }

        /// SQL and params of every execute / query, in call order
        pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    Call::Execute { sql, params, .. } | Call::Query { sql, params, .. } => {
                        Some((sql, params))
                    }
                    _ => None,
                })
                .collect()
        }

        fn record(&self, call: Call) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            match state.failure.take() {
                Some(message) => Err(crate::Error::Database(sqlx::Error::Protocol(message))),
                None => Ok(()),
            }
        }

        fn do_execute(&self, sql: &str, params: &[Value], in_tx: bool) -> Result<ExecResult> {
            self.record(Call::Execute {
                sql: sql.to_string(),
                params: params.to_vec(),
                in_tx,
            })?;
            let scripted = self.state.lock().unwrap().exec_results.pop_front();
            Ok(scripted.unwrap_or(ExecResult {
                rows_affected: 1,
                last_insert_id: None,
            }))
        }

        fn do_query(&self, sql: &str, params: &[Value], in_tx: bool) -> Result<RawRows> {
            self.record(Call::Query {
                sql: sql.to_string(),
                params: params.to_vec(),
                in_tx,
            })?;
            let scripted = self.state.lock().unwrap().rows.pop_front();
            Ok(scripted.unwrap_or_default())
        }
    }

    impl ConnectionPool for MockPool {
        type Transaction = MockTransaction;

        async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
            self.do_execute(sql, params, false)
        }

        async fn query(&self, sql: &str, params: &[Value]) -> Result<RawRows> {
            self.do_query(sql, params, false)
        }

        async fn begin(&self) -> Result<Self::Transaction> {
            self.record(Call::Begin)?;
            Ok(MockTransaction { pool: self.clone() })
        }
    }

    pub struct MockTransaction {
        pool: MockPool,
    }

    impl Transaction for MockTransaction {
        async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecResult> {
            self.pool.do_execute(sql, params, true)
        }

        async fn query(&mut self, sql: &str, params: &[Value]) -> Result<RawRows> {
            self.pool.do_query(sql, params, true)
        }

        async fn commit(self) -> Result<()> {
            self.pool.record(Call::Commit)
        }

        async fn rollback(self) -> Result<()> {
            self.pool.record(Call::Rollback)
        }
    }
}
