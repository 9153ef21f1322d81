//! The chained query engine
//!
//! An [`Engine`] owns a pool handle, the current table, the accumulated
//! clauses and the transaction slot. Clause methods mutate the engine and
//! return it for chaining; terminal operations build one statement from the
//! accumulated state, run it through the active transaction (or the pool when
//! there is none) and decode the result.
//!
//! Accumulated clauses belong to exactly one terminal operation: they are
//! taken when the operation is called, whether it then succeeds or fails, and
//! [`Engine::table`] discards them as well.
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! # async fn demo() -> rowsmith_core::Result<()> {
//! use rowsmith_core::executor::sqlite::SqlitePool;
//! use rowsmith_core::{op, Engine};
//!
//! let mut engine = Engine::new(SqlitePool::in_memory().await?);
//! let adults = engine
//!     .table("users")
//!     .where_(("age", op::GTE, 18))
//!     .order(&["id", "desc"])
//!     .limit(10)
//!     .select()
//!     .await?;
//! # let _ = adults;
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::panic::Location;

use tokio::sync::Mutex;

use crate::builder::{
    AggregateBuilder, AggregateFunction, Clauses, DeleteBuilder, InsertBuilder, InsertVerb,
    IntoAssignments, IntoColumns, IntoCondition, QueryBuilder, SelectBuilder, Statement,
    UpdateBuilder,
};
use crate::executor::{ConnectionPool, ExecResult, Transaction};
use crate::row::{FromRow, RawRows, RawValue, TextRow};
use crate::{Error, Record, Result};

/// Value reported in place of a failed aggregate by
/// [`AggregateResultExt::or_sentinel`]
pub const AGGREGATE_SENTINEL: &str = "0";

/// Query engine bound to one pool handle.
///
/// Chaining needs `&mut self`, so one engine serves one call chain at a time;
/// use one engine per task or clone the pool into several engines. The
/// transaction methods take `&self` and serialize on an internal async mutex.
pub struct Engine<P: ConnectionPool> {
    pool: P,
    table_name: String,
    clauses: Clauses,
    last_sql: String,
    tx: Mutex<Option<P::Transaction>>,
}

impl<P: ConnectionPool> Engine<P> {
    pub fn new(pool: P) -> Self {
        Self {
            pool,
            table_name: String::new(),
            clauses: Clauses::new(),
            last_sql: String::new(),
            tx: Mutex::new(None),
        }
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    /// Select the target table and discard any accumulated clauses
    pub fn table(&mut self, name: &str) -> &mut Self {
        self.table_name = name.to_string();
        self.clauses = Clauses::new();
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// SQL text of the last statement sent to the backend
    pub fn last_sql(&self) -> &str {
        &self.last_sql
    }

    // ---- clause accumulation ----

    /// Add a WHERE condition: `&record`, `(column, value)` or
    /// `(column, operator, value)`. Conditions are joined with AND.
    pub fn where_<C: IntoCondition>(&mut self, condition: C) -> &mut Self {
        self.clauses.where_(condition);
        self
    }

    /// Add a condition after an earlier [`where_`](Self::where_).
    ///
    /// The condition is joined with AND like every other WHERE condition.
    pub fn or_where<C: IntoCondition>(&mut self, condition: C) -> &mut Self {
        self.clauses.or_where(condition);
        self
    }

    pub fn having<C: IntoCondition>(&mut self, condition: C) -> &mut Self {
        self.clauses.having(condition);
        self
    }

    /// ORDER BY from `column, direction` pairs: `order(&["id", "desc"])`
    pub fn order(&mut self, pairs: &[&str]) -> &mut Self {
        self.clauses.order(pairs);
        self
    }

    pub fn group<C: IntoColumns>(&mut self, columns: C) -> &mut Self {
        self.clauses.group(columns);
        self
    }

    /// Columns for SELECT and FIND; `*` when never called
    pub fn field<C: IntoColumns>(&mut self, columns: C) -> &mut Self {
        self.clauses.field(columns);
        self
    }

    pub fn limit(&mut self, count: u64) -> &mut Self {
        self.clauses.limit(count);
        self
    }

    pub fn limit_offset(&mut self, offset: u64, count: u64) -> &mut Self {
        self.clauses.limit_offset(offset, count);
        self
    }

    // ---- inserts ----
    //
    // Terminal operations are `#[track_caller]` wrappers: they build the
    // statement synchronously and return the future that runs it. Driver
    // failures carry the caller's location.

    /// Insert one record; returns the backend-assigned id, or 0
    #[track_caller]
    pub fn insert<'a, R: Record>(&'a mut self, record: &R) -> impl Future<Output = Result<u64>> + 'a {
        let caller = Location::caller();
        let statement = self
            .take_clauses()
            .check()
            .and_then(|()| InsertBuilder::record(InsertVerb::Insert, &self.table_name, record))
            .and_then(|builder| builder.build());
        self.inserted_id("insert", caller, statement)
    }

    /// Insert every record in one statement.
    ///
    /// Returns the id the backend reports for the statement, or 0. MySQL
    /// reports the id of the first inserted row; SQLite reports the last.
    #[track_caller]
    pub fn insert_batch<'a, R: Record>(&'a mut self, records: &[R]) -> impl Future<Output = Result<u64>> + 'a {
        let caller = Location::caller();
        let statement = self
            .take_clauses()
            .check()
            .and_then(|()| InsertBuilder::batch(InsertVerb::Insert, &self.table_name, records))
            .and_then(|builder| builder.build());
        self.inserted_id("insert_batch", caller, statement)
    }

    #[track_caller]
    pub fn replace<'a, R: Record>(&'a mut self, record: &R) -> impl Future<Output = Result<u64>> + 'a {
        let caller = Location::caller();
        let statement = self
            .take_clauses()
            .check()
            .and_then(|()| InsertBuilder::record(InsertVerb::Replace, &self.table_name, record))
            .and_then(|builder| builder.build());
        self.inserted_id("replace", caller, statement)
    }

    /// Same id reporting as [`insert_batch`](Self::insert_batch)
    #[track_caller]
    pub fn replace_batch<'a, R: Record>(&'a mut self, records: &[R]) -> impl Future<Output = Result<u64>> + 'a {
        let caller = Location::caller();
        let statement = self
            .take_clauses()
            .check()
            .and_then(|()| InsertBuilder::batch(InsertVerb::Replace, &self.table_name, records))
            .and_then(|builder| builder.build());
        self.inserted_id("replace_batch", caller, statement)
    }

    // ---- update / delete ----

    /// Update with `&record` (every mapped field) or `(column, value)`;
    /// returns the affected row count
    #[track_caller]
    pub fn update<A: IntoAssignments>(&mut self, data: A) -> impl Future<Output = Result<u64>> + '_ {
        let caller = Location::caller();
        let clauses = self.take_clauses();
        let statement = UpdateBuilder::new(&self.table_name, &clauses, data).and_then(|builder| builder.build());
        self.affected_rows("update", caller, statement)
    }

    /// Returns the affected row count
    #[track_caller]
    pub fn delete(&mut self) -> impl Future<Output = Result<u64>> + '_ {
        let caller = Location::caller();
        let clauses = self.take_clauses();
        let statement = DeleteBuilder::new(&self.table_name, &clauses).and_then(|builder| builder.build());
        self.affected_rows("delete", caller, statement)
    }

    // ---- reads ----

    /// Every matching row as an ordered column -> text map
    #[track_caller]
    pub fn select(&mut self) -> impl Future<Output = Result<Vec<TextRow>>> + '_ {
        let caller = Location::caller();
        let clauses = self.take_clauses();
        let statement = self.select_statement(&clauses);
        self.text_rows("select", caller, statement)
    }

    /// The first matching row, or `None` when nothing matches
    #[track_caller]
    pub fn select_one(&mut self) -> impl Future<Output = Result<Option<TextRow>>> + '_ {
        let caller = Location::caller();
        let mut clauses = self.take_clauses();
        clauses.limit(1);
        let statement = self.select_statement(&clauses);
        self.first_text_row(caller, statement)
    }

    /// Decode every matching row into a new `T` appended to `dest`.
    ///
    /// Returns the number of rows appended. On a decode failure nothing is
    /// appended.
    #[track_caller]
    pub fn find<'a, T: FromRow>(&'a mut self, dest: &'a mut Vec<T>) -> impl Future<Output = Result<usize>> + 'a {
        let caller = Location::caller();
        let clauses = self.take_clauses();
        let statement = self.select_statement(&clauses);
        self.decode_rows(caller, statement, dest)
    }

    /// The first matching row decoded into `T`; [`Error::NotFound`] when
    /// nothing matches
    #[track_caller]
    pub fn find_one<'a, T: FromRow + 'a>(&'a mut self) -> impl Future<Output = Result<T>> + 'a {
        let caller = Location::caller();
        let mut clauses = self.take_clauses();
        clauses.limit(1);
        let statement = self.select_statement(&clauses);
        self.decode_first(caller, statement)
    }

    // ---- aggregates ----

    #[track_caller]
    pub fn max(&mut self, column: &str) -> impl Future<Output = Result<String>> + '_ {
        self.aggregate("max", AggregateFunction::Max, column, Location::caller())
    }

    #[track_caller]
    pub fn min(&mut self, column: &str) -> impl Future<Output = Result<String>> + '_ {
        self.aggregate("min", AggregateFunction::Min, column, Location::caller())
    }

    #[track_caller]
    pub fn avg(&mut self, column: &str) -> impl Future<Output = Result<String>> + '_ {
        self.aggregate("avg", AggregateFunction::Avg, column, Location::caller())
    }

    #[track_caller]
    pub fn sum(&mut self, column: &str) -> impl Future<Output = Result<String>> + '_ {
        self.aggregate("sum", AggregateFunction::Sum, column, Location::caller())
    }

    #[track_caller]
    pub fn count(&mut self, column: &str) -> impl Future<Output = Result<String>> + '_ {
        self.aggregate("count", AggregateFunction::Count, column, Location::caller())
    }

    fn aggregate(
        &mut self,
        operation: &'static str,
        function: AggregateFunction,
        column: &str,
        caller: &'static Location<'static>,
    ) -> impl Future<Output = Result<String>> + '_ {
        let clauses = self.take_clauses();
        let statement = AggregateBuilder::new(function, column, &self.table_name, &clauses)
            .and_then(|builder| builder.build());
        self.aggregate_value(operation, caller, statement)
    }

    async fn aggregate_value(
        &mut self,
        operation: &'static str,
        caller: &'static Location<'static>,
        statement: Result<Statement>,
    ) -> Result<String> {
        let rows = self.run_query(operation, caller, statement?).await?;
        Ok(rows
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(RawValue::text)
            .map(Cow::into_owned)
            .unwrap_or_default())
    }

    // ---- raw statements ----

    /// Run a literal statement without parameters.
    ///
    /// Returns the last inserted id when the text mentions `insert` (any
    /// casing), the affected row count otherwise. Accumulated clauses are left
    /// untouched. The text is sent as is; the caller is responsible for
    /// escaping.
    #[track_caller]
    pub fn exec(&mut self, sql: &str) -> impl Future<Output = Result<u64>> + '_ {
        let caller = Location::caller();
        let is_insert = sql.to_ascii_lowercase().contains("insert");
        self.exec_raw(caller, Statement::raw(sql), is_insert)
    }

    async fn exec_raw(
        &mut self,
        caller: &'static Location<'static>,
        statement: Statement,
        is_insert: bool,
    ) -> Result<u64> {
        let result = self.run_execute("exec", caller, statement).await?;
        if is_insert {
            Ok(result.last_insert_id.unwrap_or(0))
        } else {
            Ok(result.rows_affected)
        }
    }

    /// Run a literal query without parameters; rows as text maps
    #[track_caller]
    pub fn query(&mut self, sql: &str) -> impl Future<Output = Result<Vec<TextRow>>> + '_ {
        let caller = Location::caller();
        self.text_rows("query", caller, Ok(Statement::raw(sql)))
    }

    // ---- transactions ----

    /// Open a transaction; every later statement runs inside it until
    /// [`commit`](Self::commit) or [`rollback`](Self::rollback)
    #[track_caller]
    pub fn begin(&self) -> impl Future<Output = Result<()>> + '_ {
        self.begin_at(Location::caller())
    }

    async fn begin_at(&self, caller: &'static Location<'static>) -> Result<()> {
        let mut slot = self.tx.lock().await;
        if slot.is_some() {
            return Err(Error::transaction("a transaction is already active"));
        }
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|err| err.at_location("begin", caller))?;
        *slot = Some(tx);
        tracing::debug!("transaction started");
        Ok(())
    }

    /// Commit the active transaction. The engine is idle afterwards even when
    /// the commit itself fails.
    #[track_caller]
    pub fn commit(&self) -> impl Future<Output = Result<()>> + '_ {
        self.commit_at(Location::caller())
    }

    async fn commit_at(&self, caller: &'static Location<'static>) -> Result<()> {
        let mut slot = self.tx.lock().await;
        let tx = slot
            .take()
            .ok_or_else(|| Error::transaction("commit without an active transaction"))?;
        tx.commit()
            .await
            .map_err(|err| err.at_location("commit", caller))?;
        tracing::debug!("transaction committed");
        Ok(())
    }

    /// Roll back the active transaction. The engine is idle afterwards even
    /// when the rollback itself fails.
    #[track_caller]
    pub fn rollback(&self) -> impl Future<Output = Result<()>> + '_ {
        self.rollback_at(Location::caller())
    }

    async fn rollback_at(&self, caller: &'static Location<'static>) -> Result<()> {
        let mut slot = self.tx.lock().await;
        let tx = slot
            .take()
            .ok_or_else(|| Error::transaction("rollback without an active transaction"))?;
        tx.rollback()
            .await
            .map_err(|err| err.at_location("rollback", caller))?;
        tracing::debug!("transaction rolled back");
        Ok(())
    }

    pub async fn in_transaction(&self) -> bool {
        self.tx.lock().await.is_some()
    }

    // ---- plumbing ----

    fn take_clauses(&mut self) -> Clauses {
        std::mem::take(&mut self.clauses)
    }

    fn select_statement(&self, clauses: &Clauses) -> Result<Statement> {
        SelectBuilder::new(&self.table_name, clauses)?.build()
    }

    async fn inserted_id(
        &mut self,
        operation: &'static str,
        caller: &'static Location<'static>,
        statement: Result<Statement>,
    ) -> Result<u64> {
        let result = self.run_execute(operation, caller, statement?).await?;
        Ok(result.last_insert_id.unwrap_or(0))
    }

    async fn text_rows(
        &mut self,
        operation: &'static str,
        caller: &'static Location<'static>,
        statement: Result<Statement>,
    ) -> Result<Vec<TextRow>> {
        Ok(self.run_query(operation, caller, statement?).await?.into_text_rows())
    }

    async fn first_text_row(
        &mut self,
        caller: &'static Location<'static>,
        statement: Result<Statement>,
    ) -> Result<Option<TextRow>> {
        let rows = self.run_query("select_one", caller, statement?).await?;
        Ok(rows.into_text_rows().into_iter().next())
    }

    async fn decode_rows<T: FromRow>(
        &mut self,
        caller: &'static Location<'static>,
        statement: Result<Statement>,
        dest: &mut Vec<T>,
    ) -> Result<usize> {
        self.run_query("find", caller, statement?).await?.decode_into(dest)
    }

    async fn decode_first<T: FromRow>(
        &mut self,
        caller: &'static Location<'static>,
        statement: Result<Statement>,
    ) -> Result<T> {
        let rows = self.run_query("find_one", caller, statement?).await?;
        let mut found = Vec::with_capacity(1);
        rows.decode_into(&mut found)?;
        found
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(self.table_name.as_str()))
    }

    async fn affected_rows(
        &mut self,
        operation: &'static str,
        caller: &'static Location<'static>,
        statement: Result<Statement>,
    ) -> Result<u64> {
        Ok(self.run_execute(operation, caller, statement?).await?.rows_affected)
    }

    fn record_statement(&mut self, operation: &'static str, statement: &Statement) {
        tracing::debug!(
            operation,
            table = %self.table_name,
            sql = %statement.sql,
            params = statement.params.len(),
            "running statement"
        );
        tracing::trace!(operation, sql = %statement.interpolated(), "interpolated statement");
        self.last_sql.clone_from(&statement.sql);
    }

    async fn run_execute(
        &mut self,
        operation: &'static str,
        caller: &'static Location<'static>,
        statement: Statement,
    ) -> Result<ExecResult> {
        self.record_statement(operation, &statement);
        let result = match self.tx.get_mut() {
            Some(tx) => tx.execute(&statement.sql, &statement.params).await,
            None => self.pool.execute(&statement.sql, &statement.params).await,
        };
        result.map_err(|err| err.at_location(operation, caller))
    }

    async fn run_query(
        &mut self,
        operation: &'static str,
        caller: &'static Location<'static>,
        statement: Statement,
    ) -> Result<RawRows> {
        self.record_statement(operation, &statement);
        let result = match self.tx.get_mut() {
            Some(tx) => tx.query(&statement.sql, &statement.params).await,
            None => self.pool.query(&statement.sql, &statement.params).await,
        };
        result.map_err(|err| err.at_location(operation, caller))
    }
}

/// Lossy access to aggregate results
pub trait AggregateResultExt {
    /// The aggregate value, or [`AGGREGATE_SENTINEL`] when the aggregate
    /// failed. The sentinel is also a legitimate result; check the `Result`
    /// when the difference matters.
    fn or_sentinel(self) -> String;
}

impl AggregateResultExt for Result<String> {
    fn or_sentinel(self) -> String {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "aggregate failed, reporting sentinel");
                AGGREGATE_SENTINEL.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::mock::{Call, MockPool};
    use crate::{op, Value};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct User {
        id: u64,
        name: String,
        age: i32,
        active: bool,
    }

    crate::record!(User {
        id: "id,AUTO_INCREMENT",
        name: "user_name",
        age,
        active,
    });

    fn engine() -> (MockPool, Engine<MockPool>) {
        let pool = MockPool::new();
        (pool.clone(), Engine::new(pool))
    }

    fn user(name: &str, age: i32) -> User {
        User {
            id: 0,
            name: name.to_string(),
            age,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_insert_returns_assigned_id() {
        let (pool, mut engine) = engine();
        pool.push_exec(ExecResult {
            rows_affected: 1,
            last_insert_id: Some(42),
        });
        let id = engine.table("users").insert(&user("ann", 30)).await.unwrap();
        assert_eq!(id, 42);
        assert_eq!(
            pool.statements(),
            vec![(
                "INSERT INTO users (user_name, age, active) VALUES (?, ?, ?)".to_string(),
                vec![Value::from("ann"), Value::I32(30), Value::Bool(true)]
            )]
        );
    }

    #[tokio::test]
    async fn test_insert_without_id_returns_zero() {
        let (_pool, mut engine) = engine();
        assert_eq!(engine.table("users").replace(&user("a", 1)).await.unwrap(), 0);
        assert!(engine.last_sql().starts_with("REPLACE INTO users"));
    }

    #[tokio::test]
    async fn test_batch_insert_shapes() {
        let (pool, mut engine) = engine();
        let users = vec![user("a", 1), user("b", 2)];
        engine.table("users").insert_batch(&users).await.unwrap();
        let (sql, params) = &pool.statements()[0];
        assert_eq!(
            sql,
            "INSERT INTO users (user_name, age, active) VALUES (?, ?, ?), (?, ?, ?)"
        );
        assert_eq!(params.len(), 6);
    }

    #[tokio::test]
    async fn test_empty_batch_never_reaches_backend() {
        let (pool, mut engine) = engine();
        let err = engine.table("users").replace_batch::<User>(&[]).await.unwrap_err();
        assert!(err.is_contract());
        assert!(pool.calls().is_empty());
    }

    #[tokio::test]
    async fn test_where_in_and_limit_flow_into_select() {
        let (pool, mut engine) = engine();
        engine
            .table("users")
            .where_(("status", "on"))
            .where_(("id", op::IN, vec![1, 2, 3]))
            .limit(5)
            .select()
            .await
            .unwrap();
        let (sql, params) = &pool.statements()[0];
        assert_eq!(
            sql,
            "SELECT * FROM users WHERE (status = ?) AND (id in (?, ?, ?)) LIMIT 5"
        );
        assert_eq!(
            params,
            &vec![Value::from("on"), Value::I32(1), Value::I32(2), Value::I32(3)]
        );
    }

    #[tokio::test]
    async fn test_limit_offset_form() {
        let (_pool, mut engine) = engine();
        engine.table("users").limit_offset(5, 10).select().await.unwrap();
        assert_eq!(engine.last_sql(), "SELECT * FROM users LIMIT 5,10");
    }

    #[tokio::test]
    async fn test_contract_violation_aborts_before_backend() {
        let (pool, mut engine) = engine();
        let err = engine
            .table("users")
            .where_(("id", "in", 3))
            .select()
            .await
            .unwrap_err();
        assert!(err.is_contract());
        assert!(pool.calls().is_empty());
    }

    #[tokio::test]
    async fn test_clauses_are_consumed_by_terminal_operations() {
        let (pool, mut engine) = engine();
        engine.table("users").where_(("id", 1)).delete().await.unwrap();
        engine.select().await.unwrap();
        let statements = pool.statements();
        assert_eq!(statements[0].0, "DELETE FROM users WHERE (id = ?)");
        assert_eq!(statements[1].0, "SELECT * FROM users");
        assert!(statements[1].1.is_empty());
    }

    #[tokio::test]
    async fn test_failed_operation_still_consumes_clauses() {
        let (pool, mut engine) = engine();
        engine.table("users").or_where(("id", 1));
        assert!(engine.count("*").await.is_err());
        engine.count("*").await.unwrap();
        assert_eq!(pool.statements()[0].0, "SELECT COUNT(*) AS cnt FROM users");
    }

    #[tokio::test]
    async fn test_table_resets_clauses() {
        let (_pool, mut engine) = engine();
        engine.table("users").where_(("id", 1)).order(&["id", "desc"]);
        engine.table("orders").select().await.unwrap();
        assert_eq!(engine.last_sql(), "SELECT * FROM orders");
    }

    #[tokio::test]
    async fn test_update_returns_affected_rows() {
        let (pool, mut engine) = engine();
        pool.push_exec(ExecResult {
            rows_affected: 3,
            last_insert_id: None,
        });
        let changed = engine
            .table("users")
            .where_(("age", op::LT, 18))
            .limit(3)
            .update(("active", false))
            .await
            .unwrap();
        assert_eq!(changed, 3);
        assert_eq!(
            pool.statements()[0],
            (
                "UPDATE users SET active = ? WHERE (age < ?) LIMIT 3".to_string(),
                vec![Value::Bool(false), Value::I32(18)]
            )
        );
    }

    #[tokio::test]
    async fn test_update_from_record() {
        let (pool, mut engine) = engine();
        let mut u = user("bo", 7);
        u.id = 3;
        engine.table("users").where_(("id", 3)).update(&u).await.unwrap();
        assert_eq!(
            pool.statements()[0].0,
            "UPDATE users SET id = ?, user_name = ?, age = ?, active = ? WHERE (id = ?)"
        );
    }

    #[tokio::test]
    async fn test_having_params_follow_where_params() {
        let (pool, mut engine) = engine();
        engine
            .table("staff")
            .field(("dept", "COUNT(*) AS n"))
            .where_(("age", op::GT, 20))
            .group("dept")
            .having(("COUNT(*)", op::GTE, 2))
            .order(&["dept", "ASC"])
            .select()
            .await
            .unwrap();
        let (sql, params) = &pool.statements()[0];
        assert_eq!(
            sql,
            "SELECT dept, COUNT(*) AS n FROM staff WHERE (age > ?) GROUP BY dept \
             HAVING (COUNT(*) >= ?) ORDER BY dept ASC"
        );
        assert_eq!(params, &vec![Value::I32(20), Value::I32(2)]);
    }

    #[tokio::test]
    async fn test_record_shorthand_in_where_and_having() {
        let (pool, mut engine) = engine();
        let ann = User {
            id: 3,
            name: "ann".into(),
            age: 30,
            active: true,
        };
        engine
            .table("users")
            .where_(&ann)
            .group("user_name")
            .having(&ann)
            .select()
            .await
            .unwrap();
        let (sql, params) = &pool.statements()[0];
        assert_eq!(
            sql,
            "SELECT * FROM users WHERE (id = ? AND user_name = ? AND age = ? AND active = ?) \
             GROUP BY user_name HAVING (id = ? AND user_name = ? AND age = ? AND active = ?)"
        );
        let fields = vec![Value::U64(3), Value::from("ann"), Value::I32(30), Value::Bool(true)];
        assert_eq!(params, &[fields.clone(), fields].concat());
    }

    #[tokio::test]
    async fn test_select_one_empty_is_not_an_error() {
        let (pool, mut engine) = engine();
        let row = engine.table("users").where_(("id", 9)).select_one().await.unwrap();
        assert!(row.is_none());
        assert_eq!(
            pool.statements()[0].0,
            "SELECT * FROM users WHERE (id = ?) LIMIT 1"
        );
    }

    #[tokio::test]
    async fn test_select_one_returns_first_row() {
        let (pool, mut engine) = engine();
        pool.push_rows(RawRows::new(["id", "user_name"]).with_row(["1", "ann"]));
        let row = engine.table("users").select_one().await.unwrap().unwrap();
        assert_eq!(row.get("user_name"), Some("ann"));
    }

    #[tokio::test]
    async fn test_find_one_not_found() {
        let (_pool, mut engine) = engine();
        let err = engine.table("users").find_one::<User>().await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_find_decodes_mapped_columns() {
        let (pool, mut engine) = engine();
        pool.push_rows(
            RawRows::new(["id", "user_name", "age", "active", "extra"])
                .with_row(["1", "ann", "30", "1", "x"])
                .with_row(["2", "bo", "41", "false", "y"]),
        );
        let mut users = Vec::<User>::new();
        let count = engine
            .table("users")
            .where_(("age", op::GT, 18))
            .find(&mut users)
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            users[1],
            User {
                id: 2,
                name: "bo".into(),
                age: 41,
                active: false
            }
        );
        assert_eq!(engine.last_sql(), "SELECT * FROM users WHERE (age > ?)");
    }

    #[tokio::test]
    async fn test_find_decode_failure_leaves_destination() {
        let (pool, mut engine) = engine();
        pool.push_rows(RawRows::new(["age"]).with_row(["old"]));
        let mut users = vec![user("keep", 1)];
        let err = engine.table("users").find(&mut users).await.unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn test_aggregates() {
        let (pool, mut engine) = engine();
        pool.push_rows(RawRows::new(["cnt"]).with_row(["57"]));
        pool.push_rows(RawRows::new(["cnt"]).with_row([None::<&str>]));
        let max = engine.table("users").where_(("active", true)).max("age").await.unwrap();
        assert_eq!(max, "57");
        assert_eq!(
            pool.statements()[0].0,
            "SELECT MAX(age) AS cnt FROM users WHERE (active = ?)"
        );
        assert_eq!(engine.table("users").sum("age").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_aggregate_sentinel_on_failure() {
        let (pool, mut engine) = engine();
        pool.fail_next("lost connection");
        let result = engine.table("users").avg("age").await;
        assert!(matches!(result, Err(Error::Backend { operation: "avg", .. })));
        assert_eq!(result.or_sentinel(), AGGREGATE_SENTINEL);
        assert_eq!(Ok::<_, Error>("12".to_string()).or_sentinel(), "12");
    }

    #[tokio::test]
    async fn test_backend_errors_carry_operation() {
        let (pool, mut engine) = engine();
        pool.fail_next("deadlock");
        let err = engine.table("users").delete().await.unwrap_err();
        match err {
            Error::Backend {
                operation,
                location,
                source,
            } => {
                assert_eq!(operation, "delete");
                assert!(location.contains("engine.rs"));
                assert!(matches!(*source, Error::Database(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_backend_errors_point_at_each_call_site() {
        fn location(err: Error) -> String {
            match err {
                Error::Backend { location, .. } => location,
                other => panic!("unexpected error: {other:?}"),
            }
        }

        let (pool, mut engine) = engine();
        pool.fail_next("deadlock");
        let delete_site = format!("{}:{}", file!(), line!() + 1);
        let deleted = engine.table("users").delete().await;
        pool.fail_next("deadlock");
        let select_site = format!("{}:{}", file!(), line!() + 1);
        let selected = engine.table("users").select().await;
        engine.begin().await.unwrap();
        pool.fail_next("deadlock");
        let commit_err = engine.commit().await.unwrap_err();

        let deleted = location(deleted.unwrap_err());
        let selected = location(selected.unwrap_err());
        assert_eq!(deleted, delete_site);
        assert_eq!(selected, select_site);
        assert_ne!(deleted, selected);
        assert!(location(commit_err).contains("engine.rs"));
    }

    #[tokio::test]
    async fn test_raw_exec_reports_insert_id_or_rows() {
        let (pool, mut engine) = engine();
        pool.push_exec(ExecResult {
            rows_affected: 1,
            last_insert_id: Some(77),
        });
        pool.push_exec(ExecResult {
            rows_affected: 4,
            last_insert_id: Some(77),
        });
        assert_eq!(engine.exec("Insert INTO t (a) VALUES (1)").await.unwrap(), 77);
        assert_eq!(engine.exec("UPDATE t SET a = 2").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_raw_query_leaves_clauses() {
        let (pool, mut engine) = engine();
        pool.push_rows(RawRows::new(["v"]).with_row(["1"]));
        engine.table("users").where_(("id", 5));
        let rows = engine.query("SELECT 1 AS v").await.unwrap();
        assert_eq!(rows[0].get("v"), Some("1"));
        engine.delete().await.unwrap();
        assert_eq!(pool.statements()[1].0, "DELETE FROM users WHERE (id = ?)");
    }

    #[tokio::test]
    async fn test_begin_twice_fails() {
        let (_pool, engine) = engine();
        engine.begin().await.unwrap();
        let err = engine.begin().await.unwrap_err();
        assert!(matches!(err, Error::Transaction { .. }));
        assert!(engine.in_transaction().await);
    }

    #[tokio::test]
    async fn test_commit_and_rollback_require_active_transaction() {
        let (pool, engine) = engine();
        assert!(matches!(engine.commit().await, Err(Error::Transaction { .. })));
        assert!(matches!(engine.rollback().await, Err(Error::Transaction { .. })));
        assert!(pool.calls().is_empty());
    }

    #[tokio::test]
    async fn test_statements_route_through_active_transaction() {
        let (pool, mut engine) = engine();
        engine.begin().await.unwrap();
        engine.table("users").insert(&user("a", 1)).await.unwrap();
        engine.exec("DELETE FROM users").await.unwrap();
        engine.commit().await.unwrap();
        engine.table("users").select().await.unwrap();

        let calls = pool.calls();
        assert_eq!(calls[0], Call::Begin);
        assert!(matches!(calls[1], Call::Execute { in_tx: true, .. }));
        assert!(matches!(calls[2], Call::Execute { in_tx: true, .. }));
        assert_eq!(calls[3], Call::Commit);
        assert!(matches!(calls[4], Call::Query { in_tx: false, .. }));
        assert!(!engine.in_transaction().await);
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_engine_idle() {
        let (pool, engine) = engine();
        engine.begin().await.unwrap();
        pool.fail_next("commit refused");
        assert!(engine.commit().await.is_err());
        assert!(!engine.in_transaction().await);
        engine.begin().await.unwrap();
        engine.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_begin_admits_one() {
        let (_pool, engine) = engine();
        let (a, b) = tokio::join!(engine.begin(), engine.begin());
        assert!(a.is_ok() ^ b.is_ok());
    }

    #[tokio::test]
    async fn test_missing_table_is_contract_violation() {
        let (pool, mut engine) = engine();
        assert!(engine.delete().await.unwrap_err().is_contract());
        assert!(pool.calls().is_empty());
    }
}
