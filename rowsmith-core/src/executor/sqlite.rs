//! SQLite backend over sqlx
//!
//! SQLite accepts the `?` placeholders, `REPLACE INTO` and `LIMIT offset,count`
//! forms the builders emit. It has no unsigned 64-bit integers: `U64`
//! parameters above `i64::MAX` are rejected at bind time.

use super::{ConnectionPool, ExecResult, Transaction};
use crate::row::{RawRows, RawValue};
use crate::{Error, Result, Value};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};

/// SQLite connection pool wrapper
#[derive(Clone)]
pub struct SqlitePool {
    inner: sqlx::SqlitePool,
}

impl SqlitePool {
    /// Create a new SQLite pool from a connection string
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = sqlx::SqlitePool::connect(database_url).await?;
        Ok(Self { inner: pool })
    }

    /// A private in-memory database.
    ///
    /// Every connection to `sqlite::memory:` opens its own database, so the
    /// pool is held to a single connection.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        tracing::debug!("opened in-memory sqlite database");
        Ok(Self { inner: pool })
    }

    /// Create from an existing sqlx pool
    pub fn from_pool(pool: sqlx::SqlitePool) -> Self {
        Self { inner: pool }
    }
}

impl ConnectionPool for SqlitePool {
    type Transaction = SqliteTransaction;

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let query = bind_values_to_query(sqlx::query(sql), params)?;
        let result = query.execute(&self.inner).await?;
        Ok(exec_result(&result))
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<RawRows> {
        let query = bind_values_to_query(sqlx::query(sql), params)?;
        let rows = query.fetch_all(&self.inner).await?;
        rows_to_raw(&rows)
    }

    async fn begin(&self) -> Result<Self::Transaction> {
        let txn = self.inner.begin().await?;
        Ok(SqliteTransaction { inner: txn })
    }
}

/// SQLite transaction wrapper
pub struct SqliteTransaction {
    inner: sqlx::Transaction<'static, Sqlite>,
}

impl Transaction for SqliteTransaction {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let query = bind_values_to_query(sqlx::query(sql), params)?;
        let result = query.execute(&mut *self.inner).await?;
        Ok(exec_result(&result))
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<RawRows> {
        let query = bind_values_to_query(sqlx::query(sql), params)?;
        let rows = query.fetch_all(&mut *self.inner).await?;
        rows_to_raw(&rows)
    }

    async fn commit(self) -> Result<()> {
        self.inner.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.inner.rollback().await?;
        Ok(())
    }
}

fn exec_result(result: &sqlx::sqlite::SqliteQueryResult) -> ExecResult {
    let id = result.last_insert_rowid();
    ExecResult {
        rows_affected: result.rows_affected(),
        last_insert_id: u64::try_from(id).ok().filter(|id| *id != 0),
    }
}

/// Bind rowsmith values to a sqlx query
fn bind_values_to_query<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [Value],
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::I32(i) => query.bind(*i),
            Value::I64(i) => query.bind(*i),
            Value::U64(u) => {
                let signed = i64::try_from(*u).map_err(|_| {
                    Error::contract(format!("{u} is out of range for a SQLite INTEGER"))
                })?;
                query.bind(signed)
            }
            Value::F32(f) => query.bind(*f),
            Value::F64(f) => query.bind(*f),
            Value::String(s) => query.bind(s.as_str()),
            Value::Bytes(b) => query.bind(b.as_slice()),
            Value::Array(_) => {
                return Err(Error::contract(
                    "list values must be expanded by an in / not in condition before binding",
                ))
            }
        };
    }
    Ok(query)
}

fn rows_to_raw(rows: &[SqliteRow]) -> Result<RawRows> {
    let columns: Vec<String> = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let mut raw = RawRows::new(columns);
    for row in rows {
        let mut values = Vec::with_capacity(row.len());
        for index in 0..row.len() {
            values.push(column_to_raw(row, index)?);
        }
        raw.rows.push(values);
    }
    Ok(raw)
}

/// Read one column by its storage class
fn column_to_raw(row: &SqliteRow, index: usize) -> Result<RawValue> {
    let value = row.try_get_raw(index)?;
    if value.is_null() {
        return Ok(RawValue::Null);
    }
    let type_name = value.type_info().name().to_string();

    Ok(match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => RawValue::Text(row.try_get_unchecked::<i64, _>(index)?.to_string()),
        "REAL" => RawValue::Text(row.try_get_unchecked::<f64, _>(index)?.to_string()),
        "BLOB" => RawValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        _ => RawValue::Text(row.try_get_unchecked::<String, _>(index)?),
    })
}
