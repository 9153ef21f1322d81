//! MySQL backend over sqlx

use super::{ConnectionPool, ExecResult, Transaction};
use crate::config::DatabaseConfig;
use crate::row::{RawRows, RawValue};
use crate::{Error, Result, Value};
use sqlx::mysql::{MySqlArguments, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySql, Row, TypeInfo, ValueRef};
use std::time::Duration;

/// MySQL connection pool wrapper
#[derive(Clone)]
pub struct MySqlPool {
    inner: sqlx::MySqlPool,
}

impl MySqlPool {
    /// Create a new MySQL pool from a connection string
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = sqlx::MySqlPool::connect(database_url).await?;
        Ok(Self { inner: pool })
    }

    /// Create a pool sized and timed out according to `config`
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            url = %config.redacted_url(),
            max_connections = config.max_connections,
            "connecting to mysql"
        );
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.mysql_url())
            .await?;
        Ok(Self { inner: pool })
    }

    /// Create from an existing sqlx pool
    pub fn from_pool(pool: sqlx::MySqlPool) -> Self {
        Self { inner: pool }
    }
}

impl ConnectionPool for MySqlPool {
    type Transaction = MySqlTransaction;

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
        Ok(MySqlTransaction { inner: txn })
    }
}

/// MySQL transaction wrapper
pub struct MySqlTransaction {
    inner: sqlx::Transaction<'static, MySql>,
}

impl Transaction for MySqlTransaction {
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

fn exec_result(result: &sqlx::mysql::MySqlQueryResult) -> ExecResult {
    let id = result.last_insert_id();
    ExecResult {
        rows_affected: result.rows_affected(),
        last_insert_id: (id != 0).then_some(id),
    }
}

/// Bind rowsmith values to a sqlx query
fn bind_values_to_query<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [Value],
) -> Result<Query<'q, MySql, MySqlArguments>> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::I32(i) => query.bind(*i),
            Value::I64(i) => query.bind(*i),
            Value::U64(u) => query.bind(*u),
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

fn rows_to_raw(rows: &[MySqlRow]) -> Result<RawRows> {
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

/// Read one column as text, whatever its wire type
fn column_to_raw(row: &MySqlRow, index: usize) -> Result<RawValue> {
    let value = row.try_get_raw(index)?;
    if value.is_null() {
        return Ok(RawValue::Null);
    }
    let type_name = value.type_info().name().to_string();

    let text = match type_name.as_str() {
        name if name.ends_with("UNSIGNED") => row.try_get_unchecked::<u64, _>(index)?.to_string(),
        "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            row.try_get_unchecked::<i64, _>(index)?.to_string()
        }
        "FLOAT" => row.try_get_unchecked::<f32, _>(index)?.to_string(),
        "DOUBLE" => row.try_get_unchecked::<f64, _>(index)?.to_string(),
        "DATE" | "TIME" | "DATETIME" | "TIMESTAMP" => temporal_text(row, index, &type_name)?,
        _ => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
            return Ok(match String::from_utf8(bytes) {
                Ok(text) => RawValue::Text(text),
                Err(err) => RawValue::Bytes(err.into_bytes()),
            });
        }
    };
    Ok(RawValue::Text(text))
}

#[cfg(feature = "datetime-support")]
fn temporal_text(row: &MySqlRow, index: usize, type_name: &str) -> Result<String> {
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    Ok(match type_name {
        "DATE" => row.try_get_unchecked::<NaiveDate, _>(index)?.to_string(),
        "TIME" => row.try_get_unchecked::<NaiveTime, _>(index)?.to_string(),
        _ => row
            .try_get_unchecked::<NaiveDateTime, _>(index)?
            .format(crate::decode::DATETIME_FORMAT)
            .to_string(),
    })
}

#[cfg(not(feature = "datetime-support"))]
fn temporal_text(row: &MySqlRow, index: usize, type_name: &str) -> Result<String> {
    let column = row.columns()[index].name().to_string();
    Err(Error::decode(
        column,
        type_name,
        "text (enable the datetime-support feature)",
    ))
}
