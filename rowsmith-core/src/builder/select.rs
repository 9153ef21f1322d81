//! SELECT and aggregate statement builders

use super::clauses::Clauses;
use super::common::{require_table, AggregateFunction, QueryBuilder};
use crate::{Error, Result, Value};

/// Column alias carrying an aggregate's result
pub const AGGREGATE_ALIAS: &str = "cnt";

/// SELECT builder over every accumulated clause.
///
/// Clause order is fixed: WHERE, GROUP BY, HAVING, ORDER BY, LIMIT. WHERE
/// values bind first, then HAVING values.
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    table_name: String,
    select_list: String,
    where_sql: Option<String>,
    group_sql: Option<String>,
    having_sql: Option<String>,
    order_sql: Option<String>,
    limit_sql: Option<String>,
    parameters: Vec<Value>,
}

impl SelectBuilder {
    pub fn new(table: &str, clauses: &Clauses) -> Result<Self> {
        clauses.check()?;
        require_table(table)?;

        let mut parameters = clauses.where_params().to_vec();
        parameters.extend_from_slice(clauses.having_params());

        Ok(Self {
            table_name: table.to_string(),
            select_list: clauses.select_list(),
            where_sql: clauses.where_sql(),
            group_sql: clauses.group_sql(),
            having_sql: clauses.having_sql(),
            order_sql: clauses.order_sql(),
            limit_sql: clauses.limit_sql(),
            parameters,
        })
    }
}

impl QueryBuilder for SelectBuilder {
    fn to_sql(&self) -> Result<String> {
        let mut sql = String::new();

        // SELECT clause
        sql.push_str("SELECT ");
        sql.push_str(&self.select_list);

        // FROM clause
        sql.push_str(" FROM ");
        sql.push_str(&self.table_name);

        if let Some(where_sql) = &self.where_sql {
            sql.push_str(" WHERE ");
            sql.push_str(where_sql);
        }

        if let Some(group) = &self.group_sql {
            sql.push_str(" GROUP BY ");
            sql.push_str(group);
        }

        if let Some(having) = &self.having_sql {
            sql.push_str(" HAVING ");
            sql.push_str(having);
        }

        if let Some(order) = &self.order_sql {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }

        if let Some(limit) = &self.limit_sql {
            sql.push_str(" LIMIT ");
            sql.push_str(limit);
        }

        Ok(sql)
    }

    fn parameters(&self) -> &[Value] {
        &self.parameters
    }
}

/// Single-value aggregate: `SELECT MAX(col) AS cnt FROM t [WHERE] [LIMIT]`.
///
/// Only WHERE and LIMIT apply; grouping, ordering and field lists set on the
/// accumulator are ignored.
#[derive(Debug, Clone)]
pub struct AggregateBuilder {
    function: AggregateFunction,
    column: String,
    table_name: String,
    where_sql: Option<String>,
    limit_sql: Option<String>,
    parameters: Vec<Value>,
}

impl AggregateBuilder {
    pub fn new(function: AggregateFunction, column: &str, table: &str, clauses: &Clauses) -> Result<Self> {
        clauses.check()?;
        require_table(table)?;
        if column.trim().is_empty() {
            return Err(Error::contract(format!("{function} needs a column expression")));
        }
        Ok(Self {
            function,
            column: column.to_string(),
            table_name: table.to_string(),
            where_sql: clauses.where_sql(),
            limit_sql: clauses.limit_sql(),
            parameters: clauses.where_params().to_vec(),
        })
    }
}

impl QueryBuilder for AggregateBuilder {
    fn to_sql(&self) -> Result<String> {
        let mut sql = format!(
            "SELECT {}({}) AS {} FROM {}",
            self.function, self.column, AGGREGATE_ALIAS, self.table_name
        );

        if let Some(where_sql) = &self.where_sql {
            sql.push_str(" WHERE ");
            sql.push_str(where_sql);
        }

        if let Some(limit) = &self.limit_sql {
            sql.push_str(" LIMIT ");
            sql.push_str(limit);
        }

        Ok(sql)
    }

    fn parameters(&self) -> &[Value] {
        &self.parameters
    }
}
