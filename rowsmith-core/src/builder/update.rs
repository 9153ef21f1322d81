//! UPDATE statement builder

use super::clauses::Clauses;
use super::common::{require_table, IntoAssignments, QueryBuilder};
use crate::{Error, Result, Value};

/// UPDATE builder: `SET` assignments followed by the accumulated WHERE and
/// LIMIT clauses. Assignment values bind before WHERE values.
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    table_name: String,
    set_columns: Vec<String>,
    where_sql: Option<String>,
    limit_sql: Option<String>,
    parameters: Vec<Value>,
}

impl UpdateBuilder {
    pub fn new<A: IntoAssignments>(table: &str, clauses: &Clauses, data: A) -> Result<Self> {
        clauses.check()?;
        require_table(table)?;

        let assignments = data.into_assignments();
        if assignments.is_empty() {
            return Err(Error::contract("UPDATE requires at least one assignment"));
        }
        if let Some((column, _)) = assignments.iter().find(|(_, value)| value.as_array().is_some()) {
            return Err(Error::contract(format!(
                "cannot assign a list of values to column '{column}'"
            )));
        }

        let mut set_columns = Vec::with_capacity(assignments.len());
        let mut parameters = Vec::with_capacity(assignments.len() + clauses.where_params().len());
        for (column, value) in assignments {
            set_columns.push(column);
            parameters.push(value);
        }
        parameters.extend_from_slice(clauses.where_params());

        Ok(Self {
            table_name: table.to_string(),
            set_columns,
            where_sql: clauses.where_sql(),
            limit_sql: clauses.limit_sql(),
            parameters,
        })
    }
}

impl QueryBuilder for UpdateBuilder {
    fn to_sql(&self) -> Result<String> {
        let mut sql = String::new();

        // UPDATE clause
        sql.push_str("UPDATE ");
        sql.push_str(&self.table_name);

        // SET clause
        sql.push_str(" SET ");
        let set_parts: Vec<String> = self
            .set_columns
            .iter()
            .map(|column| format!("{column} = ?"))
            .collect();
        sql.push_str(&set_parts.join(", "));

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
