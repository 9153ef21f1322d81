//! DELETE statement builder

use super::clauses::Clauses;
use super::common::{require_table, QueryBuilder};
use crate::{Result, Value};

/// DELETE builder over the accumulated WHERE and LIMIT clauses.
///
/// A DELETE without conditions removes every row; the engine allows it,
/// the same as the raw statement would.
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    table_name: String,
    where_sql: Option<String>,
    limit_sql: Option<String>,
    parameters: Vec<Value>,
}

impl DeleteBuilder {
    pub fn new(table: &str, clauses: &Clauses) -> Result<Self> {
        clauses.check()?;
        require_table(table)?;
        Ok(Self {
            table_name: table.to_string(),
            where_sql: clauses.where_sql(),
            limit_sql: clauses.limit_sql(),
            parameters: clauses.where_params().to_vec(),
        })
    }
}

impl QueryBuilder for DeleteBuilder {
    fn to_sql(&self) -> Result<String> {
        let mut sql = String::new();

        // DELETE FROM clause
        sql.push_str("DELETE FROM ");
        sql.push_str(&self.table_name);

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::op;

    #[test]
    fn test_delete_builder() {
        let mut clauses = Clauses::new();
        clauses.where_(("age", op::LT, 18));
        let query = DeleteBuilder::new("users", &clauses).unwrap();
        assert_eq!(query.to_sql().unwrap(), "DELETE FROM users WHERE (age < ?)");
        assert_eq!(query.parameters(), &[Value::I32(18)]);
    }

    #[test]
    fn test_delete_multiple_conditions_with_limit() {
        let mut clauses = Clauses::new();
        clauses
            .where_(("age", op::LT, 18))
            .or_where(("status", "inactive"))
            .limit(10);
        let query = DeleteBuilder::new("users", &clauses).unwrap();
        assert_eq!(
            query.to_sql().unwrap(),
            "DELETE FROM users WHERE (age < ?) AND (status = ?) LIMIT 10"
        );
        assert_eq!(query.parameters().len(), 2);
    }

    #[test]
    fn test_delete_ignores_having_params() {
        let mut clauses = Clauses::new();
        clauses.where_(("id", 1)).having(("n", 2));
        let query = DeleteBuilder::new("users", &clauses).unwrap();
        assert_eq!(query.parameters(), &[Value::I32(1)]);
    }

    #[test]
    fn test_delete_without_where() {
        let query = DeleteBuilder::new("users", &Clauses::new()).unwrap();
        assert_eq!(query.to_sql().unwrap(), "DELETE FROM users");
    }
}
