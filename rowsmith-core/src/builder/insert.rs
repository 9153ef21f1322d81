//! INSERT / REPLACE statement builder

use super::common::{require_table, QueryBuilder};
use crate::{Error, Record, Result, Value};

/// Which verb starts the statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertVerb {
    Insert,
    Replace,
}

impl std::fmt::Display for InsertVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InsertVerb::Insert => write!(f, "INSERT"),
            InsertVerb::Replace => write!(f, "REPLACE"),
        }
    }
}

/// INSERT / REPLACE builder for one or many records of the same type.
///
/// Auto-generated columns are left out. Column names come from the record's
/// field descriptors; one placeholder group is emitted per record and the
/// parameters are flattened record by record.
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    verb: InsertVerb,
    table_name: String,
    columns: Vec<&'static str>,
    row_count: usize,
    parameters: Vec<Value>,
}

impl InsertBuilder {
    /// Builder for a single record
    pub fn record<R: Record>(verb: InsertVerb, table: &str, record: &R) -> Result<Self> {
        Self::batch(verb, table, std::slice::from_ref(record))
    }

    /// Builder for a batch of records. Empty batches are rejected.
    pub fn batch<R: Record>(verb: InsertVerb, table: &str, records: &[R]) -> Result<Self> {
        require_table(table)?;
        let first = records
            .first()
            .ok_or_else(|| Error::contract("batch insert needs at least one record"))?;

        let columns: Vec<&'static str> = first
            .insert_values()
            .into_iter()
            .map(|(column, _)| column)
            .collect();
        if columns.is_empty() {
            return Err(Error::contract("record has no insertable fields"));
        }

        let mut parameters = Vec::with_capacity(columns.len() * records.len());
        for record in records {
            parameters.extend(record.insert_values().into_iter().map(|(_, value)| value));
        }

        Ok(Self {
            verb,
            table_name: table.to_string(),
            columns,
            row_count: records.len(),
            parameters,
        })
    }
}

impl QueryBuilder for InsertBuilder {
    fn to_sql(&self) -> Result<String> {
        let mut sql = String::new();

        sql.push_str(&format!("{} INTO ", self.verb));
        sql.push_str(&self.table_name);

        // Columns
        sql.push_str(" (");
        sql.push_str(&self.columns.join(", "));
        sql.push(')');

        // VALUES clause
        sql.push_str(" VALUES ");
        let group = format!("({})", vec!["?"; self.columns.len()].join(", "));
        sql.push_str(&vec![group; self.row_count].join(", "));

        Ok(sql)
    }

    fn parameters(&self) -> &[Value] {
        &self.parameters
    }
}
