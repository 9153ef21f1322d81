//! Common types and traits shared across all statement builders

use crate::{Error, IntoOperator, Operator, Record, Result, Value};

/// Core trait for all statement builders
pub trait QueryBuilder {
    /// Generate the SQL statement text
    fn to_sql(&self) -> Result<String>;

    /// Get the parameters for the statement, in placeholder order
    fn parameters(&self) -> &[Value];

    /// SQL text and parameters together, ready for execution
    fn build(&self) -> Result<Statement> {
        Ok(Statement {
            sql: self.to_sql()?,
            params: self.parameters().to_vec(),
        })
    }
}

/// A finished statement: SQL text plus the values for its `?` placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    /// Literal SQL with no parameters
    pub fn raw(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            params: Vec::new(),
        }
    }

    /// The statement with every placeholder replaced by its literal value.
    /// For logs only.
    pub fn interpolated(&self) -> String {
        let mut out = String::with_capacity(self.sql.len());
        let mut params = self.params.iter();
        for ch in self.sql.chars() {
            match (ch, params.as_slice().is_empty()) {
                ('?', false) => {
                    if let Some(value) = params.next() {
                        out.push_str(&value.to_sql_literal());
                    }
                }
                _ => out.push(ch),
            }
        }
        out
    }
}

/// A WHERE / HAVING predicate before rendering
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Every mapped field of a record, as `column = ?` joined with AND
    Fields(Vec<(&'static str, Value)>),
    /// `column operator value`
    Compare {
        column: String,
        operator: Operator,
        value: Value,
    },
}

impl Condition {
    /// Render into a fragment and the values for its placeholders, left to
    /// right.
    pub fn render(self) -> Result<(String, Vec<Value>)> {
        match self {
            Condition::Fields(pairs) => {
                if pairs.is_empty() {
                    return Err(Error::contract("record condition has no mapped fields"));
                }
                let text = pairs
                    .iter()
                    .map(|(column, _)| format!("{column} = ?"))
                    .collect::<Vec<_>>()
                    .join(" AND ");
                let params = pairs.into_iter().map(|(_, value)| value).collect();
                Ok((text, params))
            }
            Condition::Compare {
                column,
                operator,
                value,
            } => {
                if operator.is_set_membership() {
                    let items = match value {
                        Value::Array(items) => items,
                        other => {
                            return Err(Error::contract(format!(
                                "'{operator}' on column '{column}' needs a list of values, got {}",
                                other.type_name()
                            )))
                        }
                    };
                    if items.is_empty() {
                        return Err(Error::contract(format!(
                            "'{operator}' on column '{column}' needs at least one value"
                        )));
                    }
                    if items.iter().any(|item| item.as_array().is_some()) {
                        return Err(Error::contract(format!(
                            "'{operator}' on column '{column}' cannot take nested lists"
                        )));
                    }
                    let placeholders = vec!["?"; items.len()].join(", ");
                    Ok((format!("{column} {operator} ({placeholders})"), items))
                } else if value.as_array().is_some() {
                    Err(Error::contract(format!(
                        "a list of values on column '{column}' needs 'in' or 'not in', got '{operator}'"
                    )))
                } else {
                    Ok((format!("{column} {operator} ?"), vec![value]))
                }
            }
        }
    }
}

/// Trait for the argument shapes accepted by WHERE, OR-WHERE and HAVING
pub trait IntoCondition {
    fn into_condition(self) -> Condition;
}

impl IntoCondition for Condition {
    fn into_condition(self) -> Condition {
        self
    }
}

// Record shorthand: where_(&user)
impl<R> IntoCondition for &R
where
    R: Record,
{
    fn into_condition(self) -> Condition {
        Condition::Fields(self.column_values())
    }
}

// Shorthand equality: where_(("age", 18))
impl<T> IntoCondition for (&str, T)
where
    T: Into<Value>,
{
    fn into_condition(self) -> Condition {
        Condition::Compare {
            column: self.0.to_string(),
            operator: Operator::EQ,
            value: self.1.into(),
        }
    }
}

// Explicit operators: where_(("age", op::GT, 18)) or where_(("id", "in", vec![1, 2]))
impl<T, O> IntoCondition for (&str, O, T)
where
    T: Into<Value>,
    O: IntoOperator,
{
    fn into_condition(self) -> Condition {
        Condition::Compare {
            column: self.0.to_string(),
            operator: self.1.into_operator(),
            value: self.2.into(),
        }
    }
}

/// Trait for the argument shapes accepted by UPDATE
pub trait IntoAssignments {
    fn into_assignments(self) -> Vec<(String, Value)>;
}

impl<R> IntoAssignments for &R
where
    R: Record,
{
    fn into_assignments(self) -> Vec<(String, Value)> {
        self.column_values()
            .into_iter()
            .map(|(column, value)| (column.to_string(), value))
            .collect()
    }
}

impl<T> IntoAssignments for (&str, T)
where
    T: Into<Value>,
{
    fn into_assignments(self) -> Vec<(String, Value)> {
        vec![(self.0.to_string(), self.1.into())]
    }
}

/// Aggregation function types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl std::fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateFunction::Count => write!(f, "COUNT"),
            AggregateFunction::Sum => write!(f, "SUM"),
            AggregateFunction::Avg => write!(f, "AVG"),
            AggregateFunction::Min => write!(f, "MIN"),
            AggregateFunction::Max => write!(f, "MAX"),
        }
    }
}

/// Trait to convert various types into columns
pub trait IntoColumns {
    fn into_columns(self) -> Vec<String>;
}

impl IntoColumns for &str {
    fn into_columns(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoColumns for String {
    fn into_columns(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoColumns for Vec<String> {
    fn into_columns(self) -> Vec<String> {
        self
    }
}

impl IntoColumns for Vec<&str> {
    fn into_columns(self) -> Vec<String> {
        self.into_iter().map(|s| s.to_string()).collect()
    }
}

impl IntoColumns for &[&str] {
    fn into_columns(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl<const N: usize> IntoColumns for [&str; N] {
    fn into_columns(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

// For tuples
impl IntoColumns for (&str, &str) {
    fn into_columns(self) -> Vec<String> {
        vec![self.0.to_string(), self.1.to_string()]
    }
}

impl IntoColumns for (&str, &str, &str) {
    fn into_columns(self) -> Vec<String> {
        vec![self.0.to_string(), self.1.to_string(), self.2.to_string()]
    }
}

/// Sort direction for ORDER BY clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// `asc` / `desc` in any casing
    pub fn parse(direction: &str) -> Option<Self> {
        if direction.eq_ignore_ascii_case("asc") {
            Some(SortDirection::Asc)
        } else if direction.eq_ignore_ascii_case("desc") {
            Some(SortDirection::Desc)
        } else {
            None
        }
    }
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// An ORDER BY clause
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByClause {
    pub column: String,
    pub direction: SortDirection,
}

/// LIMIT clause: a row count, optionally preceded by an offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Count(u64),
    OffsetCount { offset: u64, count: u64 },
}

impl std::fmt::Display for Limit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Limit::Count(count) => write!(f, "{count}"),
            Limit::OffsetCount { offset, count } => write!(f, "{offset},{count}"),
        }
    }
}

/// Reject statements against an unset table
pub(crate) fn require_table(table: &str) -> Result<()> {
    if table.trim().is_empty() {
        Err(Error::contract("no table selected; call table() first"))
    } else {
        Ok(())
    }
}
