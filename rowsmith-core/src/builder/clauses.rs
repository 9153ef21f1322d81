//! Accumulated clause state between `table()` and a terminal operation

use super::common::{IntoColumns, IntoCondition, Limit, OrderByClause, SortDirection};
use crate::{Error, Result, Value};

/// WHERE / HAVING / ORDER / GROUP / LIMIT / field-list state.
///
/// Every mutator records its fragment together with the values for the
/// fragment's placeholders, so parameter order always follows placeholder
/// order. The first contract violation is kept and reported by [`check`],
/// which statement builders call before producing any SQL.
///
/// [`check`]: Clauses::check
#[derive(Debug, Clone, Default)]
pub struct Clauses {
    where_fragments: Vec<String>,
    where_params: Vec<Value>,
    having_fragments: Vec<String>,
    having_params: Vec<Value>,
    order_by: Vec<OrderByClause>,
    group_by: Vec<String>,
    fields: Vec<String>,
    limit: Option<Limit>,
    violation: Option<String>,
}

impl Clauses {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, message: impl Into<String>) {
        if self.violation.is_none() {
            self.violation = Some(message.into());
        }
    }

    /// Add an AND-joined WHERE condition
    pub fn where_<C: IntoCondition>(&mut self, condition: C) -> &mut Self {
        self.push_where(condition);
        self
    }

    /// Add an "OR" WHERE condition. Requires an earlier `where_`.
    ///
    /// The condition is still joined with AND when rendered; see
    /// [`Clauses::where_sql`].
    pub fn or_where<C: IntoCondition>(&mut self, condition: C) -> &mut Self {
        if self.where_fragments.is_empty() {
            self.fail("or_where must follow a where_ call");
            return self;
        }
        self.push_where(condition);
        self
    }

    fn push_where<C: IntoCondition>(&mut self, condition: C) {
        match condition.into_condition().render() {
            Ok((fragment, params)) => {
                self.where_fragments.push(fragment);
                self.where_params.extend(params);
            }
            Err(err) => self.fail(contract_message(err)),
        }
    }

    /// Add an AND-joined HAVING condition
    pub fn having<C: IntoCondition>(&mut self, condition: C) -> &mut Self {
        match condition.into_condition().render() {
            Ok((fragment, params)) => {
                self.having_fragments.push(fragment);
                self.having_params.extend(params);
            }
            Err(err) => self.fail(contract_message(err)),
        }
        self
    }

    /// Append ORDER BY terms from a flat `column, direction, ...` list
    pub fn order(&mut self, pairs: &[&str]) -> &mut Self {
        if pairs.len() % 2 != 0 {
            self.fail(format!(
                "order takes column/direction pairs, got {} values",
                pairs.len()
            ));
            return self;
        }
        let mut parsed = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks(2) {
            match SortDirection::parse(pair[1]) {
                Some(direction) => parsed.push(OrderByClause {
                    column: pair[0].to_string(),
                    direction,
                }),
                None => {
                    self.fail(format!(
                        "order direction for '{}' must be asc or desc, got '{}'",
                        pair[0], pair[1]
                    ));
                    return self;
                }
            }
        }
        self.order_by.extend(parsed);
        self
    }

    /// Replace the GROUP BY column list
    pub fn group<C: IntoColumns>(&mut self, columns: C) -> &mut Self {
        let columns = columns.into_columns();
        if !columns.is_empty() {
            self.group_by = columns;
        }
        self
    }

    /// Replace the selected column list
    pub fn field<C: IntoColumns>(&mut self, columns: C) -> &mut Self {
        let columns = columns.into_columns();
        if !columns.is_empty() {
            self.fields = columns;
        }
        self
    }

    pub fn limit(&mut self, count: u64) -> &mut Self {
        self.limit = Some(Limit::Count(count));
        self
    }

    pub fn limit_offset(&mut self, offset: u64, count: u64) -> &mut Self {
        self.limit = Some(Limit::OffsetCount { offset, count });
        self
    }

    /// The first contract violation recorded by any mutator
    pub fn check(&self) -> Result<()> {
        match &self.violation {
            Some(message) => Err(Error::contract(message.clone())),
            None => Ok(()),
        }
    }

    /// `(a = ?) AND (b > ?)`, or `None` without conditions.
    ///
    /// OR-WHERE conditions are joined with AND like every other condition.
    /// This keeps the established behaviour of the chained API; a true
    /// disjunction is not offered.
    pub fn where_sql(&self) -> Option<String> {
        if self.where_fragments.is_empty() {
            return None;
        }
        Some(
            self.where_fragments
                .iter()
                .map(|fragment| format!("({fragment})"))
                .collect::<Vec<_>>()
                .join(" AND "),
        )
    }

    pub fn having_sql(&self) -> Option<String> {
        if self.having_fragments.is_empty() {
            return None;
        }
        Some(
            self.having_fragments
                .iter()
                .map(|fragment| format!("({fragment})"))
                .collect::<Vec<_>>()
                .join(" AND "),
        )
    }

    pub fn order_sql(&self) -> Option<String> {
        if self.order_by.is_empty() {
            return None;
        }
        Some(
            self.order_by
                .iter()
                .map(|clause| format!("{} {}", clause.column, clause.direction))
                .collect::<Vec<_>>()
                .join(", "),
        )
    }

    pub fn group_sql(&self) -> Option<String> {
        (!self.group_by.is_empty()).then(|| self.group_by.join(", "))
    }

    pub fn limit_sql(&self) -> Option<String> {
        self.limit.map(|limit| limit.to_string())
    }

    /// Selected columns, `*` when no field list was given
    pub fn select_list(&self) -> String {
        if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.join(", ")
        }
    }

    pub fn where_params(&self) -> &[Value] {
        &self.where_params
    }

    pub fn having_params(&self) -> &[Value] {
        &self.having_params
    }

    pub fn has_where(&self) -> bool {
        !self.where_fragments.is_empty()
    }
}

fn contract_message(err: Error) -> String {
    match err {
        Error::Contract { message } => message,
        other => other.to_string(),
    }
}
