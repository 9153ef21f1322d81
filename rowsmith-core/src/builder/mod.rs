//! Statement builders
//!
//! Every terminal engine operation goes through one of these builders: the
//! accumulated [`Clauses`] plus the operation's own input become a
//! [`Statement`] of SQL text and positional parameters.

pub mod clauses;
pub mod common;
pub mod delete;
pub mod insert;
pub mod select;
pub mod update;

// Re-export types from submodules
pub use clauses::Clauses;
pub use common::{
    AggregateFunction, Condition, IntoAssignments, IntoColumns, IntoCondition, Limit,
    OrderByClause, QueryBuilder, SortDirection, Statement,
};
pub use delete::DeleteBuilder;
pub use insert::{InsertBuilder, InsertVerb};
pub use select::{AggregateBuilder, SelectBuilder, AGGREGATE_ALIAS};
pub use update::UpdateBuilder;
