//! Rowsmith Core - a chained SQL statement builder and struct-to-row mapper
//! for MySQL-family databases.
//!
//! Structs opt in with [`record!`], which registers their fields once for
//! both directions of mapping. An [`Engine`] accumulates clauses between a
//! [`Engine::table`] call and a terminal operation, builds a parameterized
//! statement, and runs it through a [`ConnectionPool`] or the engine's active
//! transaction.

pub mod builder;
pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod executor;
pub mod operator;
pub mod record;
pub mod row;
pub mod value;

// Re-export main types
pub use builder::{
    AggregateFunction, Clauses, Condition, IntoAssignments, IntoColumns, IntoCondition,
    QueryBuilder, SortDirection, Statement,
};
pub use config::DatabaseConfig;
pub use decode::FromText;
pub use engine::{AggregateResultExt, Engine, AGGREGATE_SENTINEL};
pub use error::{Error, Result};
pub use executor::{ConnectionPool, ExecResult, Transaction};
pub use operator::{op, IntoOperator, Operator};
pub use record::{FieldDescriptor, Record, ToValue};
pub use row::{FromRow, RawRows, RawValue, TextRow};
pub use value::Value;
