//! Error types for rowsmith

use std::panic::Location;
use thiserror::Error;

/// The main error type for rowsmith operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or execution error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A backend failure annotated with the engine operation and call site
    #[error("{operation} failed at {location}: {source}")]
    Backend {
        operation: &'static str,
        location: String,
        #[source]
        source: Box<Error>,
    },

    /// The caller broke an argument contract (arity, kind, ordering of calls).
    /// Raised before any statement reaches the backend.
    #[error("Contract violation: {message}")]
    Contract { message: String },

    /// A column value could not be coerced into the destination field type
    #[error("Cannot decode column '{column}' value {value:?} as {target}")]
    Decode {
        column: String,
        value: String,
        target: &'static str,
    },

    /// A single-row lookup matched nothing
    #[error("No rows found in table '{table}'")]
    NotFound { table: String },

    /// Transaction state transition rejected
    #[error("Transaction error: {message}")]
    Transaction { message: String },

    /// Invalid connection configuration
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Convenience Result type for rowsmith operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new contract violation error
    pub fn contract(message: impl Into<String>) -> Self {
        Self::Contract {
            message: message.into(),
        }
    }

    /// Create a new decode error
    pub fn decode(column: impl Into<String>, value: impl Into<String>, target: &'static str) -> Self {
        Self::Decode {
            column: column.into(),
            value: value.into(),
            target,
        }
    }

    /// Create a new not found error
    pub fn not_found(table: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
        }
    }

    /// Create a new transaction state error
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Wrap this error with the engine operation that produced it and the
    /// source location of the caller.
    #[track_caller]
    pub fn at(self, operation: &'static str) -> Self {
        self.at_location(operation, Location::caller())
    }

    /// [`at`](Self::at) with a location captured earlier, for futures built
    /// by `#[track_caller]` wrappers
    pub fn at_location(self, operation: &'static str, location: &Location<'_>) -> Self {
        Self::Backend {
            operation,
            location: format!("{}:{}", location.file(), location.line()),
            source: Box::new(self),
        }
    }

    /// True for `NotFound`, including when wrapped by [`Error::at`]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Backend { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// True for `Contract`, including when wrapped by [`Error::at`]
    pub fn is_contract(&self) -> bool {
        match self {
            Self::Contract { .. } => true,
            Self::Backend { source, .. } => source.is_contract(),
            _ => false,
        }
    }
}
