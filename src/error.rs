//! Error types for KyroWorld.
//!
//! Errors are strongly typed using thiserror and split by how a caller is
//! expected to react:
//! - [`SchemaError`]: configuration mistakes found while the schema is being
//!   declared. Startup code treats these as fatal.
//! - [`StoreError`]: misuse of the relation store contract (unknown tables,
//!   mistyped values). These indicate a programming error.
//! - [`WorldError`]: top-level error wrapping the above plus world-level
//!   contract violations such as unbalanced transaction brackets.
//!
//! Attempts to break a relation invariant (duplicate add, overriding something
//! that is not inherited) are *not* errors; they are reported through
//! [`crate::Outcome`].

use thiserror::Error;

use crate::node::NodeId;
use crate::value::ValueType;

/// Errors raised while declaring the schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Table '{table}' is already registered")]
    DuplicateTable {
        table: String,
    },

    #[error("Malformed table name '{name}'")]
    MalformedTableName {
        name: String,
    },

    #[error("Malformed column name '{column}' in table '{table}'")]
    MalformedColumnName {
        table: String,
        column: String,
    },

    #[error("Column '{column}' appears twice in table '{table}'")]
    DuplicateColumn {
        table: String,
        column: String,
    },

    #[error("Unknown value type '{type_name}' for column '{column}' in table '{table}'")]
    UnknownValueType {
        table: String,
        column: String,
        type_name: String,
    },

    #[error("Unknown node type '{name}'")]
    UnknownNodeType {
        name: String,
    },

    #[error("Table '{table}' declares no columns")]
    EmptyTable {
        table: String,
    },

    #[error("Invalid schema declaration: {reason}")]
    InvalidDeclaration {
        reason: String,
    },
}

/// Errors raised by the relation store when its contract is violated.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unknown table: {table}")]
    UnknownTable {
        table: String,
    },

    #[error("Unknown column '{column}' in table {table}")]
    UnknownColumn {
        table: String,
        column: String,
    },

    #[error("Missing value for non-nullable column '{column}' in table {table}")]
    MissingColumn {
        table: String,
        column: String,
    },

    #[error("Type mismatch for column '{column}' in table {table}: expected {expected}, got {actual}")]
    TypeMismatch {
        table: String,
        column: String,
        expected: ValueType,
        actual: ValueType,
    },

    #[error("Table {table} is not a nullable-scalar table")]
    NotNullable {
        table: String,
    },

    #[error("Node not found: {id}")]
    NodeNotFound {
        id: NodeId,
    },
}

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },
}

/// Top-level error type for KyroWorld.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unbalanced transaction: stop_change called with no open bracket")]
    UnbalancedTransaction,

    #[error("Snapshot schema fingerprint {actual} does not match registry fingerprint {expected}")]
    SnapshotMismatch {
        expected: String,
        actual: String,
    },

    #[error("Invalid snapshot: {reason}")]
    InvalidSnapshot {
        reason: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl WorldError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a schema (configuration) error.
    #[must_use]
    pub const fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_))
    }

    /// Returns true if this is a store contract error.
    #[must_use]
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns true if this error reports an unbalanced transaction bracket.
    #[must_use]
    pub const fn is_unbalanced_transaction(&self) -> bool {
        matches!(self, Self::UnbalancedTransaction)
    }

    /// Returns true if a restored snapshot broke a graph or store invariant.
    #[must_use]
    pub const fn is_invalid_snapshot(&self) -> bool {
        matches!(self, Self::InvalidSnapshot { .. })
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for KyroWorld operations.
pub type WorldResult<T> = Result<T, WorldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_duplicate_table() {
        let err = SchemaError::DuplicateTable {
            table: "entity.attributes".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("entity.attributes"));
        assert!(msg.contains("already registered"));
    }

    #[test]
    fn test_store_error_type_mismatch() {
        let err = StoreError::TypeMismatch {
            table: "valued<attribute>.quantity".to_string(),
            column: "quantity".to_string(),
            expected: ValueType::Range,
            actual: ValueType::Text,
        };
        let msg = format!("{err}");
        assert!(msg.contains("expected range"));
        assert!(msg.contains("got text"));
    }

    #[test]
    fn test_world_error_from_schema() {
        let err: WorldError = SchemaError::EmptyTable {
            table: "x".to_string(),
        }
        .into();
        assert!(err.is_schema());
        assert!(!err.is_store());
    }

    #[test]
    fn test_world_error_from_store() {
        let err: WorldError = StoreError::NodeNotFound { id: NodeId::from_raw(7) }.into();
        assert!(err.is_store());
        assert!(format!("{err}").contains("#7"));
    }

    #[test]
    fn test_world_error_unbalanced() {
        let err = WorldError::UnbalancedTransaction;
        assert!(err.is_unbalanced_transaction());
        assert!(format!("{err}").contains("no open bracket"));
    }

    #[test]
    fn test_world_error_internal() {
        let err = WorldError::internal("unexpected state");
        assert!(err.is_internal());
        assert!(format!("{err}").contains("unexpected state"));
    }
}
