//! Error types for sqlweave

use crate::sql::FailedStatement;
use std::fmt;
use thiserror::Error;

/// Result type alias for sqlweave operations
pub type OrmResult<T> = Result<T, OrmError>;

/// The kind of statement an execution error or no-rows error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    /// SELECT query
    Fetch,
    /// INSERT statement
    Insert,
    /// UPDATE statement
    Update,
    /// DELETE statement
    Delete,
}

impl QueryType {
    /// Lower-case verb used in error messages and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Fetch => "fetch",
            QueryType::Insert => "insert",
            QueryType::Update => "update",
            QueryType::Delete => "delete",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error types for formatting and executing statements
#[derive(Debug, Error)]
pub enum OrmError {
    /// Unknown query option name passed to `QueryOptions::set_option`
    #[error("unknown query option `{0}`")]
    UnknownOption(String),

    /// Invalid value for a known query option
    #[error("invalid value for query option `{option}`: {reason}")]
    InvalidOption { option: String, reason: String },

    /// Field name that does not exist on the entity
    #[error("{entity}: unknown field `{field}`")]
    UnknownField { entity: String, field: String },

    /// Malformed field definition (missing/invalid type, bad column name...)
    #[error("{entity}: invalid field `{field}`: {reason}")]
    InvalidField {
        entity: String,
        field: String,
        reason: String,
    },

    /// Condition whose operator, target and value do not fit together
    #[error("invalid condition: {0}")]
    InvalidCondition(String),

    /// Entity used in a statement without a table
    #[error("{0}: no table configured")]
    MissingTable(String),

    /// Statement or identifier validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Statement execution failed in the connection
    #[error("{entity}: {kind} failed: {source} ({statement})")]
    Execute {
        kind: QueryType,
        entity: String,
        statement: FailedStatement,
        #[source]
        source: Box<OrmError>,
    },

    /// `require` was set and the statement returned no rows
    #[error("{entity}: no rows {}", no_rows_verb(.kind))]
    NoRows { kind: QueryType, entity: String },

    /// Rollback failed after the transaction body failed
    #[error("{error} (rollback failed: {rollback_error})")]
    Rollback {
        error: Box<OrmError>,
        rollback_error: Box<OrmError>,
    },

    /// Driver error from tokio-postgres
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

fn no_rows_verb(kind: &QueryType) -> &'static str {
    match kind {
        QueryType::Fetch => "fetched",
        QueryType::Insert => "inserted",
        QueryType::Update => "updated",
        QueryType::Delete => "deleted",
    }
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an unknown field error
    pub fn unknown_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Create an invalid field error
    pub fn invalid_field(
        entity: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            entity: entity.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid option error
    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }

    /// Check if this is a no-rows error
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::NoRows { .. })
    }

    /// The statement kind of an execution or no-rows error
    pub fn query_type(&self) -> Option<QueryType> {
        match self {
            Self::Execute { kind, .. } | Self::NoRows { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether this error was raised while building a statement (never retried)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownOption(_)
                | Self::InvalidOption { .. }
                | Self::UnknownField { .. }
                | Self::InvalidField { .. }
                | Self::InvalidCondition(_)
                | Self::MissingTable(_)
                | Self::Config(_)
        )
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_entity_name() {
        let err = OrmError::unknown_field("User", "nope");
        assert_eq!(err.to_string(), "User: unknown field `nope`");
        assert!(err.is_configuration());
    }

    #[test]
    fn no_rows_is_distinct_per_kind() {
        let err = OrmError::NoRows {
            kind: QueryType::Delete,
            entity: "User".to_string(),
        };
        assert_eq!(err.to_string(), "User: no rows deleted");
        assert!(err.is_no_rows());
        assert_eq!(err.query_type(), Some(QueryType::Delete));
        assert!(!err.is_configuration());
    }
}
