//! Raw SQL fragments.

use crate::sql::Sql;
use serde_json::Value;

/// A literal SQL fragment that bypasses formatting.
///
/// The text is emitted verbatim (no column resolution, no quoting) and its
/// values are spliced into the statement at the fragment's position. Any `?`
/// in the text must be matched by one entry in `values`.
///
/// **Warning**: Raw text is not escaped. Only use with trusted SQL.
#[derive(Debug, Clone, PartialEq)]
pub struct Raw {
    pub sql: String,
    pub values: Vec<Value>,
}

impl Raw {
    /// A fragment without values.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            values: Vec::new(),
        }
    }

    /// A fragment with its own bound values.
    pub fn with_values(sql: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            values,
        }
    }

    /// The fragment as-is.
    pub fn format(&self) -> Sql {
        Sql::with_values(self.sql.clone(), self.values.clone())
    }
}

impl From<&str> for Raw {
    fn from(sql: &str) -> Self {
        Raw::new(sql)
    }
}

impl From<String> for Raw {
    fn from(sql: String) -> Self {
        Raw::new(sql)
    }
}
