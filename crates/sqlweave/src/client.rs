//! Connection trait for statement execution.

use crate::error::OrmResult;
use serde_json::{Map, Value};

/// One row as returned by a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRow {
    /// Values in column order.
    Positional(Vec<Value>),
    /// Values keyed by column ordinal (`"0"`, `"1"`, …) or by column alias.
    Keyed(Map<String, Value>),
}

impl From<Vec<Value>> for RawRow {
    fn from(values: Vec<Value>) -> Self {
        RawRow::Positional(values)
    }
}

impl From<Map<String, Value>> for RawRow {
    fn from(map: Map<String, Value>) -> Self {
        RawRow::Keyed(map)
    }
}

/// Executes formatted statements.
///
/// Statements arrive with `?` placeholders and values in placeholder order.
/// Implementations that need another placeholder style rewrite the text
/// themselves. `BEGIN`, `COMMIT` and `ROLLBACK` are sent through
/// [`Connection::query`] as well, so one connection value must map to one
/// session for transactions to work.
pub trait Connection: Send + Sync {
    /// Execute a statement and return all rows.
    fn query(
        &self,
        sql: &str,
        values: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<Vec<RawRow>>> + Send;

    /// Execute a statement and discard the rows.
    fn execute(
        &self,
        sql: &str,
        values: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<()>> + Send {
        async move {
            self.query(sql, values).await?;
            Ok(())
        }
    }
}

impl<C: Connection> Connection for &C {
    fn query(
        &self,
        sql: &str,
        values: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<Vec<RawRow>>> + Send {
        (**self).query(sql, values)
    }
}
