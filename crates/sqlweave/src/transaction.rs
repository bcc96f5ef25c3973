//! Transaction helpers.
//!
//! [`transaction!`] sends `BEGIN`, runs the block, then sends `COMMIT` on
//! `Ok` or `ROLLBACK` on `Err`. All three go through the same
//! [`Connection`], so the connection must map to a single session (a
//! `tokio_postgres::Client`, not a pool).
//!
//! # Example
//!
//! ```ignore
//! use sqlweave::{query, OrmResult};
//!
//! let moved = sqlweave::transaction!(client, {
//!     query(&account).and_where(debit).update(&client, &debited).await?;
//!     query(&account).and_where(credit).update(&client, &credited).await?;
//!     Ok(())
//! })?;
//! ```

use crate::client::Connection;
use crate::error::{OrmError, OrmResult};

/// Runs the given block inside a database transaction.
///
/// - Sends `BEGIN` through `$conn`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`; if the rollback fails too, the result is
///   [`OrmError::Rollback`](crate::OrmError::Rollback) carrying both errors.
///
/// The block must evaluate to `sqlweave::OrmResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($conn:expr, $body:block) => {{
        let __sqlweave_conn = &$conn;
        match $crate::transaction::begin(__sqlweave_conn).await {
            Ok(()) => {
                let __sqlweave_result: $crate::OrmResult<_> = async { $body }.await;
                $crate::transaction::finish(__sqlweave_conn, __sqlweave_result).await
            }
            Err(error) => Err(error),
        }
    }};
}

#[doc(hidden)]
pub async fn begin<C: Connection>(conn: &C) -> OrmResult<()> {
    conn.execute("BEGIN", &[]).await
}

#[doc(hidden)]
pub async fn finish<C: Connection, T>(conn: &C, result: OrmResult<T>) -> OrmResult<T> {
    match result {
        Ok(value) => {
            conn.execute("COMMIT", &[]).await?;
            Ok(value)
        }
        Err(error) => match conn.execute("ROLLBACK", &[]).await {
            Ok(()) => Err(error),
            Err(rollback_error) => {
                tracing::warn!(
                    target: "sqlweave.sql",
                    error = %error,
                    rollback_error = %rollback_error,
                    "rollback failed"
                );
                Err(OrmError::Rollback {
                    error: Box::new(error),
                    rollback_error: Box::new(rollback_error),
                })
            }
        },
    }
}
