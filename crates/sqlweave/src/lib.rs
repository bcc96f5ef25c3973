//! # sqlweave
//!
//! An entity-aware SQL compiler for PostgreSQL.
//!
//! ## Features
//!
//! - **Parameterized output**: every value becomes a `?` placeholder; values
//!   are returned in placeholder order
//! - **Composable conditions**: conditions, groupings, raw fragments and
//!   sub-queries nest freely and share one table alias
//! - **Whole statements**: SELECT, INSERT (batched), UPDATE, batch UPDATE,
//!   DELETE and COUNT from one set of query options
//! - **Row unzipping**: returned rows come back keyed by field, with joined
//!   entities nested under their alias
//! - **Transaction-friendly**: pass a transaction anywhere a [`Connection`]
//!   is expected
//!
//! ## Example
//!
//! ```ignore
//! use sqlweave::{query, Condition, Entity, Field, FieldType};
//!
//! let user = Entity::builder("User")
//!     .table("user")
//!     .field(Field::new("id", FieldType::Integer).primary())
//!     .field(Field::new("name", FieldType::Text))
//!     .build()?;
//!
//! let statement = query(&user)
//!     .and_where(Condition::is_in("id", vec![1, 2, 3]))
//!     .to_statement()?;
//! // SELECT user.id, user.name FROM user WHERE user.id IN (?, ?, ?)
//!
//! let rows = query(&user).limit(10).fetch(&client).await?;
//! ```

pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod expr;
pub mod format;
pub mod ident;
pub mod options;
pub mod pg;
pub mod query;
pub mod raw;
pub mod registry;
pub mod row;
pub mod sql;
pub mod transaction;

pub use client::{Connection, RawRow};
pub use config::{Schema, SchemaConfig};
pub use entity::{Entity, EntityBuilder, Field, FieldDef, FieldRef, FieldType, NamingStrategy};
pub use error::{OrmError, OrmResult, QueryType};
pub use expr::{Condition, Expr, FormatContext, Grouping, Junction, Operator, Target};
pub use format::{InsertSource, SqlFormatter};
pub use ident::Ident;
pub use options::{Column, ColumnSource, Direction, OrderBy, QueryOptions};
pub use query::{Join, JoinKind, Query, query};
pub use raw::Raw;
pub use registry::Registry;
pub use row::{Record, RecordExt};
pub use sql::{FailedStatement, Sql, Statement, sql};

pub use serde_json::Value;

// Re-export tokio_postgres for the adapter's Connection impls
pub use tokio_postgres;
