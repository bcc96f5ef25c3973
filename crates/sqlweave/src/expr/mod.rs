//! Expression layer for WHERE/HAVING/ON clauses and bound values.
//!
//! Every node that can appear in a formatted statement is an [`Expr`]:
//! literal values, operand lists, column references, sub-queries, raw
//! fragments, conditions and groupings. Formatting walks the tree once and
//! returns a [`Sql`] fragment whose values follow the placeholder order.
//!
//! Nested nodes are formatted with the same [`FormatContext`], so a table
//! alias set on the outer query qualifies every column below it. Sub-queries
//! are the exception: they are formatted with their own context.
//!
//! ```ignore
//! use sqlweave::{Condition, Grouping};
//!
//! let by_name = Grouping::or([
//!     Grouping::equals_all([("id", 1), ("name", "foo")]),
//!     Grouping::equals_all([("id", 2), ("name", "bar")]),
//! ]);
//! // ((user.id = ? AND user.name = ?) OR (user.id = ? AND user.name = ?))
//! ```

mod condition;
mod grouping;


pub use condition::{Condition, Operator, Target};
pub use grouping::{Grouping, Junction};
pub(crate) use grouping::format_items;

use crate::entity::{Entity, FieldRef};
use crate::error::OrmResult;
use crate::ident::{self, Ident};
use crate::query::Query;
use crate::raw::Raw;
use crate::sql::Sql;
use serde_json::Value;
use std::sync::Arc;

/// A formattable node.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal bound as one placeholder. Arrays are bound whole, except as
    /// the operand set of `in`/`between`.
    Value(Value),

    /// An operand list, expanded item by item by `in`/`between`.
    List(Vec<Expr>),

    /// A column of a specific entity.
    Field(FieldRef),

    /// A field name resolved through the entity being formatted.
    Column(String),

    /// A nested SELECT, formatted in isolation and parenthesized.
    SubQuery(Box<Query>),

    /// A raw SQL fragment, emitted verbatim.
    Raw(Raw),

    /// A single predicate.
    Condition(Box<Condition>),

    /// An AND/OR combination.
    Group(Grouping),

    /// A placeholder with no bound value.
    ///
    /// Statements containing one fail validation unless the value is supplied
    /// some other way.
    Unbound,
}

impl Expr {
    /// A column reference resolved through the formatting entity.
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    /// A raw SQL fragment without values.
    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(Raw::new(sql))
    }

    /// AND of all items.
    pub fn and<I, E>(items: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::Group(Grouping::and(items))
    }

    /// OR of all items.
    pub fn or<I, E>(items: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::Group(Grouping::or(items))
    }

    /// Whether formatting produces no SQL at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Expr::Group(group) => group.is_empty(),
            _ => false,
        }
    }

    /// Format the node into SQL text and values.
    pub fn format(&self, ctx: &FormatContext<'_>) -> OrmResult<Sql> {
        match self {
            Expr::Value(value) => {
                let mut sql = Sql::empty();
                sql.push_bind(value.clone());
                Ok(sql)
            }
            Expr::List(items) => format_list(items, ctx),
            Expr::Field(field) => Ok(Sql::new(ctx.field_column(field)?)),
            Expr::Column(name) => Ok(Sql::new(ctx.column(name)?)),
            Expr::SubQuery(query) => crate::format::format_subquery(query),
            Expr::Raw(raw) => Ok(raw.format()),
            Expr::Condition(condition) => condition.format(ctx),
            Expr::Group(group) => group.format(ctx),
            Expr::Unbound => {
                let mut sql = Sql::empty();
                sql.push_unbound();
                Ok(sql)
            }
        }
    }

    /// Format the items of an operand list, or `None` when this node is not one.
    ///
    /// At most `limit` items are formatted; the rest contribute neither text
    /// nor values.
    pub(crate) fn format_operands(
        &self,
        ctx: &FormatContext<'_>,
        limit: Option<usize>,
    ) -> OrmResult<Option<Vec<Sql>>> {
        let limit = limit.unwrap_or(usize::MAX);
        match self {
            Expr::List(items) => items
                .iter()
                .take(limit)
                .map(|item| item.format(ctx))
                .collect::<OrmResult<Vec<_>>>()
                .map(Some),
            Expr::Value(Value::Array(items)) => Ok(Some(
                items
                    .iter()
                    .take(limit)
                    .map(|item| {
                        let mut sql = Sql::empty();
                        sql.push_bind(item.clone());
                        sql
                    })
                    .collect(),
            )),
            _ => Ok(None),
        }
    }
}

// A list outside `in`/`between`: plain values travel as one array parameter,
// anything else is rendered as a row constructor.
fn format_list(items: &[Expr], ctx: &FormatContext<'_>) -> OrmResult<Sql> {
    let values: Option<Vec<Value>> = items
        .iter()
        .map(|item| match item {
            Expr::Value(value) => Some(value.clone()),
            _ => None,
        })
        .collect();
    if let Some(values) = values {
        let mut sql = Sql::empty();
        sql.push_bind(Value::Array(values));
        return Ok(sql);
    }

    let parts = items
        .iter()
        .map(|item| item.format(ctx))
        .collect::<OrmResult<Vec<_>>>()?;
    let mut sql = Sql::empty();
    sql.push_joined(parts, ", ");
    Ok(sql.parenthesized())
}

/// Per-call formatting state: the entity whose fields plain names resolve
/// against and the alias that qualifies its columns.
#[derive(Debug, Clone, Copy)]
pub struct FormatContext<'a> {
    entity: &'a Entity,
    alias: Option<&'a Ident>,
}

impl<'a> FormatContext<'a> {
    /// A context for `entity` without an alias.
    pub fn new(entity: &'a Entity) -> Self {
        Self {
            entity,
            alias: None,
        }
    }

    /// Qualify columns with `alias` instead of the table name.
    pub fn with_alias(mut self, alias: Option<&'a Ident>) -> Self {
        self.alias = alias;
        self
    }

    pub fn entity(&self) -> &'a Entity {
        self.entity
    }

    pub fn alias(&self) -> Option<&'a Ident> {
        self.alias
    }

    /// The alias if set, else the entity's table.
    pub fn qualifier(&self) -> OrmResult<&'a Ident> {
        match self.alias {
            Some(alias) => Ok(alias),
            None => self.entity.require_table(),
        }
    }

    /// `qualifier.column` for one of the entity's fields.
    pub fn column(&self, field: &str) -> OrmResult<String> {
        let def = self.entity.field(field)?;
        Ok(ident::qualified(self.qualifier()?, &def.column))
    }

    /// `qualifier.column` for a field reference.
    ///
    /// Fields of the formatting entity follow the alias; fields of other
    /// entities are qualified by their own table.
    pub fn field_column(&self, field: &FieldRef) -> OrmResult<String> {
        if std::ptr::eq(Arc::as_ptr(field.entity()), self.entity) {
            return self.column(field.name());
        }
        let owner = field.entity();
        let def = field.def()?;
        Ok(ident::qualified(owner.require_table()?, &def.column))
    }
}

macro_rules! expr_from_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Expr {
                fn from(value: $t) -> Self {
                    Expr::Value(Value::from(value))
                }
            }
        )*
    };
}

expr_from_value!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, &str, String);

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Value(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Expr {
    fn from(items: Vec<T>) -> Self {
        Expr::List(items.into_iter().map(|v| Expr::Value(v.into())).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Expr {
    fn from(value: Option<T>) -> Self {
        Expr::Value(value.map_or(Value::Null, Into::into))
    }
}

impl From<FieldRef> for Expr {
    fn from(field: FieldRef) -> Self {
        Expr::Field(field)
    }
}

impl From<Query> for Expr {
    fn from(query: Query) -> Self {
        Expr::SubQuery(Box::new(query))
    }
}

impl From<Raw> for Expr {
    fn from(raw: Raw) -> Self {
        Expr::Raw(raw)
    }
}

impl From<Condition> for Expr {
    fn from(condition: Condition) -> Self {
        Expr::Condition(Box::new(condition))
    }
}

impl From<Grouping> for Expr {
    fn from(group: Grouping) -> Self {
        Expr::Group(group)
    }
}
