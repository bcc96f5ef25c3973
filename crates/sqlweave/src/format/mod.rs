//! Statement formatting.
//!
//! [`SqlFormatter`] turns a [`Query`] (entity, alias, options with defaults
//! merged in, joins) into complete statements. Each clause has its own
//! `format_*` method returning a fragment; statement methods concatenate the
//! non-empty fragments with single spaces, values in the same order.
//!
//! Formatting is pure: the same query always yields the same statement.

mod delete;
mod insert;
mod select;
mod update;

#[cfg(test)]
mod tests;

pub use insert::InsertSource;

use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use crate::expr::{self, FormatContext, Junction};
use crate::ident::Ident;
use crate::options::{Column, ColumnSource, QueryOptions};
use crate::query::Query;
use crate::sql::Sql;

/// Formats one query into statements.
#[derive(Debug)]
pub struct SqlFormatter<'q> {
    query: &'q Query,
    options: QueryOptions,
    alias: Option<Ident>,
}

impl<'q> SqlFormatter<'q> {
    /// Prepare a formatter; the query's defaults are merged under its options.
    pub fn new(query: &'q Query) -> OrmResult<Self> {
        let options = query.effective_options();
        let alias = query
            .get_alias()
            .map(|alias| {
                Ident::new(alias).map_err(|e| {
                    OrmError::Validation(format!("{}: alias: {e}", query.entity().name()))
                })
            })
            .transpose()?;
        Ok(Self {
            query,
            options,
            alias,
        })
    }

    /// The effective options.
    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn entity(&self) -> &'q Entity {
        self.query.entity()
    }

    /// The context columns of this query are formatted in.
    pub fn context(&self) -> FormatContext<'_> {
        FormatContext::new(self.entity()).with_alias(self.alias.as_ref())
    }

    /// `schema.table` or `table`.
    pub fn format_table(&self) -> OrmResult<String> {
        self.entity().qualified_table()
    }

    /// The table followed by `AS alias` when an alias is set.
    pub fn format_table_alias(&self) -> OrmResult<String> {
        let mut out = self.format_table()?;
        if let Some(alias) = &self.alias {
            out.push_str(" AS ");
            out.push_str(&alias.to_sql());
        }
        Ok(out)
    }

    /// `FROM table [AS alias]`.
    pub fn format_from(&self) -> OrmResult<String> {
        Ok(format!("FROM {}", self.format_table_alias()?))
    }

    pub fn format_distinct(&self) -> &'static str {
        if self.options.is_distinct() {
            "DISTINCT"
        } else {
            ""
        }
    }

    /// The column list and the alias of each column, in the same order.
    ///
    /// Without a `fields` option every entity field is listed.
    pub fn format_columns(&self) -> OrmResult<(Sql, Vec<String>)> {
        let ctx = self.context();
        let defaults: Vec<Column>;
        let columns = match self.options.get_fields() {
            Some(fields) => fields,
            None => {
                defaults = self
                    .entity()
                    .field_names()
                    .into_iter()
                    .map(Column::field)
                    .collect();
                &defaults
            }
        };
        format_column_list(columns, &ctx, None)
    }

    /// `WHERE …` over every `where` item ANDed together, or empty.
    pub fn format_where(&self) -> OrmResult<Sql> {
        self.format_predicate("WHERE ", self.options.get_where())
    }

    /// `HAVING …` over every `having` item ANDed together, or empty.
    pub fn format_having(&self) -> OrmResult<Sql> {
        self.format_predicate("HAVING ", self.options.get_having())
    }

    fn format_predicate(&self, keyword: &str, items: &[expr::Expr]) -> OrmResult<Sql> {
        let body = expr::format_items(Junction::And, items, &self.context())?;
        if body.is_empty() {
            return Ok(Sql::empty());
        }
        let mut sql = Sql::new(keyword);
        sql.push_sql(body);
        Ok(sql)
    }

    /// `GROUP BY a, b`, or empty.
    pub fn format_group_by(&self) -> OrmResult<Sql> {
        let ctx = self.context();
        let parts = self
            .options
            .get_group_by()
            .iter()
            .map(|target| target.format(&ctx))
            .collect::<OrmResult<Vec<_>>>()?;
        Ok(keyword_list("GROUP BY ", parts))
    }

    /// `ORDER BY a ASC, b DESC`, or empty.
    pub fn format_order_by(&self) -> OrmResult<Sql> {
        let ctx = self.context();
        let parts = self
            .options
            .get_order_by()
            .iter()
            .map(|order| {
                let mut sql = order.target.format(&ctx)?;
                sql.push(" ").push(order.direction.as_sql());
                Ok(sql)
            })
            .collect::<OrmResult<Vec<_>>>()?;
        Ok(keyword_list("ORDER BY ", parts))
    }

    /// `LIMIT n` as a literal; `first` forces `LIMIT 1`.
    pub fn format_limit(&self) -> String {
        let limit = if self.options.is_first() {
            Some(1)
        } else {
            self.options.get_limit()
        };
        limit.map(|n| format!("LIMIT {n}")).unwrap_or_default()
    }

    /// `OFFSET n` as a literal.
    pub fn format_offset(&self) -> String {
        self.options
            .get_offset()
            .map(|n| format!("OFFSET {n}"))
            .unwrap_or_default()
    }

    /// Row locking: `FOR UPDATE|FOR SHARE [OF …] [NOWAIT] [SKIP LOCKED]`.
    ///
    /// `of`, `noWait` and `skipLocked` only apply together with a lock mode.
    pub fn format_locking(&self) -> OrmResult<String> {
        let mode = if self.options.is_for_update() {
            "FOR UPDATE"
        } else if self.options.is_for_share() {
            "FOR SHARE"
        } else {
            return Ok(String::new());
        };

        let mut out = mode.to_string();
        let of = self.options.get_of();
        if !of.is_empty() {
            let tables = of
                .iter()
                .map(|t| Ident::new(t.as_str()).map(|t| t.to_sql()))
                .collect::<OrmResult<Vec<_>>>()?;
            out.push_str(" OF ");
            out.push_str(&tables.join(", "));
        }
        if self.options.is_no_wait() {
            out.push_str(" NOWAIT");
        }
        if self.options.is_skip_locked() {
            out.push_str(" SKIP LOCKED");
        }
        Ok(out)
    }

    /// `RETURNING …` over the selected columns, with their aliases.
    pub fn format_returning(&self) -> OrmResult<(Sql, Vec<String>)> {
        let (columns, aliases) = self.format_columns()?;
        let mut sql = Sql::new("RETURNING ");
        sql.push_sql(columns);
        Ok((sql, aliases))
    }

    fn batch_size(&self) -> OrmResult<Option<usize>> {
        match self.options.get_batch_size() {
            Some(0) => Err(OrmError::invalid_option(
                "batchSize",
                "must be a positive integer",
            )),
            size => Ok(size),
        }
    }

    /// Split `rows` into contiguous chunks of at most `batchSize` rows.
    pub fn batches<'r, T>(&self, rows: &'r [T]) -> OrmResult<Vec<&'r [T]>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        Ok(match self.batch_size()? {
            Some(size) => rows.chunks(size).collect(),
            None => vec![rows],
        })
    }
}

fn keyword_list(keyword: &str, parts: Vec<Sql>) -> Sql {
    if parts.is_empty() {
        return Sql::empty();
    }
    let mut sql = Sql::new(keyword);
    sql.push_joined(parts, ", ");
    sql
}

/// Format columns against `ctx`. With `prefix`, aliases become
/// `{prefix}.{alias}` and are always emitted.
pub(crate) fn format_column_list(
    columns: &[Column],
    ctx: &FormatContext<'_>,
    prefix: Option<&str>,
) -> OrmResult<(Sql, Vec<String>)> {
    let mut parts = Vec::with_capacity(columns.len());
    let mut aliases = Vec::with_capacity(columns.len());
    for column in columns {
        let alias = match prefix {
            Some(prefix) => format!("{prefix}.{}", column.alias),
            None => column.alias.clone(),
        };
        let (mut sql, needs_alias) = match &column.source {
            ColumnSource::Field(name) => (Sql::new(ctx.column(name)?), alias != *name),
            ColumnSource::Raw(raw) => (raw.format(), true),
            ColumnSource::SubQuery(query) => (format_subquery(query)?, true),
        };
        if needs_alias {
            let alias = Ident::new(alias.as_str()).map_err(|e| {
                OrmError::invalid_option("fields", format!("{}: {e}", ctx.entity().name()))
            })?;
            sql.push(" AS ").push(&alias.to_sql());
        }
        parts.push(sql);
        aliases.push(alias);
    }
    let mut sql = Sql::empty();
    sql.push_joined(parts, ", ");
    Ok((sql, aliases))
}

/// A query formatted as a parenthesized SELECT with its own context.
pub(crate) fn format_subquery(query: &Query) -> OrmResult<Sql> {
    let statement = SqlFormatter::new(query)?.format_select()?;
    Ok(Sql::with_values(statement.sql, statement.values).parenthesized())
}

/// Join the non-empty clauses with single spaces.
fn assemble(clauses: Vec<Sql>) -> Sql {
    let mut sql = Sql::empty();
    sql.push_joined(clauses, " ");
    sql
}
