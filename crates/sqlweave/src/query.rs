//! Query builder and execution.
//!
//! A [`Query`] pairs an entity with options, an optional table alias and
//! joins. Execution methods format the statement, check that every
//! placeholder has a value, run it on a [`Connection`] and zip the returned
//! rows with the statement's aliases.
//!
//! # Example
//!
//! ```ignore
//! use sqlweave::{query, Condition};
//!
//! let users = query(&user)
//!     .fields(["id", "name"])
//!     .and_where(Condition::is_in("id", vec![1, 2, 3]))
//!     .limit(10)
//!     .fetch(&conn)
//!     .await?;
//! ```

use crate::client::Connection;
use crate::entity::Entity;
use crate::error::{OrmError, OrmResult, QueryType};
use crate::expr::{Expr, Target};
use crate::format::{InsertSource, SqlFormatter};
use crate::options::{Column, OrderBy, QueryOptions};
use crate::row::{self, Record};
use crate::sql::Statement;
use futures_util::future::try_join_all;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// How a joined query is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

/// A query joined into another one.
///
/// Without explicit `on` pairs the join condition is derived from
/// `references` metadata between the two entities. The joined query's
/// `where` is ANDed into the ON clause and its `fields` are selected under
/// `{alias}.{field}`.
#[derive(Debug, Clone)]
pub struct Join {
    kind: JoinKind,
    query: Query,
    alias: Option<String>,
    on: Vec<(String, String)>,
}

impl Join {
    pub fn new(kind: JoinKind, query: Query) -> Self {
        Self {
            kind,
            query,
            alias: None,
            on: Vec::new(),
        }
    }

    pub fn left(query: Query) -> Self {
        Self::new(JoinKind::Left, query)
    }

    pub fn inner(query: Query) -> Self {
        Self::new(JoinKind::Inner, query)
    }

    /// Name the joined table; defaults to the joined query's alias, then its table.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Join where `local` (a field of the outer entity) equals `foreign`.
    pub fn on(mut self, local: impl Into<String>, foreign: impl Into<String>) -> Self {
        self.on.push((local.into(), foreign.into()));
        self
    }

    pub fn kind(&self) -> JoinKind {
        self.kind
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn on_pairs(&self) -> &[(String, String)] {
        &self.on
    }

    pub(crate) fn alias_name(&self) -> OrmResult<String> {
        if let Some(alias) = self.alias.as_deref().or(self.query.get_alias()) {
            return Ok(alias.to_string());
        }
        Ok(self.query.entity().require_table()?.as_str().to_string())
    }
}

/// A query on one entity.
#[derive(Debug, Clone)]
pub struct Query {
    entity: Arc<Entity>,
    alias: Option<String>,
    options: QueryOptions,
    defaults: Option<Arc<QueryOptions>>,
    joins: Vec<Join>,
}

/// Start a query on `entity`.
pub fn query(entity: &Arc<Entity>) -> Query {
    Query::new(entity)
}

impl Query {
    pub fn new(entity: &Arc<Entity>) -> Self {
        Self {
            entity: Arc::clone(entity),
            alias: None,
            options: QueryOptions::default(),
            defaults: None,
            joins: Vec::new(),
        }
    }

    // ── accessors ────────────────────────────────────────────────────────

    pub fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }

    pub fn get_alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Options set on this query, without defaults.
    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut QueryOptions {
        &mut self.options
    }

    pub fn defaults(&self) -> Option<&QueryOptions> {
        self.defaults.as_deref()
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Options set on this query over its defaults.
    pub fn effective_options(&self) -> QueryOptions {
        match &self.defaults {
            Some(defaults) => self.options.merge_defaults(defaults),
            None => self.options.clone(),
        }
    }

    // ── builder ──────────────────────────────────────────────────────────

    /// Qualify this query's columns with `alias` instead of the table name.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Options that apply wherever this query leaves one unset.
    pub fn with_defaults(mut self, defaults: Arc<QueryOptions>) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Replace this query's options.
    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Set an option by name; see [`QueryOptions::set_option`].
    pub fn set_option(mut self, name: &str, value: Option<Value>) -> OrmResult<Self> {
        self.options.set_option(name, value)?;
        Ok(self)
    }

    pub fn fields<I, C>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.options.fields(fields);
        self
    }

    pub fn and_where(mut self, expr: impl Into<Expr>) -> Self {
        self.options.and_where(expr);
        self
    }

    pub fn group_by<I, T>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Target>,
    {
        self.options.group_by(targets);
        self
    }

    pub fn and_having(mut self, expr: impl Into<Expr>) -> Self {
        self.options.and_having(expr);
        self
    }

    pub fn order_by(mut self, order: impl Into<OrderBy>) -> Self {
        self.options.order_by(order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.options.limit(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.options.offset(offset);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.options.distinct(true);
        self
    }

    pub fn for_update(mut self) -> Self {
        self.options.for_update(true);
        self
    }

    pub fn for_share(mut self) -> Self {
        self.options.for_share(true);
        self
    }

    pub fn of<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.of(tables);
        self
    }

    pub fn no_wait(mut self) -> Self {
        self.options.no_wait(true);
        self
    }

    pub fn skip_locked(mut self) -> Self {
        self.options.skip_locked(true);
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.options.batch_size(size);
        self
    }

    pub fn first(mut self) -> Self {
        self.options.first(true);
        self
    }

    pub fn require(mut self) -> Self {
        self.options.require(true);
        self
    }

    pub fn debug(mut self) -> Self {
        self.options.debug(true);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn left_join(self, query: Query) -> Self {
        self.join(Join::left(query))
    }

    pub fn inner_join(self, query: Query) -> Self {
        self.join(Join::inner(query))
    }

    // ── formatting ───────────────────────────────────────────────────────

    pub fn formatter(&self) -> OrmResult<SqlFormatter<'_>> {
        SqlFormatter::new(self)
    }

    /// The SELECT statement this query runs.
    pub fn to_statement(&self) -> OrmResult<Statement> {
        self.formatter()?.format_select()
    }

    // ── execution ────────────────────────────────────────────────────────

    /// Fetch all matching rows.
    pub async fn fetch<C: Connection>(&self, conn: &C) -> OrmResult<Vec<Record>> {
        let formatter = self.formatter()?;
        let statement = formatter.format_select()?;
        let rows = self
            .run(conn, QueryType::Fetch, statement, formatter.options())
            .await?;
        self.check_required(QueryType::Fetch, rows, formatter.options())
    }

    /// Fetch the first matching row.
    pub async fn fetch_one<C: Connection>(&self, conn: &C) -> OrmResult<Option<Record>> {
        let rows = self.clone().first().fetch(conn).await?;
        Ok(rows.into_iter().next())
    }

    /// Fetch all matching rows deserialized into `T`.
    pub async fn fetch_as<T: DeserializeOwned, C: Connection>(&self, conn: &C) -> OrmResult<Vec<T>> {
        self.fetch(conn).await?.into_iter().map(row::parse).collect()
    }

    /// Fetch the first matching row deserialized into `T`.
    pub async fn fetch_one_as<T: DeserializeOwned, C: Connection>(
        &self,
        conn: &C,
    ) -> OrmResult<Option<T>> {
        self.fetch_one(conn).await?.map(row::parse).transpose()
    }

    /// Count matching rows.
    pub async fn count<C: Connection>(&self, conn: &C) -> OrmResult<u64> {
        let formatter = self.formatter()?;
        let statement = formatter.format_count()?;
        let rows = self
            .run(conn, QueryType::Fetch, statement, formatter.options())
            .await?;
        let value = rows
            .into_iter()
            .next()
            .and_then(|mut row| row.remove("count"))
            .unwrap_or(Value::Null);
        match &value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .ok_or_else(|| OrmError::decode("count", format!("expected a count, got {value}")))
    }

    /// Insert rows, in batches of `batchSize` when set, and return the inserted rows.
    ///
    /// Batches run concurrently; the returned rows are not guaranteed to
    /// follow input order across batches.
    pub async fn insert<C: Connection>(&self, conn: &C, rows: &[Record]) -> OrmResult<Vec<Record>> {
        let formatter = self.formatter()?;
        let statements = formatter.format_inserts(rows)?;
        let rows = self
            .run_all(conn, QueryType::Insert, statements, formatter.options())
            .await?;
        self.check_required(QueryType::Insert, rows, formatter.options())
    }

    /// `INSERT INTO table SELECT …` or `INSERT INTO table <raw>`.
    pub async fn insert_from<C: Connection>(
        &self,
        conn: &C,
        source: impl Into<InsertSource>,
    ) -> OrmResult<Vec<Record>> {
        let formatter = self.formatter()?;
        let statement = formatter.format_insert_from(&source.into())?;
        let rows = self
            .run(conn, QueryType::Insert, statement, formatter.options())
            .await?;
        self.check_required(QueryType::Insert, rows, formatter.options())
    }

    /// Update matching rows with the record's non-key fields.
    pub async fn update<C: Connection>(&self, conn: &C, record: &Record) -> OrmResult<Vec<Record>> {
        let formatter = self.formatter()?;
        let statement = formatter.format_update(record)?;
        let rows = self
            .run(conn, QueryType::Update, statement, formatter.options())
            .await?;
        self.check_required(QueryType::Update, rows, formatter.options())
    }

    /// Update many records by primary key, in batches of `batchSize` when set.
    pub async fn update_many<C: Connection>(
        &self,
        conn: &C,
        records: &[Record],
    ) -> OrmResult<Vec<Record>> {
        let formatter = self.formatter()?;
        let statements = formatter.format_update_many(records)?;
        let rows = self
            .run_all(conn, QueryType::Update, statements, formatter.options())
            .await?;
        self.check_required(QueryType::Update, rows, formatter.options())
    }

    /// Delete matching rows and return them.
    pub async fn delete<C: Connection>(&self, conn: &C) -> OrmResult<Vec<Record>> {
        let formatter = self.formatter()?;
        let statement = formatter.format_delete()?;
        let rows = self
            .run(conn, QueryType::Delete, statement, formatter.options())
            .await?;
        self.check_required(QueryType::Delete, rows, formatter.options())
    }

    async fn run_all<C: Connection>(
        &self,
        conn: &C,
        kind: QueryType,
        statements: Vec<Statement>,
        options: &QueryOptions,
    ) -> OrmResult<Vec<Record>> {
        if statements.len() > 1 {
            tracing::trace!(
                target: "sqlweave.sql",
                entity = self.entity.name(),
                query_type = %kind,
                batches = statements.len(),
                "running batches concurrently"
            );
        }
        let results = try_join_all(
            statements
                .into_iter()
                .map(|statement| self.run(conn, kind, statement, options)),
        )
        .await?;
        Ok(results.into_iter().flatten().collect())
    }

    async fn run<C: Connection>(
        &self,
        conn: &C,
        kind: QueryType,
        statement: Statement,
        options: &QueryOptions,
    ) -> OrmResult<Vec<Record>> {
        let debug = options.is_debug();
        let entity = self.entity.name();
        let wrap = |error: OrmError| OrmError::Execute {
            kind,
            entity: entity.to_string(),
            statement: statement.to_failed(debug),
            source: Box::new(error),
        };

        statement.validate().map_err(wrap)?;

        if debug {
            tracing::debug!(
                target: "sqlweave.sql",
                entity,
                query_type = %kind,
                sql = %statement.sql,
                values = ?statement.values,
                "executing statement"
            );
        } else {
            tracing::debug!(
                target: "sqlweave.sql",
                entity,
                query_type = %kind,
                sql = %statement.sql,
                param_count = statement.values.len(),
                "executing statement"
            );
        }

        let rows = conn
            .query(&statement.sql, &statement.values)
            .await
            .map_err(wrap)?;
        rows.into_iter()
            .map(|row| row::unzip(row, &statement.aliases))
            .collect()
    }

    fn check_required(
        &self,
        kind: QueryType,
        rows: Vec<Record>,
        options: &QueryOptions,
    ) -> OrmResult<Vec<Record>> {
        if rows.is_empty() && options.is_require() {
            return Err(OrmError::NoRows {
                kind,
                entity: self.entity.name().to_string(),
            });
        }
        Ok(rows)
    }
}
