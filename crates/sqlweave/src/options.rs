//! Query options: the formatter's only input besides the entity.
//!
//! Options are set through typed setters or dynamically by name with JSON
//! values ([`QueryOptions::set_option`]). List options (`fields`, `where`,
//! `groupBy`, `having`, `orderBy`, `of`) accumulate across calls; scalar
//! options overwrite. A JSON `null` clears an option and a missing value
//! (`None`) leaves it untouched.

use crate::error::{OrmError, OrmResult};
use crate::expr::{Expr, Grouping, Target};
use crate::query::Query;
use crate::raw::Raw;
use serde_json::{Map, Value};

/// Every option name accepted by [`QueryOptions::set_option`].
pub const OPTION_NAMES: &[&str] = &[
    "fields",
    "where",
    "groupBy",
    "having",
    "orderBy",
    "limit",
    "offset",
    "distinct",
    "forUpdate",
    "forShare",
    "of",
    "noWait",
    "skipLocked",
    "batchSize",
    "first",
    "require",
    "debug",
];

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }

    fn from_value(option: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Number(n) if n.as_i64() == Some(1) => Ok(Direction::Asc),
            Value::Number(n) if n.as_i64() == Some(-1) => Ok(Direction::Desc),
            Value::String(s) if s.eq_ignore_ascii_case("asc") => Ok(Direction::Asc),
            Value::String(s) if s.eq_ignore_ascii_case("desc") => Ok(Direction::Desc),
            other => Err(OrmError::invalid_option(
                option,
                format!("invalid direction {other}"),
            )),
        }
    }
}

/// One ORDER BY term.
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub target: Target,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(target: impl Into<Target>) -> Self {
        Self {
            target: target.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(target: impl Into<Target>) -> Self {
        Self {
            target: target.into(),
            direction: Direction::Desc,
        }
    }
}

impl From<&str> for OrderBy {
    fn from(field: &str) -> Self {
        OrderBy::asc(field)
    }
}

/// What a selected column reads from.
#[derive(Debug, Clone)]
pub enum ColumnSource {
    Field(String),
    Raw(Raw),
    SubQuery(Box<Query>),
}

impl From<&str> for ColumnSource {
    fn from(field: &str) -> Self {
        ColumnSource::Field(field.to_string())
    }
}

impl From<String> for ColumnSource {
    fn from(field: String) -> Self {
        ColumnSource::Field(field)
    }
}

impl From<Raw> for ColumnSource {
    fn from(raw: Raw) -> Self {
        ColumnSource::Raw(raw)
    }
}

impl From<Query> for ColumnSource {
    fn from(query: Query) -> Self {
        ColumnSource::SubQuery(Box::new(query))
    }
}

/// A selected or returned column and the alias its value is keyed by.
#[derive(Debug, Clone)]
pub struct Column {
    pub alias: String,
    pub source: ColumnSource,
}

impl Column {
    /// A field, keyed by its own name.
    pub fn field(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            source: ColumnSource::Field(name),
        }
    }

    /// Any source keyed by `alias`.
    pub fn aliased(alias: impl Into<String>, source: impl Into<ColumnSource>) -> Self {
        Self {
            alias: alias.into(),
            source: source.into(),
        }
    }
}

impl From<&str> for Column {
    fn from(name: &str) -> Self {
        Column::field(name)
    }
}

impl From<String> for Column {
    fn from(name: String) -> Self {
        Column::field(name)
    }
}

/// Query configuration. Unset options are `None`.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    fields: Option<Vec<Column>>,
    r#where: Option<Vec<Expr>>,
    group_by: Option<Vec<Target>>,
    having: Option<Vec<Expr>>,
    order_by: Option<Vec<OrderBy>>,
    limit: Option<u64>,
    offset: Option<u64>,
    distinct: Option<bool>,
    for_update: Option<bool>,
    for_share: Option<bool>,
    of: Option<Vec<String>>,
    no_wait: Option<bool>,
    skip_locked: Option<bool>,
    batch_size: Option<usize>,
    first: Option<bool>,
    require: Option<bool>,
    debug: Option<bool>,
}

fn append<T>(slot: &mut Option<Vec<T>>, items: impl IntoIterator<Item = T>) {
    slot.get_or_insert_with(Vec::new).extend(items);
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    // ── typed setters ────────────────────────────────────────────────────

    /// Add columns to select or return.
    pub fn fields<I, C>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        append(&mut self.fields, fields.into_iter().map(Into::into));
        self
    }

    /// AND an expression into the WHERE clause.
    pub fn and_where(&mut self, expr: impl Into<Expr>) -> &mut Self {
        append(&mut self.r#where, [expr.into()]);
        self
    }

    pub fn group_by<I, T>(&mut self, targets: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Target>,
    {
        append(&mut self.group_by, targets.into_iter().map(Into::into));
        self
    }

    /// AND an expression into the HAVING clause.
    pub fn and_having(&mut self, expr: impl Into<Expr>) -> &mut Self {
        append(&mut self.having, [expr.into()]);
        self
    }

    pub fn order_by(&mut self, order: impl Into<OrderBy>) -> &mut Self {
        append(&mut self.order_by, [order.into()]);
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = Some(distinct);
        self
    }

    pub fn for_update(&mut self, for_update: bool) -> &mut Self {
        self.for_update = Some(for_update);
        self
    }

    pub fn for_share(&mut self, for_share: bool) -> &mut Self {
        self.for_share = Some(for_share);
        self
    }

    /// Restrict row locks to these tables or aliases.
    pub fn of<I, S>(&mut self, tables: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        append(&mut self.of, tables.into_iter().map(Into::into));
        self
    }

    pub fn no_wait(&mut self, no_wait: bool) -> &mut Self {
        self.no_wait = Some(no_wait);
        self
    }

    pub fn skip_locked(&mut self, skip_locked: bool) -> &mut Self {
        self.skip_locked = Some(skip_locked);
        self
    }

    /// Split inserts and batch updates into statements of at most `size` rows.
    pub fn batch_size(&mut self, size: usize) -> &mut Self {
        self.batch_size = Some(size);
        self
    }

    pub fn first(&mut self, first: bool) -> &mut Self {
        self.first = Some(first);
        self
    }

    /// Fail with a no-rows error when nothing is returned.
    pub fn require(&mut self, require: bool) -> &mut Self {
        self.require = Some(require);
        self
    }

    /// Keep bound values in error reports and logs.
    pub fn debug(&mut self, debug: bool) -> &mut Self {
        self.debug = Some(debug);
        self
    }

    // ── dynamic setters ──────────────────────────────────────────────────

    /// Set an option by name from a JSON value.
    ///
    /// `None` is a no-op, `Some(Value::Null)` clears the option. Names are
    /// camelCase (`batchSize`); the snake_case spelling of a multi-word
    /// option (`batch_size`) is accepted too. Any other spelling is unknown.
    pub fn set_option(&mut self, name: &str, value: Option<Value>) -> OrmResult<&mut Self> {
        let key = canonical_name(name).ok_or_else(|| OrmError::UnknownOption(name.to_string()))?;
        match value {
            None => Ok(self),
            Some(Value::Null) => {
                self.unset(key)?;
                Ok(self)
            }
            Some(value) => {
                self.apply(key, value)?;
                Ok(self)
            }
        }
    }

    /// Set every option of a JSON object, in key order.
    pub fn set_options(&mut self, options: Map<String, Value>) -> OrmResult<&mut Self> {
        for (name, value) in options {
            self.set_option(&name, Some(value))?;
        }
        Ok(self)
    }

    /// Clear an option.
    pub fn unset(&mut self, name: &str) -> OrmResult<&mut Self> {
        match canonical_name(name).unwrap_or_default() {
            "fields" => self.fields = None,
            "where" => self.r#where = None,
            "groupBy" => self.group_by = None,
            "having" => self.having = None,
            "orderBy" => self.order_by = None,
            "limit" => self.limit = None,
            "offset" => self.offset = None,
            "distinct" => self.distinct = None,
            "forUpdate" => self.for_update = None,
            "forShare" => self.for_share = None,
            "of" => self.of = None,
            "noWait" => self.no_wait = None,
            "skipLocked" => self.skip_locked = None,
            "batchSize" => self.batch_size = None,
            "first" => self.first = None,
            "require" => self.require = None,
            "debug" => self.debug = None,
            _ => return Err(OrmError::UnknownOption(name.to_string())),
        }
        Ok(self)
    }

    fn apply(&mut self, name: &str, value: Value) -> OrmResult<()> {
        match name {
            "fields" => {
                let fields = columns_from_value(name, value)?;
                self.fields(fields);
            }
            "where" => {
                for expr in exprs_from_value(name, value)? {
                    self.and_where(expr);
                }
            }
            "having" => {
                for expr in exprs_from_value(name, value)? {
                    self.and_having(expr);
                }
            }
            "groupBy" => {
                let targets = strings_from_value(name, value)?;
                self.group_by(targets);
            }
            "orderBy" => {
                for order in order_from_value(name, value)? {
                    self.order_by(order);
                }
            }
            "of" => {
                let tables = strings_from_value(name, value)?;
                self.of(tables);
            }
            "limit" => {
                self.limit(integer_from_value(name, &value)?);
            }
            "offset" => {
                self.offset(integer_from_value(name, &value)?);
            }
            "batchSize" => {
                let size = integer_from_value(name, &value)?;
                if size == 0 {
                    return Err(OrmError::invalid_option(name, "must be a positive integer"));
                }
                let size = usize::try_from(size)
                    .map_err(|_| OrmError::invalid_option(name, "too large"))?;
                self.batch_size(size);
            }
            "distinct" => {
                self.distinct(bool_from_value(name, &value)?);
            }
            "forUpdate" => {
                self.for_update(bool_from_value(name, &value)?);
            }
            "forShare" => {
                self.for_share(bool_from_value(name, &value)?);
            }
            "noWait" => {
                self.no_wait(bool_from_value(name, &value)?);
            }
            "skipLocked" => {
                self.skip_locked(bool_from_value(name, &value)?);
            }
            "first" => {
                self.first(bool_from_value(name, &value)?);
            }
            "require" => {
                self.require(bool_from_value(name, &value)?);
            }
            "debug" => {
                self.debug(bool_from_value(name, &value)?);
            }
            _ => return Err(OrmError::UnknownOption(name.to_string())),
        }
        Ok(())
    }

    // ── merging and access ───────────────────────────────────────────────

    /// These options over `defaults`: every option set here wins, unset
    /// ones fall back to the default.
    pub fn merge_defaults(&self, defaults: &QueryOptions) -> QueryOptions {
        fn pick<T: Clone>(own: &Option<T>, fallback: &Option<T>) -> Option<T> {
            own.as_ref().or(fallback.as_ref()).cloned()
        }
        QueryOptions {
            fields: pick(&self.fields, &defaults.fields),
            r#where: pick(&self.r#where, &defaults.r#where),
            group_by: pick(&self.group_by, &defaults.group_by),
            having: pick(&self.having, &defaults.having),
            order_by: pick(&self.order_by, &defaults.order_by),
            limit: pick(&self.limit, &defaults.limit),
            offset: pick(&self.offset, &defaults.offset),
            distinct: pick(&self.distinct, &defaults.distinct),
            for_update: pick(&self.for_update, &defaults.for_update),
            for_share: pick(&self.for_share, &defaults.for_share),
            of: pick(&self.of, &defaults.of),
            no_wait: pick(&self.no_wait, &defaults.no_wait),
            skip_locked: pick(&self.skip_locked, &defaults.skip_locked),
            batch_size: pick(&self.batch_size, &defaults.batch_size),
            first: pick(&self.first, &defaults.first),
            require: pick(&self.require, &defaults.require),
            debug: pick(&self.debug, &defaults.debug),
        }
    }

    /// Names of the options that are set.
    pub fn set_names(&self) -> Vec<&'static str> {
        let set = [
            self.fields.is_some(),
            self.r#where.is_some(),
            self.group_by.is_some(),
            self.having.is_some(),
            self.order_by.is_some(),
            self.limit.is_some(),
            self.offset.is_some(),
            self.distinct.is_some(),
            self.for_update.is_some(),
            self.for_share.is_some(),
            self.of.is_some(),
            self.no_wait.is_some(),
            self.skip_locked.is_some(),
            self.batch_size.is_some(),
            self.first.is_some(),
            self.require.is_some(),
            self.debug.is_some(),
        ];
        OPTION_NAMES
            .iter()
            .zip(set)
            .filter_map(|(name, set)| set.then_some(*name))
            .collect()
    }

    pub fn get_fields(&self) -> Option<&[Column]> {
        self.fields.as_deref()
    }

    pub fn get_where(&self) -> &[Expr] {
        self.r#where.as_deref().unwrap_or_default()
    }

    pub fn get_group_by(&self) -> &[Target] {
        self.group_by.as_deref().unwrap_or_default()
    }

    pub fn get_having(&self) -> &[Expr] {
        self.having.as_deref().unwrap_or_default()
    }

    pub fn get_order_by(&self) -> &[OrderBy] {
        self.order_by.as_deref().unwrap_or_default()
    }

    pub fn get_limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn get_offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn get_of(&self) -> &[String] {
        self.of.as_deref().unwrap_or_default()
    }

    pub fn get_batch_size(&self) -> Option<usize> {
        self.batch_size
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct.unwrap_or(false)
    }

    pub fn is_for_update(&self) -> bool {
        self.for_update.unwrap_or(false)
    }

    pub fn is_for_share(&self) -> bool {
        self.for_share.unwrap_or(false)
    }

    pub fn is_no_wait(&self) -> bool {
        self.no_wait.unwrap_or(false)
    }

    pub fn is_skip_locked(&self) -> bool {
        self.skip_locked.unwrap_or(false)
    }

    pub fn is_first(&self) -> bool {
        self.first.unwrap_or(false)
    }

    pub fn is_require(&self) -> bool {
        self.require.unwrap_or(false)
    }

    pub fn is_debug(&self) -> bool {
        self.debug.unwrap_or(false)
    }
}

fn columns_from_value(option: &str, value: Value) -> OrmResult<Vec<Column>> {
    match value {
        Value::String(name) => Ok(vec![Column::field(name)]),
        Value::Object(map) => map
            .into_iter()
            .map(|(alias, source)| match source {
                Value::String(field) => Ok(Column::aliased(alias, field)),
                other => Err(OrmError::invalid_option(
                    option,
                    format!("alias `{alias}` must name a field, got {other}"),
                )),
            })
            .collect(),
        Value::Array(items) => {
            let mut columns = Vec::new();
            for item in items {
                match item {
                    Value::Array(_) => {
                        return Err(OrmError::invalid_option(option, "nested arrays"));
                    }
                    item => columns.extend(columns_from_value(option, item)?),
                }
            }
            Ok(columns)
        }
        other => Err(OrmError::invalid_option(
            option,
            format!("expected field names, got {other}"),
        )),
    }
}

fn exprs_from_value(option: &str, value: Value) -> OrmResult<Vec<Expr>> {
    match value {
        Value::Object(record) => Ok(vec![Grouping::from_record(&record).into()]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(record) => Ok(Grouping::from_record(&record).into()),
                other => Err(OrmError::invalid_option(
                    option,
                    format!("expected an object of field values, got {other}"),
                )),
            })
            .collect(),
        other => Err(OrmError::invalid_option(
            option,
            format!("expected an object of field values, got {other}"),
        )),
    }
}

fn strings_from_value(option: &str, value: Value) -> OrmResult<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(OrmError::invalid_option(
                    option,
                    format!("expected a string, got {other}"),
                )),
            })
            .collect(),
        other => Err(OrmError::invalid_option(
            option,
            format!("expected a string or list of strings, got {other}"),
        )),
    }
}

fn order_from_value(option: &str, value: Value) -> OrmResult<Vec<OrderBy>> {
    match value {
        Value::String(field) => Ok(vec![OrderBy::asc(field)]),
        Value::Object(map) => map
            .into_iter()
            .map(|(field, direction)| {
                Ok(OrderBy {
                    target: Target::Name(field),
                    direction: Direction::from_value(option, &direction)?,
                })
            })
            .collect(),
        Value::Array(items) => {
            let mut orders = Vec::new();
            for item in items {
                orders.extend(order_from_value(option, item)?);
            }
            Ok(orders)
        }
        other => Err(OrmError::invalid_option(
            option,
            format!("expected field names, got {other}"),
        )),
    }
}

// Accepts non-negative integers, floats (truncated) and numeric strings.
fn integer_from_value(option: &str, value: &Value) -> OrmResult<u64> {
    let invalid = || OrmError::invalid_option(option, format!("expected an integer, got {value}"));
    match value {
        Value::Number(n) => {
            if let Some(n) = n.as_u64() {
                return Ok(n);
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f >= 0.0 => Ok(f.trunc() as u64),
                _ => Err(invalid()),
            }
        }
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn bool_from_value(option: &str, value: &Value) -> OrmResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| OrmError::invalid_option(option, format!("expected a boolean, got {value}")))
}

/// The camelCase option name for `name`, or `None` when it names no option.
fn canonical_name(name: &str) -> Option<&'static str> {
    let name = match name {
        "group_by" => "groupBy",
        "order_by" => "orderBy",
        "for_update" => "forUpdate",
        "for_share" => "forShare",
        "no_wait" => "noWait",
        "skip_locked" => "skipLocked",
        "batch_size" => "batchSize",
        other => other,
    };
    OPTION_NAMES.iter().copied().find(|known| *known == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_option_fails_fast() {
        let mut options = QueryOptions::new();
        let err = options.set_option("colour", Some(json!(1))).unwrap_err();
        assert_eq!(err.to_string(), "unknown query option `colour`");
    }

    #[test]
    fn only_exact_spellings_name_options() {
        let mut options = QueryOptions::new();
        for name in ["LIMIT", "Batch-Size", "Where", "batchsize", "group-by"] {
            let err = options.set_option(name, Some(json!(3))).unwrap_err();
            assert!(matches!(err, OrmError::UnknownOption(ref n) if n == name));
        }
        assert!(options.unset("Limit").is_err());

        options.set_option("batch_size", Some(json!(3))).unwrap();
        options.set_option("skipLocked", Some(json!(true))).unwrap();
        assert_eq!(options.get_batch_size(), Some(3));
        assert!(options.is_skip_locked());

        options.unset("batch_size").unwrap();
        assert_eq!(options.get_batch_size(), None);
    }

    #[test]
    fn none_is_a_no_op_and_null_clears() {
        let mut options = QueryOptions::new();
        options.set_option("limit", Some(json!(10))).unwrap();
        options.set_option("limit", None).unwrap();
        assert_eq!(options.get_limit(), Some(10));

        options.set_option("limit", Some(Value::Null)).unwrap();
        assert_eq!(options.get_limit(), None);
    }

    #[test]
    fn lists_accumulate_and_scalars_overwrite() {
        let mut options = QueryOptions::new();
        options.set_option("fields", Some(json!("id"))).unwrap();
        options.set_option("fields", Some(json!(["name"]))).unwrap();
        options.set_option("limit", Some(json!(5))).unwrap();
        options.set_option("limit", Some(json!(7))).unwrap();

        let aliases: Vec<_> = options
            .get_fields()
            .unwrap()
            .iter()
            .map(|c| c.alias.as_str())
            .collect();
        assert_eq!(aliases, ["id", "name"]);
        assert_eq!(options.get_limit(), Some(7));
    }

    #[test]
    fn field_aliases_from_object() {
        let mut options = QueryOptions::new();
        options
            .set_option("fields", Some(json!({"userId": "id"})))
            .unwrap();
        let column = &options.get_fields().unwrap()[0];
        assert_eq!(column.alias, "userId");
        assert!(matches!(&column.source, ColumnSource::Field(f) if f == "id"));
    }

    #[test]
    fn integers_are_coerced() {
        let mut options = QueryOptions::new();
        options.set_option("offset", Some(json!(2.9))).unwrap();
        assert_eq!(options.get_offset(), Some(2));
        options.set_option("limit", Some(json!("15"))).unwrap();
        assert_eq!(options.get_limit(), Some(15));
        assert!(options.set_option("limit", Some(json!(-1))).is_err());
    }

    #[test]
    fn batch_size_must_be_positive() {
        let mut options = QueryOptions::new();
        assert!(matches!(
            options.set_option("batchSize", Some(json!(0))),
            Err(OrmError::InvalidOption { .. })
        ));
        options.set_option("batch_size", Some(json!(100))).unwrap();
        assert_eq!(options.get_batch_size(), Some(100));
    }

    #[test]
    fn order_by_directions() {
        let mut options = QueryOptions::new();
        options
            .set_option("orderBy", Some(json!(["id", {"name": -1, "age": "asc"}])))
            .unwrap();
        let directions: Vec<_> = options.get_order_by().iter().map(|o| o.direction).collect();
        assert_eq!(directions, [Direction::Asc, Direction::Desc, Direction::Asc]);
        assert!(options.set_option("orderBy", Some(json!({"id": 2}))).is_err());
    }

    #[test]
    fn per_call_options_win_over_defaults() {
        let mut defaults = QueryOptions::new();
        defaults.limit(100).debug(true).fields(["id"]);
        let mut options = QueryOptions::new();
        options.limit(10);

        let merged = options.merge_defaults(&defaults);
        assert_eq!(merged.get_limit(), Some(10));
        assert!(merged.is_debug());
        assert_eq!(merged.get_fields().map(<[Column]>::len), Some(1));
        assert_eq!(merged.set_names(), ["fields", "limit", "debug"]);
    }

    #[test]
    fn set_options_applies_every_key() {
        let mut options = QueryOptions::new();
        let map = json!({"forUpdate": true, "of": "user", "where": {"id": 1}});
        let Value::Object(map) = map else { unreachable!() };
        options.set_options(map).unwrap();
        assert!(options.is_for_update());
        assert_eq!(options.get_of(), ["user"]);
        assert_eq!(options.get_where().len(), 1);
    }
}
