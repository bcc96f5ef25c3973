use super::{Expr, FormatContext, Grouping, Junction};
use crate::entity::FieldRef;
use crate::error::{OrmError, OrmResult};
use crate::raw::Raw;
use crate::sql::Sql;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Predicate operators, parsed from their camelCase tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    IsNull,
    IsNotNull,
    EqualTo,
    NotEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    Like,
    Between,
    In,
    Not,
    Exists,
    Any,
    Some,
    All,
    And,
    Or,
}

impl Operator {
    /// The tag this operator parses from.
    pub fn tag(&self) -> &'static str {
        match self {
            Operator::IsNull => "isNull",
            Operator::IsNotNull => "isNotNull",
            Operator::EqualTo => "equalTo",
            Operator::NotEqualTo => "notEqualTo",
            Operator::GreaterThan => "greaterThan",
            Operator::GreaterThanOrEqualTo => "greaterThanOrEqualTo",
            Operator::LessThan => "lessThan",
            Operator::LessThanOrEqualTo => "lessThanOrEqualTo",
            Operator::Like => "like",
            Operator::Between => "between",
            Operator::In => "in",
            Operator::Not => "not",
            Operator::Exists => "exists",
            Operator::Any => "any",
            Operator::Some => "some",
            Operator::All => "all",
            Operator::And => "and",
            Operator::Or => "or",
        }
    }

    /// Operators that test a whole row or sub-select and need no column.
    pub fn is_whole_row(&self) -> bool {
        matches!(
            self,
            Operator::Not
                | Operator::Exists
                | Operator::Any
                | Operator::Some
                | Operator::All
                | Operator::And
                | Operator::Or
        )
    }

    /// Unary column tests that take no value.
    pub fn is_unary(&self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }

    /// Whether a column may precede the operator.
    pub fn accepts_target(&self) -> bool {
        !matches!(
            self,
            Operator::Not | Operator::Exists | Operator::And | Operator::Or
        )
    }

    /// The SQL keyword or symbol.
    pub fn keyword(&self) -> &'static str {
        match self {
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
            Operator::EqualTo => "=",
            Operator::NotEqualTo => "<>",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqualTo => ">=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqualTo => "<=",
            Operator::Like => "LIKE",
            Operator::Between => "BETWEEN",
            Operator::In => "IN",
            Operator::Not => "NOT",
            Operator::Exists => "EXISTS",
            Operator::Any => "ANY",
            Operator::Some => "SOME",
            Operator::All => "ALL",
            Operator::And => "AND",
            Operator::Or => "OR",
        }
    }
}

impl FromStr for Operator {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "isNull" => Operator::IsNull,
            "isNotNull" => Operator::IsNotNull,
            "equalTo" => Operator::EqualTo,
            "notEqualTo" => Operator::NotEqualTo,
            "greaterThan" => Operator::GreaterThan,
            "greaterThanOrEqualTo" => Operator::GreaterThanOrEqualTo,
            "lessThan" => Operator::LessThan,
            "lessThanOrEqualTo" => Operator::LessThanOrEqualTo,
            "like" => Operator::Like,
            "between" => Operator::Between,
            "in" => Operator::In,
            "not" => Operator::Not,
            "exists" => Operator::Exists,
            "any" => Operator::Any,
            "some" => Operator::Some,
            "all" => Operator::All,
            "and" => Operator::And,
            "or" => Operator::Or,
            other => {
                return Err(OrmError::InvalidCondition(format!(
                    "unknown operator `{other}`"
                )));
            }
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// What a condition tests: a field by name, a field reference, or raw SQL.
#[derive(Debug, Clone)]
pub enum Target {
    Name(String),
    Field(FieldRef),
    Raw(Raw),
}

impl Target {
    pub(crate) fn format(&self, ctx: &FormatContext<'_>) -> OrmResult<Sql> {
        match self {
            Target::Name(name) => Ok(Sql::new(ctx.column(name)?)),
            Target::Field(field) => Ok(Sql::new(ctx.field_column(field)?)),
            Target::Raw(raw) => Ok(raw.format()),
        }
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::Name(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Target::Name(name)
    }
}

impl From<FieldRef> for Target {
    fn from(field: FieldRef) -> Self {
        Target::Field(field)
    }
}

impl From<Raw> for Target {
    fn from(raw: Raw) -> Self {
        Target::Raw(raw)
    }
}

/// A single predicate: `{operator, target?, value?}`.
#[derive(Debug, Clone)]
pub struct Condition {
    operator: Operator,
    target: Option<Target>,
    value: Option<Expr>,
}

impl Condition {
    /// Build a condition, checking that the operator fits the target and value.
    ///
    /// Only whole-row operators may omit the target and only `isNull` /
    /// `isNotNull` may omit the value.
    pub fn new(operator: Operator, target: Option<Target>, value: Option<Expr>) -> OrmResult<Self> {
        if target.is_none() && !operator.is_whole_row() {
            return Err(OrmError::InvalidCondition(format!(
                "`{operator}` requires a field"
            )));
        }
        if target.is_some() && !operator.accepts_target() {
            return Err(OrmError::InvalidCondition(format!(
                "`{operator}` does not take a field"
            )));
        }
        match (&value, operator.is_unary()) {
            (None, false) => Err(OrmError::InvalidCondition(format!(
                "`{operator}` requires a value"
            ))),
            (Some(_), true) => Err(OrmError::InvalidCondition(format!(
                "`{operator}` does not take a value"
            ))),
            _ => Ok(Self {
                operator,
                target,
                value,
            }),
        }
    }

    /// Build a condition from an operator tag such as `"equalTo"`.
    pub fn parse(tag: &str, target: Option<Target>, value: Option<Expr>) -> OrmResult<Self> {
        Self::new(tag.parse()?, target, value)
    }

    fn binary(operator: Operator, target: impl Into<Target>, value: impl Into<Expr>) -> Self {
        Self {
            operator,
            target: Some(target.into()),
            value: Some(value.into()),
        }
    }

    fn whole_row(operator: Operator, value: impl Into<Expr>) -> Self {
        Self {
            operator,
            target: None,
            value: Some(value.into()),
        }
    }

    pub fn is_null(target: impl Into<Target>) -> Self {
        Self {
            operator: Operator::IsNull,
            target: Some(target.into()),
            value: None,
        }
    }

    pub fn is_not_null(target: impl Into<Target>) -> Self {
        Self {
            operator: Operator::IsNotNull,
            target: Some(target.into()),
            value: None,
        }
    }

    pub fn equal_to(target: impl Into<Target>, value: impl Into<Expr>) -> Self {
        Self::binary(Operator::EqualTo, target, value)
    }

    pub fn not_equal_to(target: impl Into<Target>, value: impl Into<Expr>) -> Self {
        Self::binary(Operator::NotEqualTo, target, value)
    }

    pub fn greater_than(target: impl Into<Target>, value: impl Into<Expr>) -> Self {
        Self::binary(Operator::GreaterThan, target, value)
    }

    pub fn greater_than_or_equal_to(target: impl Into<Target>, value: impl Into<Expr>) -> Self {
        Self::binary(Operator::GreaterThanOrEqualTo, target, value)
    }

    pub fn less_than(target: impl Into<Target>, value: impl Into<Expr>) -> Self {
        Self::binary(Operator::LessThan, target, value)
    }

    pub fn less_than_or_equal_to(target: impl Into<Target>, value: impl Into<Expr>) -> Self {
        Self::binary(Operator::LessThanOrEqualTo, target, value)
    }

    pub fn like(target: impl Into<Target>, pattern: impl Into<Expr>) -> Self {
        Self::binary(Operator::Like, target, pattern)
    }

    /// `target BETWEEN a AND b`; only the first two operands are used.
    pub fn between(target: impl Into<Target>, bounds: impl Into<Expr>) -> Self {
        Self::binary(Operator::Between, target, bounds)
    }

    /// `target IN (...)`. An empty list binds a single `NULL`, which never matches.
    pub fn is_in(target: impl Into<Target>, values: impl Into<Expr>) -> Self {
        Self::binary(Operator::In, target, values)
    }

    pub fn not(value: impl Into<Expr>) -> Self {
        Self::whole_row(Operator::Not, value)
    }

    pub fn exists(value: impl Into<Expr>) -> Self {
        Self::whole_row(Operator::Exists, value)
    }

    pub fn any(value: impl Into<Expr>) -> Self {
        Self::whole_row(Operator::Any, value)
    }

    pub fn some(value: impl Into<Expr>) -> Self {
        Self::whole_row(Operator::Some, value)
    }

    pub fn all(value: impl Into<Expr>) -> Self {
        Self::whole_row(Operator::All, value)
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn value(&self) -> Option<&Expr> {
        self.value.as_ref()
    }

    /// Format the condition.
    pub fn format(&self, ctx: &FormatContext<'_>) -> OrmResult<Sql> {
        let mut sql = Sql::empty();
        if let Some(target) = &self.target {
            sql.push_sql(target.format(ctx)?);
        }

        let keyword = self.operator.keyword();
        match self.operator {
            Operator::IsNull | Operator::IsNotNull => {
                sql.push(" ").push(keyword);
            }
            Operator::In => {
                sql.push(" IN ");
                sql.push_sql(format_in(self.required_value()?, ctx)?);
            }
            Operator::Between => {
                sql.push(" BETWEEN ");
                sql.push_sql(format_between(self.required_value()?, ctx)?);
            }
            Operator::And | Operator::Or => {
                let junction = match self.operator {
                    Operator::And => Junction::And,
                    _ => Junction::Or,
                };
                let group = match self.required_value()? {
                    Expr::List(items) => Grouping::new(junction, items.clone()),
                    other => Grouping::new(junction, vec![other.clone()]),
                };
                sql.push_sql(group.format(ctx)?);
            }
            Operator::Not | Operator::Exists => {
                sql.push(keyword).push(" ");
                sql.push_sql(self.required_value()?.format(ctx)?);
            }
            Operator::Any | Operator::Some | Operator::All => {
                // `column = ANY (...)` when a column is given
                if !sql.is_empty() {
                    sql.push(" = ");
                }
                sql.push(keyword).push(" ");
                let value = self.required_value()?;
                match value {
                    Expr::SubQuery(_) | Expr::Raw(_) => sql.push_sql(value.format(ctx)?),
                    other => sql.push_sql(other.format(ctx)?.parenthesized()),
                };
            }
            _ => {
                sql.push(" ").push(keyword).push(" ");
                sql.push_sql(self.required_value()?.format(ctx)?);
            }
        }
        Ok(sql)
    }

    fn required_value(&self) -> OrmResult<&Expr> {
        self.value.as_ref().ok_or_else(|| {
            OrmError::InvalidCondition(format!("`{}` requires a value", self.operator))
        })
    }
}

fn format_in(value: &Expr, ctx: &FormatContext<'_>) -> OrmResult<Sql> {
    if let Some(items) = value.format_operands(ctx, None)? {
        let mut sql = Sql::empty();
        if items.is_empty() {
            sql.push_bind(Value::Null);
        } else {
            sql.push_joined(items, ", ");
        }
        return Ok(sql.parenthesized());
    }
    match value {
        Expr::SubQuery(_) | Expr::Raw(_) => value.format(ctx),
        other => Ok(other.format(ctx)?.parenthesized()),
    }
}

// Operands past the second are dropped; missing ones render as unbound
// placeholders.
fn format_between(value: &Expr, ctx: &FormatContext<'_>) -> OrmResult<Sql> {
    let Some(items) = value.format_operands(ctx, Some(2))? else {
        return value.format(ctx);
    };
    let mut items = items.into_iter();
    let mut sql = Sql::empty();
    match items.next() {
        Some(low) => sql.push_sql(low),
        None => sql.push_unbound(),
    };
    sql.push(" AND ");
    match items.next() {
        Some(high) => sql.push_sql(high),
        None => sql.push_unbound(),
    };
    Ok(sql)
}
