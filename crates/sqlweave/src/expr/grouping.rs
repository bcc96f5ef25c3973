use super::{Condition, Expr, FormatContext, Target};
use crate::error::OrmResult;
use crate::sql::Sql;
use serde_json::{Map, Value};

/// The boolean combinator of a [`Grouping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Junction {
    And,
    Or,
}

impl Junction {
    fn separator(&self) -> &'static str {
        match self {
            Junction::And => " AND ",
            Junction::Or => " OR ",
        }
    }
}

/// An AND/OR combination of nodes.
///
/// A single item formats as the item itself; two or more are joined and
/// wrapped in one pair of parentheses. Items that format to nothing (empty
/// groupings) are skipped.
#[derive(Debug, Clone)]
pub struct Grouping {
    junction: Junction,
    items: Vec<Expr>,
}

impl Grouping {
    pub fn new(junction: Junction, items: Vec<Expr>) -> Self {
        Self { junction, items }
    }

    pub fn and<I, E>(items: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Self::new(Junction::And, items.into_iter().map(Into::into).collect())
    }

    pub fn or<I, E>(items: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Self::new(Junction::Or, items.into_iter().map(Into::into).collect())
    }

    /// AND of `field = value` for each pair, in order.
    pub fn equals_all<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Expr>,
    {
        Self::and(
            pairs
                .into_iter()
                .map(|(field, value)| Condition::equal_to(Target::Name(field.into()), value)),
        )
    }

    /// [`Grouping::equals_all`] over a JSON object, in key order.
    pub fn from_record(record: &Map<String, Value>) -> Self {
        Self::equals_all(record.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    /// Append an item.
    pub fn push(&mut self, item: impl Into<Expr>) {
        self.items.push(item.into());
    }

    pub fn junction(&self) -> Junction {
        self.junction
    }

    pub fn items(&self) -> &[Expr] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether formatting produces no SQL.
    pub fn is_empty(&self) -> bool {
        self.items.iter().all(Expr::is_empty)
    }

    /// Format the grouping.
    pub fn format(&self, ctx: &FormatContext<'_>) -> OrmResult<Sql> {
        format_items(self.junction, &self.items, ctx)
    }
}

/// Format `items` joined by `junction` without building a [`Grouping`].
pub(crate) fn format_items(
    junction: Junction,
    items: &[Expr],
    ctx: &FormatContext<'_>,
) -> OrmResult<Sql> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        let part = item.format(ctx)?;
        if !part.is_empty() {
            parts.push(part);
        }
    }

    match parts.len() {
        0 => Ok(Sql::empty()),
        1 => Ok(parts.remove(0)),
        _ => {
            let mut sql = Sql::empty();
            sql.push_joined(parts, junction.separator());
            Ok(sql.parenthesized())
        }
    }
}
