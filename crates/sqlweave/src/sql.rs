//! SQL fragments and compiled statements.
//!
//! [`Sql`] stores SQL text and bound values side by side. Every bound value
//! appends one `?` placeholder, so the values vector always follows the
//! left-to-right order of the placeholders in the text. Fragments are composed
//! with [`Sql::push_sql`], which concatenates both text and values.
//!
//! [`Statement`] is the compiled result of the formatter: `{sql, values, aliases}`.

use crate::error::{OrmError, OrmResult};
use serde_json::Value;
use std::fmt;

/// A parameter-safe SQL fragment: text with `?` placeholders plus their values.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use]
pub struct Sql {
    text: String,
    values: Vec<Value>,
}

/// Start building a SQL fragment.
pub fn sql(initial_sql: impl Into<String>) -> Sql {
    Sql::new(initial_sql)
}

impl Sql {
    /// Create a new fragment with initial SQL text (no values).
    pub fn new(initial_sql: impl Into<String>) -> Self {
        Self {
            text: initial_sql.into(),
            values: Vec::new(),
        }
    }

    /// Create an empty fragment.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a fragment from text that already carries its own values.
    pub fn with_values(text: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            text: text.into(),
            values,
        }
    }

    /// Append raw SQL (no parameters).
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.text.push_str(sql);
        self
    }

    /// Append a `?` placeholder and bind its value.
    pub fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.text.push('?');
        self.values.push(value.into());
        self
    }

    /// Append a `?` placeholder without binding anything.
    ///
    /// The resulting statement fails [`Statement::validate`] unless the caller
    /// supplies the value some other way.
    pub fn push_unbound(&mut self) -> &mut Self {
        self.text.push('?');
        self
    }

    /// Append another fragment, consuming it.
    pub fn push_sql(&mut self, other: Sql) -> &mut Self {
        self.text.push_str(&other.text);
        self.values.extend(other.values);
        self
    }

    /// Append fragments separated by `separator`, skipping empty ones.
    pub fn push_joined(&mut self, parts: Vec<Sql>, separator: &str) -> &mut Self {
        let mut first = true;
        for part in parts.into_iter().filter(|p| !p.is_empty()) {
            if !first {
                self.push(separator);
            }
            first = false;
            self.push_sql(part);
        }
        self
    }

    /// Wrap the fragment in parentheses.
    pub fn parenthesized(self) -> Self {
        let mut out = Sql::new("(");
        out.push_sql(self);
        out.push(")");
        out
    }

    /// Whether the fragment has no SQL text.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The SQL text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The bound values, in placeholder order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Split into text and values.
    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.text, self.values)
    }

    /// Finish the fragment as a statement with result-column aliases.
    pub fn into_statement(self, aliases: Vec<String>) -> Statement {
        Statement {
            sql: self.text,
            values: self.values,
            aliases,
        }
    }
}

/// A compiled statement: SQL with `?` placeholders, values, and result aliases.
///
/// `aliases` is positionally parallel to the selected/returned columns and is
/// used to unzip returned rows back into field-named objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub values: Vec<Value>,
    pub aliases: Vec<String>,
}

impl Statement {
    /// Number of `?` placeholders in the SQL text, ignoring quoted literals and identifiers.
    pub fn placeholder_count(&self) -> usize {
        count_placeholders(&self.sql)
    }

    /// Check that every placeholder has exactly one bound value.
    pub fn validate(&self) -> OrmResult<()> {
        let placeholder_count = self.placeholder_count();
        if placeholder_count != self.values.len() {
            return Err(OrmError::Validation(format!(
                "statement has {} placeholders but {} values",
                placeholder_count,
                self.values.len()
            )));
        }
        Ok(())
    }

    /// A copy suitable for error reports; values are kept only when `debug` is set.
    pub fn to_failed(&self, debug: bool) -> FailedStatement {
        FailedStatement {
            sql: self.sql.clone(),
            values: debug.then(|| self.values.clone()),
        }
    }
}

/// The statement attached to an execution error.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedStatement {
    pub sql: String,
    /// `None` when values were redacted.
    pub values: Option<Vec<Value>>,
}

impl fmt::Display for FailedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.values {
            Some(values) => write!(
                f,
                "sql: {}, values: {}",
                self.sql,
                Value::Array(values.clone())
            ),
            None => write!(f, "sql: {}, values: <redacted>", self.sql),
        }
    }
}

/// Byte offsets of `?` placeholders outside single-quoted literals and
/// double-quoted identifiers.
pub(crate) fn placeholder_offsets(sql: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut quote: Option<char> = None;
    for (i, ch) in sql.char_indices() {
        match quote {
            // A doubled quote closes and immediately reopens, which is the SQL escape.
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '?' => offsets.push(i),
                _ => {}
            },
        }
    }
    offsets
}

pub(crate) fn count_placeholders(sql: &str) -> usize {
    placeholder_offsets(sql).len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_placeholders_in_order() {
        let mut q = sql("SELECT * FROM users WHERE a = ");
        q.push_bind(1).push(" AND b = ").push_bind("x");

        assert_eq!(q.text(), "SELECT * FROM users WHERE a = ? AND b = ?");
        assert_eq!(q.values(), &[json!(1), json!("x")]);
    }

    #[test]
    fn can_compose_fragments() {
        let mut w = Sql::empty();
        w.push(" WHERE id = ").push_bind(42);

        let mut q = sql("SELECT * FROM users");
        q.push_sql(w);

        assert_eq!(q.text(), "SELECT * FROM users WHERE id = ?");
        assert_eq!(q.values().len(), 1);
    }

    #[test]
    fn joined_skips_empty_parts() {
        let mut q = Sql::empty();
        q.push_joined(
            vec![Sql::new("a"), Sql::empty(), Sql::new("b")],
            " AND ",
        );
        assert_eq!(q.text(), "a AND b");
    }

    #[test]
    fn placeholders_inside_quotes_are_ignored() {
        assert_eq!(count_placeholders("a = ? AND b = '?' AND \"c?\" = ?"), 2);
        assert_eq!(count_placeholders("x = 'it''s ?' OR y = ?"), 1);
    }

    #[test]
    fn validate_detects_unbound_placeholder() {
        let mut q = sql("INSERT INTO user (id, name) VALUES (");
        q.push_bind(1).push(", ").push_unbound().push(")");
        let stmt = q.into_statement(Vec::new());
        assert_eq!(stmt.placeholder_count(), 2);
        assert!(stmt.validate().is_err());
    }

    #[test]
    fn failed_statement_redacts_values_unless_debug() {
        let stmt = sql("SELECT 1 WHERE a = ").push_bind("secret").clone().into_statement(vec![]);
        assert_eq!(
            stmt.to_failed(false).to_string(),
            "sql: SELECT 1 WHERE a = ?, values: <redacted>"
        );
        assert_eq!(
            stmt.to_failed(true).to_string(),
            r#"sql: SELECT 1 WHERE a = ?, values: ["secret"]"#
        );
    }
}
