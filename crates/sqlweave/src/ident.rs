//! SQL identifier handling for table, schema, column and alias names.
//!
//! Names matching `[A-Za-z_][A-Za-z0-9_$]*` are emitted as-is; anything else is
//! emitted quoted with `"` escaped as `""`. Empty names and names containing NUL
//! are rejected when an entity is built, so formatting never fails on identifiers.

use crate::error::{OrmError, OrmResult};
use std::fmt;

/// A single validated SQL identifier (no dotted paths).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident(String);

impl Ident {
    /// Validate a name and wrap it.
    pub fn new(name: impl Into<String>) -> OrmResult<Self> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    /// The unquoted name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the name can be emitted without quotes.
    pub fn is_plain(&self) -> bool {
        is_plain(&self.0)
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let mut out = String::with_capacity(self.0.len() + 2);
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        if self.is_plain() {
            out.push_str(&self.0);
            return;
        }
        out.push('"');
        for ch in self.0.chars() {
            if ch == '"' {
                out.push('"');
            }
            out.push(ch);
        }
        out.push('"');
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

fn validate(name: &str) -> OrmResult<()> {
    if name.is_empty() {
        return Err(OrmError::validation("Identifier cannot be empty"));
    }
    if name.contains('\0') {
        return Err(OrmError::validation(
            "Identifier cannot contain NUL character",
        ));
    }
    Ok(())
}

fn is_plain(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first == '_' || first.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c == '$' || c.is_ascii_alphanumeric())
}

/// Render `qualifier.name`.
pub(crate) fn qualified(qualifier: &Ident, name: &Ident) -> String {
    let mut out = String::new();
    qualifier.write_sql(&mut out);
    out.push('.');
    name.write_sql(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ident_simple() {
        let ident = Ident::new("users").unwrap();
        assert_eq!(ident.to_sql(), "users");
    }

    #[test]
    fn ident_with_dollar() {
        let ident = Ident::new("my_var$1").unwrap();
        assert_eq!(ident.to_sql(), "my_var$1");
    }

    #[test]
    fn ident_quotes_when_needed() {
        assert_eq!(Ident::new("my table").unwrap().to_sql(), r#""my table""#);
        assert_eq!(Ident::new("1table").unwrap().to_sql(), r#""1table""#);
        assert_eq!(Ident::new(r#"has"quote"#).unwrap().to_sql(), r#""has""quote""#);
    }

    #[test]
    fn ident_rejects_empty_and_nul() {
        assert!(Ident::new("").is_err());
        assert!(Ident::new("a\0b").is_err());
    }

    #[test]
    fn qualified_joins_with_dot() {
        let t = Ident::new("user").unwrap();
        let c = Ident::new("first name").unwrap();
        assert_eq!(qualified(&t, &c), r#"user."first name""#);
    }
}
