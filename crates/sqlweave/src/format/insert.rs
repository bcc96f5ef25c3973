use super::{SqlFormatter, assemble};
use crate::entity::FieldDef;
use crate::error::{OrmError, OrmResult};
use crate::query::Query;
use crate::raw::Raw;
use crate::row::Record;
use crate::sql::{Sql, Statement};

/// A whole-statement source for `INSERT INTO table <source>`.
#[derive(Debug, Clone)]
pub enum InsertSource {
    /// `INSERT INTO table SELECT …`
    SubQuery(Box<Query>),
    /// `INSERT INTO table <raw>`
    Raw(Raw),
}

impl From<Query> for InsertSource {
    fn from(query: Query) -> Self {
        InsertSource::SubQuery(Box::new(query))
    }
}

impl From<Raw> for InsertSource {
    fn from(raw: Raw) -> Self {
        InsertSource::Raw(raw)
    }
}

impl SqlFormatter<'_> {
    /// One INSERT per batch of `rows`.
    pub fn format_inserts(&self, rows: &[Record]) -> OrmResult<Vec<Statement>> {
        self.batches(rows)?
            .into_iter()
            .map(|batch| self.format_insert(batch))
            .collect()
    }

    /// `INSERT INTO table [AS alias] (cols) VALUES (…), (…) RETURNING …`.
    ///
    /// The column list comes from the first row's keys that name entity
    /// fields. Every row must carry the same keys; a missing key renders an
    /// unbound placeholder.
    pub fn format_insert(&self, rows: &[Record]) -> OrmResult<Statement> {
        let entity = self.entity();
        let first = rows.first().ok_or_else(|| {
            OrmError::Validation(format!("{}: no rows to insert", entity.name()))
        })?;
        let columns: Vec<&FieldDef> = first
            .keys()
            .filter_map(|key| entity.get_field(key))
            .collect();
        if columns.is_empty() {
            return Err(OrmError::Validation(format!(
                "{}: no known fields to insert",
                entity.name()
            )));
        }

        let mut head = Sql::new("INSERT INTO ");
        head.push(&self.format_table_alias()?);
        let names: Vec<String> = columns.iter().map(|f| f.column.to_sql()).collect();
        head.push(" (").push(&names.join(", ")).push(")");

        let mut values = Sql::new("VALUES ");
        let tuples = rows
            .iter()
            .map(|row| {
                let mut tuple = Sql::new("(");
                for (i, field) in columns.iter().enumerate() {
                    if i > 0 {
                        tuple.push(", ");
                    }
                    match row.get(&field.name) {
                        Some(value) => tuple.push_bind(value.clone()),
                        None => tuple.push_unbound(),
                    };
                }
                tuple.push(")");
                tuple
            })
            .collect();
        values.push_joined(tuples, ", ");

        let (returning, aliases) = self.format_returning()?;
        Ok(assemble(vec![head, values, returning]).into_statement(aliases))
    }

    /// `INSERT INTO table [AS alias] <source> RETURNING …`.
    pub fn format_insert_from(&self, source: &InsertSource) -> OrmResult<Statement> {
        let mut head = Sql::new("INSERT INTO ");
        head.push(&self.format_table_alias()?);
        let body = match source {
            InsertSource::SubQuery(query) => SqlFormatter::new(query)?.format_select()?,
            InsertSource::Raw(raw) => raw.format().into_statement(Vec::new()),
        };
        let (returning, aliases) = self.format_returning()?;
        Ok(assemble(vec![
            head,
            Sql::with_values(body.sql, body.values),
            returning,
        ])
        .into_statement(aliases))
    }
}
