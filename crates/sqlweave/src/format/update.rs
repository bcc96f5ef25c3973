use super::{SqlFormatter, assemble};
use crate::entity::FieldDef;
use crate::error::{OrmError, OrmResult};
use crate::expr::{self, Condition, Expr, Grouping, Junction};
use crate::ident;
use crate::row::Record;
use crate::sql::{Sql, Statement};

/// Alias of the VALUES list in batch updates.
const VALUES_ALIAS: &str = "v";

impl SqlFormatter<'_> {
    /// `UPDATE table [AS alias] SET col = ?, … [WHERE …] RETURNING …`.
    ///
    /// Primary-key fields are never SET. Without a `where` option the
    /// statement is restricted to the record's primary key when the record
    /// carries all of it.
    pub fn format_update(&self, record: &Record) -> OrmResult<Statement> {
        let entity = self.entity();
        let assignments: Vec<(&FieldDef, &serde_json::Value)> = record
            .iter()
            .filter_map(|(key, value)| entity.get_field(key).map(|f| (f, value)))
            .filter(|(field, _)| !field.primary)
            .collect();
        if assignments.is_empty() {
            return Err(OrmError::Validation(format!(
                "{}: no fields to update",
                entity.name()
            )));
        }

        let mut set = Sql::new("UPDATE ");
        set.push(&self.format_table_alias()?).push(" SET ");
        let parts = assignments
            .into_iter()
            .map(|(field, value)| {
                let mut part = Sql::new(field.column.to_sql());
                part.push(" = ").push_bind(value.clone());
                part
            })
            .collect();
        set.push_joined(parts, ", ");

        let filter = if self.options().get_where().is_empty() {
            self.format_primary_filter(record)?
        } else {
            self.format_where()?
        };

        let (returning, aliases) = self.format_returning()?;
        Ok(assemble(vec![set, filter, returning]).into_statement(aliases))
    }

    fn format_primary_filter(&self, record: &Record) -> OrmResult<Sql> {
        let primary = self.entity().primary_fields();
        if primary.is_empty() || !primary.iter().all(|f| record.contains_key(&f.name)) {
            return Ok(Sql::empty());
        }
        let group = Grouping::and(primary.iter().map(|field| {
            let value = record.get(&field.name).cloned().map_or(Expr::Unbound, Expr::Value);
            Condition::equal_to(field.name.as_str(), value)
        }));
        let mut sql = Sql::new("WHERE ");
        sql.push_sql(group.format(&self.context())?);
        Ok(sql)
    }

    /// One batch UPDATE per batch of `records`.
    pub fn format_update_many(&self, records: &[Record]) -> OrmResult<Vec<Statement>> {
        self.batches(records)?
            .into_iter()
            .map(|batch| self.format_update_batch(batch))
            .collect()
    }

    /// `UPDATE table SET col = v.col, … FROM (VALUES (…), …) AS v(cols)
    /// WHERE table.pk = v.pk [AND …] RETURNING …`.
    ///
    /// Columns come from the first record and must include the primary key.
    /// Placeholders are cast to the field's type since VALUES rows carry no
    /// column types of their own.
    pub fn format_update_batch(&self, records: &[Record]) -> OrmResult<Statement> {
        let entity = self.entity();
        let first = records.first().ok_or_else(|| {
            OrmError::Validation(format!("{}: no records to update", entity.name()))
        })?;
        let columns: Vec<&FieldDef> = first
            .keys()
            .filter_map(|key| entity.get_field(key))
            .collect();
        let primary = entity.primary_fields();
        if primary.is_empty() {
            return Err(OrmError::Validation(format!(
                "{}: batch update needs a primary key",
                entity.name()
            )));
        }
        if let Some(missing) = primary
            .iter()
            .find(|p| !columns.iter().any(|c| c.name == p.name))
        {
            return Err(OrmError::Validation(format!(
                "{}: batch update records must carry `{}`",
                entity.name(),
                missing.name
            )));
        }
        if columns.iter().all(|c| c.primary) {
            return Err(OrmError::Validation(format!(
                "{}: no fields to update",
                entity.name()
            )));
        }

        let values_alias = ident::Ident::new(VALUES_ALIAS)?;
        let qualifier = self.context().qualifier()?;

        let mut head = Sql::new("UPDATE ");
        head.push(&self.format_table_alias()?).push(" SET ");
        let set: Vec<String> = columns
            .iter()
            .filter(|c| !c.primary)
            .map(|c| {
                format!(
                    "{} = {}",
                    c.column.to_sql(),
                    ident::qualified(&values_alias, &c.column)
                )
            })
            .collect();
        head.push(&set.join(", "));

        let mut from = Sql::new("FROM (VALUES ");
        let tuples = records
            .iter()
            .map(|record| {
                let mut tuple = Sql::new("(");
                for (i, field) in columns.iter().enumerate() {
                    if i > 0 {
                        tuple.push(", ");
                    }
                    match record.get(&field.name) {
                        Some(value) => tuple.push_bind(value.clone()),
                        None => tuple.push_unbound(),
                    };
                    if let Some(sql_type) = field.field_type.sql_type() {
                        tuple.push("::").push(sql_type);
                    }
                }
                tuple.push(")");
                tuple
            })
            .collect();
        from.push_joined(tuples, ", ");
        let names: Vec<String> = columns.iter().map(|c| c.column.to_sql()).collect();
        from.push(") AS ")
            .push(&values_alias.to_sql())
            .push("(")
            .push(&names.join(", "))
            .push(")");

        let mut filter = Sql::new("WHERE ");
        let keys: Vec<String> = primary
            .iter()
            .map(|p| {
                format!(
                    "{} = {}",
                    ident::qualified(qualifier, &p.column),
                    ident::qualified(&values_alias, &p.column)
                )
            })
            .collect();
        filter.push(&keys.join(" AND "));
        let extra = expr::format_items(Junction::And, self.options().get_where(), &self.context())?;
        if !extra.is_empty() {
            filter.push(" AND ");
            filter.push_sql(extra);
        }

        let (returning, aliases) = self.format_returning()?;
        Ok(assemble(vec![head, from, filter, returning]).into_statement(aliases))
    }
}
