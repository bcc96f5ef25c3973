use super::{SqlFormatter, assemble, format_column_list};
use crate::error::{OrmError, OrmResult};
use crate::expr::{self, FormatContext, Junction};
use crate::ident::Ident;
use crate::options::Column;
use crate::query::{Join, JoinKind};
use crate::registry;
use crate::sql::{Sql, Statement};

impl SqlFormatter<'_> {
    /// `SELECT [DISTINCT] cols FROM table [joins] [WHERE] [GROUP BY] [HAVING]
    /// [ORDER BY] [LIMIT] [OFFSET] [locking]`.
    pub fn format_select(&self) -> OrmResult<Statement> {
        let (columns, mut aliases) = self.format_columns()?;
        let (joins, join_columns, join_aliases) = self.format_joins()?;
        aliases.extend(join_aliases);

        let mut select = Sql::new("SELECT ");
        let distinct = self.format_distinct();
        if !distinct.is_empty() {
            select.push(distinct).push(" ");
        }
        let mut column_list = Sql::empty();
        column_list.push_joined(vec![columns, join_columns], ", ");
        select.push_sql(column_list);

        let sql = assemble(vec![
            select,
            Sql::new(self.format_from()?),
            joins,
            self.format_where()?,
            self.format_group_by()?,
            self.format_having()?,
            self.format_order_by()?,
            Sql::new(self.format_limit()),
            Sql::new(self.format_offset()),
            Sql::new(self.format_locking()?),
        ]);
        Ok(sql.into_statement(aliases))
    }

    /// `SELECT COUNT(*) AS count FROM table [joins] [WHERE]`.
    pub fn format_count(&self) -> OrmResult<Statement> {
        let (joins, _, _) = self.format_joins()?;
        let sql = assemble(vec![
            Sql::new("SELECT COUNT(*) AS count"),
            Sql::new(self.format_from()?),
            joins,
            self.format_where()?,
        ]);
        Ok(sql.into_statement(vec!["count".to_string()]))
    }

    /// JOIN clauses, the joined columns and their `{alias}.{field}` aliases.
    pub fn format_joins(&self) -> OrmResult<(Sql, Sql, Vec<String>)> {
        let mut clauses = Vec::new();
        let mut columns = Vec::new();
        let mut aliases = Vec::new();
        for join in self.query.joins() {
            let (clause, cols, names) = self.format_join(join)?;
            clauses.push(clause);
            columns.push(cols);
            aliases.extend(names);
        }
        let mut joins = Sql::empty();
        joins.push_joined(clauses, " ");
        let mut column_list = Sql::empty();
        column_list.push_joined(columns, ", ");
        Ok((joins, column_list, aliases))
    }

    fn format_join(&self, join: &Join) -> OrmResult<(Sql, Sql, Vec<String>)> {
        let owner = self.entity();
        let joined = join.query().entity();
        let table = joined.require_table()?;
        let options = join.query().effective_options();
        let alias_name = join.alias_name()?;
        let alias = Ident::new(alias_name.as_str())
            .map_err(|e| OrmError::Validation(format!("{}: join alias: {e}", owner.name())))?;
        let ctx = FormatContext::new(joined).with_alias(Some(&alias));

        let pairs = if join.on_pairs().is_empty() {
            registry::reference_pairs(owner, joined)
        } else {
            join.on_pairs().to_vec()
        };
        if pairs.is_empty() {
            return Err(OrmError::Config(format!(
                "{}: no reference to join `{}` on",
                owner.name(),
                joined.name()
            )));
        }

        let mut clause = Sql::new(match join.kind() {
            JoinKind::Inner => "INNER JOIN ",
            JoinKind::Left => "LEFT JOIN ",
        });
        let mut target = joined.qualified_table()?;
        if alias != *table {
            target.push_str(" AS ");
            target.push_str(&alias.to_sql());
        }
        clause.push(&target).push(" ON ");

        let own = self.context();
        let mut on = Vec::with_capacity(pairs.len() + 1);
        for (local, foreign) in &pairs {
            on.push(Sql::new(format!(
                "{} = {}",
                ctx.column(foreign)?,
                own.column(local)?
            )));
        }
        let filter = expr::format_items(Junction::And, options.get_where(), &ctx)?;
        on.push(filter);
        clause.push_joined(on, " AND ");

        let defaults: Vec<Column>;
        let fields = match options.get_fields() {
            Some(fields) => fields,
            None => {
                defaults = joined
                    .field_names()
                    .into_iter()
                    .map(Column::field)
                    .collect();
                &defaults
            }
        };
        let (columns, aliases) = format_column_list(fields, &ctx, Some(alias_name.as_str()))?;
        Ok((clause, columns, aliases))
    }
}
