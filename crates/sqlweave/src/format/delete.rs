use super::{SqlFormatter, assemble};
use crate::error::OrmResult;
use crate::sql::{Sql, Statement};

impl SqlFormatter<'_> {
    /// `DELETE FROM table [AS alias] [WHERE …] RETURNING …`.
    pub fn format_delete(&self) -> OrmResult<Statement> {
        let mut head = Sql::new("DELETE ");
        head.push(&self.format_from()?);
        let (returning, aliases) = self.format_returning()?;
        Ok(assemble(vec![head, self.format_where()?, returning]).into_statement(aliases))
    }
}
