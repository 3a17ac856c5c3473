//! Hard DELETE statements.

use super::{Assembler, Built};
use crate::compose::compose;
use crate::error::{OrmError, OrmResult};
use crate::query::QueryState;

impl Assembler {
    /// Build a hard `DELETE FROM <table> [WHERE ...]`.
    ///
    /// The soft-delete scope does not apply; use
    /// [`Assembler::build_soft_delete`] to mark rows instead.
    pub fn build_delete(&self, state: &QueryState) -> OrmResult<Built> {
        Self::check_build_errors(state)?;
        let table = Self::mutation_table(state, "DELETE")?;
        if !state.joins.is_empty() {
            return Err(OrmError::unsupported("DELETE with joins"));
        }

        let mut sql = String::with_capacity(64);
        let mut args = Vec::new();
        self.write_ctes(&mut sql, &mut args, &state.ctes)?;
        sql.push_str("DELETE FROM ");
        self.dialect.write_ident(&mut sql, table);

        let composed = compose(state, None)?;
        self.warn_if_unscoped("DELETE", table, state);
        sql.push_str(&composed.where_clause());
        args.extend(composed.args);

        Ok(Built::new(sql, args))
    }
}
