//! Dialect SQL assembly.
//!
//! [`Assembler`] renders a read-only [`QueryState`](crate::QueryState) into
//! final SQL text with `?` placeholders plus a flat argument list:
//!
//! - [`Assembler::build_select`] / [`Assembler::build_count`]
//! - [`Assembler::build_insert`] / [`Assembler::build_insert_suffix`]
//! - [`Assembler::build_update`] / [`Assembler::build_soft_delete`]
//! - [`Assembler::build_delete`]
//!
//! Use [`Dialect::native_placeholders`](crate::Dialect::native_placeholders)
//! when a driver needs `$n` placeholders.

mod delete;
mod insert;
mod select;
mod update;

pub use insert::InsertStatement;
pub use update::Assignment;

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::query::QueryState;
use crate::value::Value;

/// Final SQL text and its positional arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Built {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Built {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

/// Renders statements for one dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assembler {
    dialect: Dialect,
    warn_unscoped: bool,
}

impl Assembler {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            warn_unscoped: true,
        }
    }

    /// Toggle the warning emitted for UPDATE/DELETE without a WHERE clause.
    pub fn warn_unscoped_mutations(mut self, enabled: bool) -> Self {
        self.warn_unscoped = enabled;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Warn when the caller supplied no conditions. The soft-delete scope
    /// does not count: it still matches every live row.
    pub(crate) fn warn_if_unscoped(&self, verb: &str, table: &str, state: &QueryState) {
        if self.warn_unscoped && !state.has_conditions() {
            tracing::warn!(
                target: "polyorm.query",
                table,
                "{verb} without a WHERE clause affects every row"
            );
        }
    }

    pub(crate) fn quote(&self, ident: &str) -> String {
        self.dialect.quote_ident(ident)
    }

    /// Fail on construction problems recorded by the builder.
    pub(crate) fn check_build_errors(state: &QueryState) -> OrmResult<()> {
        if state.build_errors.is_empty() {
            return Ok(());
        }
        Err(OrmError::statement(state.build_errors.join("; ")))
    }

    /// The table a mutation targets; subquery sources and empty names fail.
    pub(crate) fn mutation_table<'s>(state: &'s QueryState, verb: &str) -> OrmResult<&'s str> {
        match state.target_table() {
            Some(table) => Ok(table),
            None if state.has_implicit_source() => Err(OrmError::statement(format!(
                "{verb} requires a table name"
            ))),
            None => Err(OrmError::statement(format!(
                "{verb} cannot target a subquery source"
            ))),
        }
    }

    /// The soft-delete predicate for `state`, when it applies: the source is
    /// exactly the model's table, the model has a `deleted_at` column and the
    /// scope has not been disabled.
    pub(crate) fn soft_delete_scope(&self, state: &QueryState) -> Option<String> {
        if !state.soft_delete_scope || !state.reads_model_table() {
            return None;
        }
        let model = state.model.as_deref()?;
        let column = model.deleted_at_column()?;
        let column = if state.joins.is_empty() {
            self.quote(column)
        } else {
            self.quote(&format!("{}.{column}", model.name))
        };
        Some(format!("{column} IS NULL"))
    }
}

/// Append a subquery value as `(<sql>)`, flattening its arguments.
pub(crate) fn push_value(sql: &mut String, args: &mut Vec<Value>, value: &Value) {
    match value {
        Value::Subquery(sub) => {
            sql.push('(');
            sql.push_str(&sub.sql);
            sql.push(')');
            args.extend(sub.args.iter().cloned().map(Value::from));
        }
        value => {
            sql.push('?');
            args.push(value.clone());
        }
    }
}
