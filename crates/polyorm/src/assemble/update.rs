//! UPDATE and soft-delete rendering.

use super::{Assembler, Built, push_value};
use crate::compose::compose;
use crate::error::{OrmError, OrmResult};
use crate::query::QueryState;
use crate::value::Value;

/// One `SET` entry.
///
/// # Example
/// ```ignore
/// use polyorm::Assignment;
///
/// // status = ?
/// Assignment::set("status", "inactive");
/// // view_count = view_count + 1
/// Assignment::increment("view_count", 1);
/// // updated_at = CURRENT_TIMESTAMP
/// Assignment::raw("updated_at = CURRENT_TIMESTAMP");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// `column = ?`; a subquery value renders as `column = (<sql>)`.
    Value { column: String, value: Value },
    /// `column = column + amount` (negative amounts decrement).
    Increment { column: String, amount: i64 },
    /// A complete raw assignment, e.g. `"updated_at = NOW()"`. Not escaped.
    Raw(String),
}

impl Assignment {
    pub fn set(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Assignment::Value {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn increment(column: impl Into<String>, amount: i64) -> Self {
        Assignment::Increment {
            column: column.into(),
            amount,
        }
    }

    pub fn raw(expr: impl Into<String>) -> Self {
        Assignment::Raw(expr.into())
    }

    /// The assigned column, when known.
    pub fn column(&self) -> Option<&str> {
        match self {
            Assignment::Value { column, .. } | Assignment::Increment { column, .. } => Some(column),
            Assignment::Raw(_) => None,
        }
    }
}

impl Assembler {
    /// Build `UPDATE <table> SET ... [WHERE ...]`.
    ///
    /// The soft-delete scope applies, so already deleted rows are left alone.
    /// A statement without any WHERE clause is logged, not rejected.
    pub fn build_update(&self, state: &QueryState, assignments: &[Assignment]) -> OrmResult<Built> {
        Self::check_build_errors(state)?;
        let table = Self::mutation_table(state, "UPDATE")?;
        if assignments.is_empty() {
            return Err(OrmError::statement(format!(
                "UPDATE of '{table}' has no assignments"
            )));
        }
        if !state.joins.is_empty() {
            return Err(OrmError::unsupported("UPDATE with joins"));
        }

        let mut sql = String::with_capacity(96);
        let mut args = Vec::new();
        self.write_ctes(&mut sql, &mut args, &state.ctes)?;
        sql.push_str("UPDATE ");
        self.dialect.write_ident(&mut sql, table);
        sql.push_str(" SET ");
        for (i, assignment) in assignments.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            match assignment {
                Assignment::Value { column, value } => {
                    self.dialect.write_ident(&mut sql, column);
                    sql.push_str(" = ");
                    push_value(&mut sql, &mut args, value);
                }
                Assignment::Increment { column, amount } => {
                    let col = self.quote(column);
                    if *amount >= 0 {
                        sql.push_str(&format!("{col} = {col} + {amount}"));
                    } else {
                        sql.push_str(&format!("{col} = {col} - {}", amount.unsigned_abs()));
                    }
                }
                Assignment::Raw(expr) => sql.push_str(expr),
            }
        }

        let scope = self.soft_delete_scope(state);
        let composed = compose(state, scope.as_deref())?;
        self.warn_if_unscoped("UPDATE", table, state);
        sql.push_str(&composed.where_clause());
        args.extend(composed.args);

        Ok(Built::new(sql, args))
    }

    /// Build `UPDATE <table> SET <deleted_at> = ? [WHERE ...]` for a model with
    /// a soft-delete column.
    pub fn build_soft_delete(&self, state: &QueryState, deleted_at: impl Into<Value>) -> OrmResult<Built> {
        let column = state
            .model
            .as_deref()
            .filter(|_| state.reads_model_table())
            .and_then(|m| m.deleted_at_column())
            .ok_or_else(|| {
                OrmError::invalid_config("soft delete requires a model with a deleted_at column")
            })?;
        self.build_update(state, &[Assignment::set(column, deleted_at)])
    }
}
