//! Nested queries as SQL fragments.
//!
//! [`as_subquery`] renders a [`QueryState`] into a [`SubqueryExpr`] that can be
//! bound wherever a [`Value`] goes: as a FROM source, a named select column,
//! a CTE body or a condition operand.
//!
//! When a query is used as a *condition* of another query on the same table,
//! [`merge_or_exists`] folds the inner filters straight into the outer query
//! instead of producing a correlated `EXISTS (...)`.

use crate::assemble::Assembler;
use crate::compose::compose;
use crate::condition::Condition;
use crate::error::{OrmError, OrmResult};
use crate::query::{QueryState, Source};
use crate::value::{BindValue, SubqueryExpr, Value};

/// Render `state` without pagination into a bindable subquery expression.
///
/// Fails with a mapping error when an argument cannot be bound inside a
/// subquery or when nothing was rendered.
pub fn as_subquery(state: &QueryState) -> OrmResult<SubqueryExpr> {
    let built = Assembler::new(state.dialect).build_select(state, true)?;
    if built.sql.trim().is_empty() {
        return Err(OrmError::mapping("subquery rendered to empty SQL"));
    }
    let args = built
        .args
        .into_iter()
        .map(BindValue::try_from)
        .collect::<OrmResult<Vec<_>>>()?;
    Ok(SubqueryExpr::new(built.sql, args))
}

/// Whether both queries read the same table: by explicit name, or through the
/// same model with both sources left implicit.
pub fn targets_same_table(outer: &QueryState, inner: &QueryState) -> bool {
    match (&outer.source, &inner.source) {
        (Source::Table(_), Source::Table(_)) => {
            match (outer.target_table(), inner.target_table()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Result of using one query as a condition of another.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// Inner WHERE conditions, to be AND-ed into the outer query as they are.
    Merged(Vec<Condition>),
    /// `EXISTS (<inner select>)`.
    Exists(Condition),
}

impl MergeOutcome {
    /// Collapse into a single condition (empty merges yield `None`).
    pub fn into_condition(self) -> Option<Condition> {
        match self {
            MergeOutcome::Merged(conditions) => conjoin(conditions),
            MergeOutcome::Exists(condition) => Some(condition),
        }
    }
}

/// Merge `inner` into `outer` when both read the same table and `inner` only
/// filters; otherwise wrap it as `EXISTS (...)`.
pub fn merge_or_exists(outer: &QueryState, inner: &QueryState) -> OrmResult<MergeOutcome> {
    if outer.dialect != inner.dialect {
        return Err(OrmError::statement(format!(
            "cannot nest a {} query inside a {} query",
            inner.dialect, outer.dialect
        )));
    }
    if !inner.build_errors.is_empty() {
        return Err(OrmError::statement(inner.build_errors.join("; ")));
    }

    if targets_same_table(outer, inner) && is_filter_only(inner, outer) {
        if inner.or_group.is_empty() && inner.not_group.is_empty() {
            return Ok(MergeOutcome::Merged(inner.where_group.conditions().to_vec()));
        }
        let composed = compose(inner, None)?;
        if composed.is_empty() {
            return Ok(MergeOutcome::Merged(Vec::new()));
        }
        return Ok(MergeOutcome::Merged(vec![Condition::new(
            composed.sql,
            composed.args,
        )]));
    }

    let sub = as_subquery(inner)?;
    Ok(MergeOutcome::Exists(Condition::new(
        "EXISTS (?)",
        [Value::Subquery(sub)],
    )))
}

/// A query whose only effect is row filtering, scoped the same way as `outer`.
fn is_filter_only(inner: &QueryState, outer: &QueryState) -> bool {
    inner.joins.is_empty()
        && inner.group_by.is_none()
        && inner.having.is_none()
        && inner.limit.is_none()
        && inner.offset.is_none()
        && inner.ctes.is_empty()
        && !inner.distinct
        && inner.soft_delete_scope == outer.soft_delete_scope
}

/// AND several conditions into one, each member parenthesized.
pub(crate) fn conjoin(conditions: Vec<Condition>) -> Option<Condition> {
    match conditions.len() {
        0 => None,
        1 => conditions.into_iter().next(),
        _ => {
            let fragment = conditions
                .iter()
                .map(|c| format!("({})", c.fragment()))
                .collect::<Vec<_>>()
                .join(" AND ");
            let args: Vec<Value> = conditions.iter().flat_map(|c| c.args().to_vec()).collect();
            Some(Condition::new(fragment, args))
        }
    }
}
