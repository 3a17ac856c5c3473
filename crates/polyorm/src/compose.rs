//! Condition composition.
//!
//! Turns the WHERE / OR / NOT groups of a [`QueryState`] into one boolean SQL
//! expression with a flat, positional argument list. Subquery arguments are
//! inlined: their SQL replaces the `?` they are bound to and their own
//! arguments are appended in place.
//!
//! Rendering rules:
//! - every condition is wrapped in parentheses;
//! - WHERE members are joined with `AND`, OR members with `OR`;
//! - the OR group is appended to the WHERE group with `OR`;
//! - the NOT group is appended as `AND NOT (...)`, applying to everything before it;
//! - an external scope fragment (soft delete) is AND-ed in front in its own parentheses.

use crate::condition::{Condition, ConditionGroup, split_placeholders};
use crate::error::OrmResult;
use crate::query::QueryState;
use crate::value::Value;

/// A rendered boolean expression and its arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composed {
    /// The expression without the `WHERE` keyword; empty when there is none.
    pub sql: String,
    pub args: Vec<Value>,
}

impl Composed {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// ` WHERE <expr>` or an empty string.
    pub fn where_clause(&self) -> String {
        if self.sql.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.sql)
        }
    }
}

/// Compose the state's condition groups, AND-ing `scope` in front when given.
pub fn compose(state: &QueryState, scope: Option<&str>) -> OrmResult<Composed> {
    let mut args = Vec::new();
    let user = compose_user_conditions(state, &mut args)?;
    let scope = scope.map(str::trim).filter(|s| !s.is_empty());

    let sql = match (scope, user.is_empty()) {
        (None, _) => user.sql,
        (Some(scope), true) => format!("({scope})"),
        (Some(scope), false) if user.needs_grouping => format!("({scope}) AND ({})", user.sql),
        (Some(scope), false) => format!("({scope}) AND {}", user.sql),
    };
    Ok(Composed { sql, args })
}

struct UserConditions {
    sql: String,
    /// Top-level `OR` present, so AND-ing anything onto it needs parentheses.
    needs_grouping: bool,
}

impl UserConditions {
    fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

fn compose_user_conditions(state: &QueryState, args: &mut Vec<Value>) -> OrmResult<UserConditions> {
    let where_sql = render_group(&state.where_group, args)?;
    let or_sql = render_group(&state.or_group, args)?;
    let not_sql = render_group(&state.not_group, args)?;

    let mut sql = where_sql;
    let mut needs_grouping = state.or_group.len() > 1;
    if !or_sql.is_empty() {
        if sql.is_empty() {
            sql = or_sql;
        } else {
            sql = format!("{sql} OR {or_sql}");
            needs_grouping = true;
        }
    }
    if !not_sql.is_empty() {
        if sql.is_empty() {
            sql = format!("NOT ({not_sql})");
        } else if needs_grouping {
            sql = format!("({sql}) AND NOT ({not_sql})");
        } else {
            sql = format!("{sql} AND NOT ({not_sql})");
        }
        needs_grouping = false;
    }
    Ok(UserConditions { sql, needs_grouping })
}

/// Render the members of one group joined by its operator (negation is
/// applied by the caller).
pub(crate) fn render_group(group: &ConditionGroup, args: &mut Vec<Value>) -> OrmResult<String> {
    let mut parts = Vec::with_capacity(group.len());
    for condition in group.conditions() {
        let sql = render_condition(condition, args)?;
        if !sql.is_empty() {
            parts.push(format!("({sql})"));
        }
    }
    Ok(parts.join(group.op().as_sql()))
}

/// Substitute one condition's placeholders left to right.
pub(crate) fn render_condition(condition: &Condition, args: &mut Vec<Value>) -> OrmResult<String> {
    condition.validate()?;
    Ok(render_fragment(condition.fragment(), condition.args(), args))
}

fn render_fragment(fragment: &str, values: &[Value], args: &mut Vec<Value>) -> String {
    let pieces = split_placeholders(fragment);
    let mut out = String::with_capacity(fragment.len());
    for (i, piece) in pieces.iter().enumerate() {
        if i > 0 {
            match &values[i - 1] {
                Value::Subquery(sub) => {
                    out.push_str(&sub.sql);
                    args.extend(sub.args.iter().cloned().map(Value::from));
                }
                value => {
                    out.push('?');
                    args.push(value.clone());
                }
            }
        }
        out.push_str(piece);
    }
    out.trim().to_string()
}
