//! Filter fragments and boolean groups of them.
//!
//! A [`Condition`] is raw SQL text with `?` placeholders plus the ordered
//! arguments that fill them. A [`ConditionGroup`] joins conditions with one
//! boolean operator and can be negated as a whole.
//!
//! # Example
//! ```ignore
//! use polyorm::{args, Condition};
//!
//! let c = Condition::new("age > ? AND name = ?", args![30, "alice"]);
//! assert_eq!(c.placeholder_count(), 2);
//! ```

use crate::error::{OrmError, OrmResult};
use crate::value::Value;

/// Build a `Vec<Value>` from heterogeneous expressions.
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<$crate::Value>::new() };
    ($($v:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($v)),+]
    };
}

/// A single filter fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    fragment: String,
    args: Vec<Value>,
}

impl Condition {
    /// Create a condition from a fragment with `?` placeholders and its arguments.
    pub fn new<V: Into<Value>>(fragment: impl Into<String>, args: impl IntoIterator<Item = V>) -> Self {
        Self {
            fragment: fragment.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// A fragment without arguments.
    pub fn raw(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            args: Vec::new(),
        }
    }

    /// `column IN (?, ?, ...)`; an empty list yields the unsatisfiable `1 = 0`.
    pub fn in_list<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::list(column, "IN", "1 = 0", values)
    }

    /// `column NOT IN (?, ?, ...)`; an empty list yields the tautology `1 = 1`.
    pub fn not_in<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::list(column, "NOT IN", "1 = 1", values)
    }

    fn list<V: Into<Value>>(
        column: &str,
        op: &str,
        when_empty: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let args: Vec<Value> = values.into_iter().map(Into::into).collect();
        if args.is_empty() {
            return Self::raw(when_empty);
        }
        // A lone subquery operand renders as `col IN (SELECT ...)`.
        let placeholders = vec!["?"; args.len()].join(", ");
        Self {
            fragment: format!("{column} {op} ({placeholders})"),
            args,
        }
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Number of `?` placeholders outside quoted literals.
    pub fn placeholder_count(&self) -> usize {
        split_placeholders(&self.fragment).len() - 1
    }

    /// Check that every placeholder has exactly one argument and vice versa.
    ///
    /// Subquery arguments also consume a placeholder; surplus trailing
    /// arguments are rejected rather than silently dropped.
    pub fn validate(&self) -> OrmResult<()> {
        let placeholders = self.placeholder_count();
        let args = self.args.len();
        if placeholders > args {
            return Err(OrmError::statement(format!(
                "condition `{}` has {placeholders} placeholder(s) but only {args} argument(s)",
                self.fragment
            )));
        }
        if args > placeholders {
            return Err(OrmError::statement(format!(
                "condition `{}` has {args} argument(s) but only {placeholders} placeholder(s)",
                self.fragment
            )));
        }
        Ok(())
    }
}

/// Boolean operator joining the members of a [`ConditionGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoolOp {
    #[default]
    And,
    Or,
}

impl BoolOp {
    pub const fn as_sql(self) -> &'static str {
        match self {
            BoolOp::And => " AND ",
            BoolOp::Or => " OR ",
        }
    }
}

/// An ordered list of conditions combined with one operator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConditionGroup {
    conditions: Vec<Condition>,
    op: BoolOp,
    negated: bool,
}

impl ConditionGroup {
    pub fn new(op: BoolOp) -> Self {
        Self {
            conditions: Vec::new(),
            op,
            negated: false,
        }
    }

    /// A group rendered as `NOT (...)`.
    pub fn negated(op: BoolOp) -> Self {
        Self {
            conditions: Vec::new(),
            op,
            negated: true,
        }
    }

    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn extend(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        self.conditions.extend(conditions);
    }

    pub fn op(&self) -> BoolOp {
        self.op
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

/// Split `sql` at every `?` that is not inside a quoted literal or identifier.
///
/// `n` placeholders produce `n + 1` pieces.
pub(crate) fn split_placeholders(sql: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in sql.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => {
                    pieces.push(&sql[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    pieces.push(&sql[start..]);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_placeholders() {
        assert_eq!(split_placeholders("a = ? AND b = ?"), vec!["a = ", " AND b = ", ""]);
        assert_eq!(split_placeholders("a = '?'"), vec!["a = '?'"]);
        assert_eq!(split_placeholders("`we?rd` = ?"), vec!["`we?rd` = ", ""]);
        assert_eq!(split_placeholders("name = 'it''s' OR x = ?").len(), 2);
    }

    #[test]
    fn test_empty_in_list() {
        let c = Condition::in_list("id", Vec::<i64>::new());
        assert_eq!(c.fragment(), "1 = 0");
        assert!(c.args().is_empty());

        let c = Condition::not_in("id", Vec::<i64>::new());
        assert_eq!(c.fragment(), "1 = 1");
    }

    #[test]
    fn test_in_list() {
        let c = Condition::in_list("id", [1, 2, 3]);
        assert_eq!(c.fragment(), "id IN (?, ?, ?)");
        assert_eq!(c.args().len(), 3);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_validate_mismatch() {
        let too_few = Condition::new("a = ? AND b = ?", [1]);
        assert!(too_few.validate().unwrap_err().is_statement_preparation());

        let too_many = Condition::new("a = ?", args![1, 2]);
        assert!(too_many.validate().is_err());

        let raw = Condition::raw("deleted = 0");
        assert!(raw.validate().is_ok());
    }

    #[test]
    fn test_group() {
        let mut g = ConditionGroup::new(BoolOp::Or);
        assert!(g.is_empty());
        g.push(Condition::new("a = ?", [1]));
        g.push(Condition::new("a = ?", [1]));
        assert_eq!(g.len(), 2);
        assert_eq!(g.op().as_sql(), " OR ");
        assert!(!g.is_negated());
        assert!(ConditionGroup::negated(BoolOp::And).is_negated());
    }
}
