//! Bound parameter values.
//!
//! [`Value`] is what builders collect as arguments. One of its variants,
//! [`Value::Subquery`], carries an already rendered subquery together with its
//! own arguments. Those arguments are [`BindValue`]s, which have no subquery
//! variant, so a subquery can never nest another subquery value.

use crate::error::{OrmError, OrmResult};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// A positional SQL argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i32),
    BigInt(i64),
    Double(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Blob(Vec<u8>),
    /// Rendered subquery text plus its own flat argument list.
    Subquery(SubqueryExpr),
}

/// The non-recursive subset of [`Value`]: everything except a subquery.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Null,
    Int(i32),
    BigInt(i64),
    Double(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Blob(Vec<u8>),
}

/// A parameterized subquery fragment usable as a FROM source, a select column
/// or a condition operand.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubqueryExpr {
    pub sql: String,
    pub args: Vec<BindValue>,
}

impl SubqueryExpr {
    pub fn new(sql: impl Into<String>, args: Vec<BindValue>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

impl Value {
    /// Serialize `value` to JSON text.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> OrmResult<Self> {
        Ok(Value::Text(serde_json::to_string(value)?))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_subquery(&self) -> bool {
        matches!(self, Value::Subquery(_))
    }

    /// Integer view of the value, used for generated keys.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Whether this value leaves an auto-increment key for the database to fill.
    pub(crate) fn is_unset_key(&self) -> bool {
        matches!(self, Value::Null | Value::Int(0) | Value::BigInt(0))
    }

    /// Short variant name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::BigInt(_) => "bigint",
            Value::Double(_) => "double",
            Value::Text(_) => "text",
            Value::Bool(_) => "bool",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::Blob(_) => "blob",
            Value::Subquery(_) => "subquery",
        }
    }
}

impl TryFrom<Value> for BindValue {
    type Error = OrmError;

    fn try_from(value: Value) -> OrmResult<Self> {
        Ok(match value {
            Value::Null => BindValue::Null,
            Value::Int(v) => BindValue::Int(v),
            Value::BigInt(v) => BindValue::BigInt(v),
            Value::Double(v) => BindValue::Double(v),
            Value::Text(v) => BindValue::Text(v),
            Value::Bool(v) => BindValue::Bool(v),
            Value::Date(v) => BindValue::Date(v),
            Value::Time(v) => BindValue::Time(v),
            Value::Timestamp(v) => BindValue::Timestamp(v),
            Value::Blob(v) => BindValue::Blob(v),
            Value::Subquery(_) => {
                return Err(OrmError::mapping(
                    "a subquery value cannot be bound inside another subquery",
                ));
            }
        })
    }
}

impl From<BindValue> for Value {
    fn from(value: BindValue) -> Self {
        match value {
            BindValue::Null => Value::Null,
            BindValue::Int(v) => Value::Int(v),
            BindValue::BigInt(v) => Value::BigInt(v),
            BindValue::Double(v) => Value::Double(v),
            BindValue::Text(v) => Value::Text(v),
            BindValue::Bool(v) => Value::Bool(v),
            BindValue::Date(v) => Value::Date(v),
            BindValue::Time(v) => Value::Time(v),
            BindValue::Timestamp(v) => Value::Timestamp(v),
            BindValue::Blob(v) => Value::Blob(v),
        }
    }
}

impl From<SubqueryExpr> for Value {
    fn from(value: SubqueryExpr) -> Self {
        Value::Subquery(value)
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_scalar! {
    i8 => Int,
    i16 => Int,
    i32 => Int,
    u8 => Int,
    u16 => Int,
    u32 => BigInt,
    i64 => BigInt,
    f32 => Double,
    f64 => Double,
    bool => Bool,
    String => Text,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    Vec<u8> => Blob,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Value {
    fn from(v: chrono::DateTime<chrono::Utc>) -> Self {
        Value::Timestamp(v.naive_utc())
    }
}

impl From<uuid::Uuid> for Value {
    fn from(v: uuid::Uuid) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
