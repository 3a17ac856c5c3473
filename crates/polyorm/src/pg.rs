//! PostgreSQL execution via `tokio-postgres`.
//!
//! [`Executor`] is implemented for [`tokio_postgres::Client`]: `?`
//! placeholders are renumbered to `$n` and [`Value`] is bound through its
//! [`ToSql`] impl. Integers and floats are widened or narrowed to the column
//! type the server reports, so `Value::Int` binds to `BIGINT` columns as well.

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::exec::{DriverFeature, ExecResult, Executor, Row};
use crate::value::Value;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::error::Error;
use tokio_postgres::Client;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};

type BoxError = Box<dyn Error + Sync + Send>;

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Int(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT8 => i64::from(*v).to_sql(ty, out),
                Type::FLOAT8 => f64::from(*v).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::BigInt(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Double(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Text(s) => match *ty {
                Type::UUID => uuid::Uuid::parse_str(s)?.to_sql(ty, out),
                Type::JSON | Type::JSONB => {
                    serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out)
                }
                _ => s.to_sql(ty, out),
            },
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Date(v) => v.to_sql(ty, out),
            Value::Time(v) => v.to_sql(ty, out),
            Value::Timestamp(v) => match *ty {
                Type::TIMESTAMPTZ => {
                    DateTime::<Utc>::from_naive_utc_and_offset(*v, Utc).to_sql(ty, out)
                }
                _ => v.to_sql(ty, out),
            },
            Value::Blob(v) => v.to_sql(ty, out),
            Value::Subquery(_) => {
                Err("subquery values are rendered into SQL and cannot be bound".into())
            }
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

impl<'a> FromSql<'a> for Value {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(match *ty {
            Type::BOOL => Value::Bool(bool::from_sql(ty, raw)?),
            Type::INT2 => Value::Int(i16::from_sql(ty, raw)?.into()),
            Type::INT4 => Value::Int(i32::from_sql(ty, raw)?),
            Type::INT8 => Value::BigInt(i64::from_sql(ty, raw)?),
            Type::OID => Value::BigInt(u32::from_sql(ty, raw)?.into()),
            Type::FLOAT4 => Value::Double(f32::from_sql(ty, raw)?.into()),
            Type::FLOAT8 => Value::Double(f64::from_sql(ty, raw)?),
            Type::DATE => Value::Date(NaiveDate::from_sql(ty, raw)?),
            Type::TIME => Value::Time(NaiveTime::from_sql(ty, raw)?),
            Type::TIMESTAMP => Value::Timestamp(NaiveDateTime::from_sql(ty, raw)?),
            Type::TIMESTAMPTZ => Value::Timestamp(DateTime::<Utc>::from_sql(ty, raw)?.naive_utc()),
            Type::BYTEA => Value::Blob(Vec::<u8>::from_sql(ty, raw)?),
            Type::UUID => Value::Text(uuid::Uuid::from_sql(ty, raw)?.to_string()),
            Type::JSON | Type::JSONB => {
                Value::Text(serde_json::Value::from_sql(ty, raw)?.to_string())
            }
            _ => Value::Text(String::from_sql(ty, raw)?),
        })
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, BoxError> {
        Ok(Value::Null)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn params(args: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

impl Executor for Client {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<ExecResult> {
        let sql = Dialect::Postgres.native_placeholders(sql);
        let affected = Client::execute(self, sql.as_str(), &params(args)).await?;
        Ok(ExecResult::new(affected))
    }

    async fn execute_returning(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Value>> {
        let sql = Dialect::Postgres.native_placeholders(sql);
        let rows = Client::query(self, sql.as_str(), &params(args)).await?;
        rows.iter()
            .map(|row| row.try_get::<_, Value>(0).map_err(OrmError::from))
            .collect()
    }

    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        let sql = Dialect::Postgres.native_placeholders(sql);
        let rows = Client::query(self, sql.as_str(), &params(args)).await?;
        rows.iter()
            .map(|row| -> OrmResult<Row> {
                let columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                let values = (0..row.len())
                    .map(|i| row.try_get::<_, Value>(i))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Row::new(columns, values))
            })
            .collect()
    }

    fn supports_feature(&self, feature: DriverFeature) -> bool {
        match feature {
            DriverFeature::Returning | DriverFeature::Transactions => true,
            DriverFeature::LastInsertId => false,
        }
    }

    async fn begin(&self) -> OrmResult<()> {
        self.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn commit(&self) -> OrmResult<()> {
        self.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&self) -> OrmResult<()> {
        self.batch_execute("ROLLBACK").await?;
        Ok(())
    }
}
