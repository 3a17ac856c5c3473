//! Batched INSERT with primary-key backfill.
//!
//! [`write_batch`] writes one chunk of objects of the same table with a single
//! multi-row INSERT and then attributes generated keys back to the objects.
//! The strategy depends on what the dialect and driver can report:
//!
//! 1. `RETURNING <key>`: one id per row, in execution order.
//! 2. Last insert id: assigned directly for one object. MySQL hands out
//!    consecutive ids for a multi-row INSERT, so a batch whose affected-row
//!    count equals its size gets `first, first + 1, ...`. That heuristic
//!    assumes no concurrent writer interleaved ids; anything else attributes
//!    the first object only and logs a warning.
//! 3. Otherwise (SQLite multi-row without RETURNING) only the last row's id
//!    is known, so only single-row batches are attributed.
//!
//! Objects that are not attributed keep their prior key state.

use crate::assemble::{Assembler, InsertStatement};
use crate::error::{OrmError, OrmResult};
use crate::exec::{DriverFeature, Executor};
use crate::meta::{Record, TableDescriptor};
use crate::query::UpsertClause;
use crate::value::Value;
use chrono::Utc;

/// What a batch write did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Rows reported written (inserted or updated) by the driver.
    pub written: u64,
    /// Objects that received a generated key.
    pub backfilled: usize,
}

/// Insert `objects` into `descriptor`'s table and backfill generated keys.
pub async fn write_batch<E, R>(
    executor: &E,
    descriptor: &TableDescriptor,
    objects: &mut [R],
    upsert: Option<&UpsertClause>,
) -> OrmResult<BatchOutcome>
where
    E: Executor,
    R: Record,
{
    if objects.is_empty() {
        return Ok(BatchOutcome::default());
    }

    fill_timestamps(descriptor, objects, true)?;

    let auto_key = descriptor.auto_increment_key().map(|c| c.db_column.as_str());
    let columns = insert_columns(descriptor, objects);
    if columns.is_empty() && auto_key.is_none() {
        return Err(OrmError::mapping(format!(
            "nothing to insert into '{}': no columns set and no auto-increment key",
            descriptor.name
        )));
    }

    let rows = objects
        .iter()
        .map(|obj| {
            columns
                .iter()
                .map(|c| obj.get(c).unwrap_or(Value::Null))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let dialect = executor.dialect();
    let do_nothing = upsert.is_some_and(UpsertClause::is_do_nothing);
    // Keys supplied by the caller need no backfill.
    let backfill_key = auto_key.filter(|k| !columns.iter().any(|c| c == *k));
    let use_returning = backfill_key.is_some()
        && !do_nothing
        && dialect.supports_returning()
        && executor.supports_feature(DriverFeature::Returning);

    let mut stmt = InsertStatement::new(descriptor.name.as_str())
        .columns(columns.as_slice())
        .rows(rows)
        .upsert(upsert.cloned())
        .primary_keys(descriptor.primary_keys().as_slice());
    if let (true, Some(key)) = (use_returning, backfill_key) {
        stmt = stmt.returning(key);
    }
    let built = Assembler::new(dialect).build_insert(&stmt)?;
    tracing::debug!(
        target: "polyorm.sql",
        table = %descriptor.name,
        rows = objects.len(),
        sql = %built.sql,
    );

    if let (true, Some(key)) = (use_returning, backfill_key) {
        let ids = executor.execute_returning(&built.sql, &built.args).await?;
        if ids.len() != objects.len() {
            tracing::warn!(
                target: "polyorm.batch",
                table = %descriptor.name,
                expected = objects.len(),
                returned = ids.len(),
                "RETURNING produced a different number of ids than objects"
            );
        }
        let mut backfilled = 0;
        for (obj, id) in objects.iter_mut().zip(ids.iter()) {
            obj.set(key, id.clone())?;
            backfilled += 1;
        }
        if !ids.is_empty() {
            objects.iter_mut().for_each(|o| o.set_persisted(true));
        }
        return Ok(BatchOutcome {
            written: ids.len() as u64,
            backfilled,
        });
    }

    let result = executor.execute(&built.sql, &built.args).await?;
    let affected = result.rows_affected;
    let persisted = match affected {
        Some(n) => n >= 1 || do_nothing,
        None => true,
    };
    if persisted {
        objects.iter_mut().for_each(|o| o.set_persisted(true));
    }

    let mut backfilled = 0;
    let last_id = result.last_insert_id.filter(|id| !id.is_unset_key());
    if let (Some(key), Some(last_id)) = (backfill_key, last_id) {
        if affected != Some(0) && executor.supports_feature(DriverFeature::LastInsertId) {
            backfilled = attribute_last_insert_id(
                descriptor,
                objects,
                key,
                last_id,
                affected,
                dialect.sequential_insert_ids(),
            )?;
        }
    }

    Ok(BatchOutcome {
        written: affected.unwrap_or(objects.len() as u64),
        backfilled,
    })
}

fn attribute_last_insert_id<R: Record>(
    descriptor: &TableDescriptor,
    objects: &mut [R],
    key: &str,
    last_id: Value,
    affected: Option<u64>,
    sequential: bool,
) -> OrmResult<usize> {
    let count = objects.len();
    if count == 1 {
        objects[0].set(key, last_id)?;
        return Ok(1);
    }

    if !sequential {
        tracing::warn!(
            target: "polyorm.batch",
            table = %descriptor.name,
            rows = count,
            "driver only reports the last inserted id; keys of a multi-row insert are not backfilled"
        );
        return Ok(0);
    }

    let first = match (affected, last_id.as_i64()) {
        (Some(n), Some(first)) if n == count as u64 => first,
        _ => {
            tracing::warn!(
                target: "polyorm.batch",
                table = %descriptor.name,
                rows = count,
                affected = ?affected,
                "affected rows differ from batch size; only the first object receives a key"
            );
            objects[0].set(key, last_id)?;
            return Ok(1);
        }
    };
    for (i, obj) in objects.iter_mut().enumerate() {
        obj.set(key, Value::BigInt(first + i as i64))?;
    }
    Ok(count)
}

/// Ordered columns of the first object that sets any. An unset auto-increment
/// key is left to the database.
fn insert_columns<R: Record>(descriptor: &TableDescriptor, objects: &[R]) -> Vec<String> {
    for obj in objects {
        let columns: Vec<String> = descriptor
            .stored_columns()
            .filter(|c| match obj.get(&c.db_column) {
                None => false,
                Some(v) if c.flags.auto_increment => !v.is_unset_key(),
                Some(_) => true,
            })
            .map(|c| c.db_column.clone())
            .collect();
        if !columns.is_empty() {
            return columns;
        }
    }
    Vec::new()
}

/// Stamp empty `created_at` (on insert) and `updated_at` columns with the
/// current UTC time, writing the value back to each object.
pub(crate) fn fill_timestamps<R: Record>(
    descriptor: &TableDescriptor,
    objects: &mut [R],
    inserting: bool,
) -> OrmResult<()> {
    let now = Value::Timestamp(Utc::now().naive_utc());
    for column in descriptor.stored_columns() {
        let stamp_created = inserting && column.flags.created_at;
        if !stamp_created && !column.flags.updated_at {
            continue;
        }
        for obj in objects.iter_mut() {
            let empty = obj.get(&column.db_column).is_none_or(|v| v.is_null());
            // updated_at always moves forward on update.
            if empty || (!inserting && column.flags.updated_at) {
                obj.set(&column.db_column, now.clone())?;
            }
        }
    }
    Ok(())
}
