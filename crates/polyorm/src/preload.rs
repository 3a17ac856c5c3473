//! Batched association loading.
//!
//! One query per association, `WHERE <key> IN (?, ...)` over the keys of all
//! owner rows, instead of one query per owner. Matching the loaded rows back
//! onto their owners is left to the caller.

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::meta::{AssociationDescriptor, AssociationKind, Registry, TableDescriptor};
use crate::query::{PreloadRequest, QueryState};
use crate::value::Value;

/// The owner column whose values key the preload query.
pub fn owner_key_column<'a>(
    owner: &'a TableDescriptor,
    association: &'a AssociationDescriptor,
) -> OrmResult<&'a str> {
    match association.kind {
        AssociationKind::BelongsTo => Ok(association.foreign_key_column.as_str()),
        AssociationKind::HasOne | AssociationKind::HasMany => {
            owner.primary_keys().first().copied().ok_or_else(|| {
                OrmError::mapping(format!(
                    "'{}' has no primary key to preload '{}'",
                    owner.name, association.field_name
                ))
            })
        }
        AssociationKind::ManyToMany => Err(OrmError::unsupported(format!(
            "many-to-many preload of '{}.{}'",
            owner.name, association.field_name
        ))),
    }
}

/// Build the batched query loading `association` for owners with `keys`.
///
/// Null keys are skipped and duplicates collapsed.
pub fn preload_query(
    dialect: Dialect,
    registry: &Registry,
    owner: &TableDescriptor,
    association: &str,
    keys: impl IntoIterator<Item = Value>,
) -> OrmResult<QueryState> {
    let assoc = owner.find_association(association).ok_or_else(|| {
        OrmError::mapping(format!(
            "'{}' has no association named '{association}'",
            owner.name
        ))
    })?;
    if assoc.kind == AssociationKind::ManyToMany {
        return Err(OrmError::unsupported(format!(
            "many-to-many preload of '{}.{association}'",
            owner.name
        )));
    }
    let target = registry.get(&assoc.target_table)?;

    let column = match assoc.kind {
        AssociationKind::BelongsTo => target.primary_keys().first().map(|k| k.to_string()),
        _ => Some(assoc.foreign_key_column.clone()),
    }
    .filter(|c| !c.is_empty())
    .ok_or_else(|| {
        OrmError::mapping(format!(
            "missing join key for preload of '{}.{association}'",
            owner.name
        ))
    })?;

    let mut unique: Vec<Value> = Vec::new();
    for key in keys {
        if !key.is_null() && !unique.contains(&key) {
            unique.push(key);
        }
    }

    Ok(QueryState::for_model(dialect, target).in_list(&column, unique))
}

/// [`preload_query`] with the request's extra filter applied.
pub fn preload_request_query(
    dialect: Dialect,
    registry: &Registry,
    owner: &TableDescriptor,
    request: &PreloadRequest,
    keys: impl IntoIterator<Item = Value>,
) -> OrmResult<QueryState> {
    let query = preload_query(dialect, registry, owner, &request.association, keys)?;
    Ok(match &request.condition {
        Some(condition) => query.where_condition(condition.clone()),
        None => query,
    })
}
