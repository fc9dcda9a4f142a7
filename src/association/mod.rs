//! Associations between entity types.
//!
//! The kind of an association is derived from field shape alone: whether
//! this field holds one or many of the other type, and whether the other
//! type has a field pointing back and how many it holds.
//!
//! | this     | other side          | kind                   |
//! |----------|---------------------|------------------------|
//! | many     | many                | `HasAndBelongsToMany`  |
//! | many     | one or none         | `HasMany`              |
//! | one      | many                | `BelongsTo`            |
//! | one      | one or none         | one-to-one, see below  |
//!
//! For one-to-one, the type whose name sorts first (or equal, for
//! self-references) holds the foreign key and gets `BelongsTo`; the other
//! side gets `HasOne`.

pub mod belongs_to;
pub mod has_and_belongs_to_many;
pub mod has_many;
pub mod has_one;

use tracing::warn;
use uuid::Uuid;
use crate::core::{DbError, Result};
use crate::dao::{ForeignKeyDao, JoinTableDao};
use crate::engine::PersistenceEngine;
use crate::engine::traversal::TraversalStack;
use crate::interface::StorageHandle;
use crate::model::{FieldDef, FieldType, FieldValue, Link, Registry, TypeDef};

pub use belongs_to::BelongsTo;
pub use has_and_belongs_to_many::HasAndBelongsToMany;
pub use has_many::HasMany;
pub use has_one::HasOne;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Association {
    BelongsTo(BelongsTo),
    HasOne(HasOne),
    HasMany(HasMany),
    HasAndBelongsToMany(HasAndBelongsToMany),
}

/// The field on the other type that points back at the owner, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackReference {
    pub field: String,
    pub collection: bool,
}

/// Scan `other`'s persisted fields in declaration order for the first one
/// whose value or element type is `owner`. A self-referencing field never
/// matches itself.
pub fn find_back_reference(owner: &TypeDef, field: &FieldDef, other: &TypeDef) -> Option<BackReference> {
    let self_referential = owner.name == other.name;
    other
        .fields
        .iter()
        .filter(|f| !f.no_persist)
        .filter(|f| !(self_referential && f.name == field.name))
        .find_map(|f| {
            let parsed = FieldType::parse(&f.field_type).ok()?;
            (parsed.base_type() == Some(owner.name.as_str())).then(|| BackReference {
                field: f.name.clone(),
                collection: parsed.is_collection(),
            })
        })
}

impl Association {
    /// Build the association for `field` on `owner`.
    pub fn classify(
        registry: &Registry,
        owner: &TypeDef,
        field: &FieldDef,
        field_type: &FieldType,
    ) -> Result<Self> {
        let (target, this_many) = match field_type {
            FieldType::Single(t) => (t.as_str(), false),
            FieldType::Collection(Some(t)) => (t.as_str(), true),
            FieldType::Collection(None) => {
                return Err(DbError::UnsupportedAssociationShape {
                    entity: owner.name.clone(),
                    field: field.name.clone(),
                    reason: "element type cannot be determined".to_string(),
                });
            }
        };

        let other = registry.type_def(target)?;
        let back_ref = find_back_reference(owner, field, other);
        let reverse_column = || {
            back_ref
                .as_ref()
                .map(|b| b.field.clone())
                .unwrap_or_else(|| format!("{}_{}", owner.name, field.name))
        };

        let association = match (this_many, back_ref.as_ref().map(|b| b.collection)) {
            (true, Some(true)) => {
                let join = if target == owner.name {
                    JoinTableDao::new(
                        format!("{}_{}", owner.name, field.name),
                        format!("{}_1", owner.name),
                        format!("{}_2", owner.name),
                    )
                } else {
                    let (first, second) = if owner.name.as_str() <= target {
                        (owner.name.as_str(), target)
                    } else {
                        (target, owner.name.as_str())
                    };
                    JoinTableDao::new(format!("{}_{}", first, second), &owner.name, target)
                };
                Self::HasAndBelongsToMany(HasAndBelongsToMany::new(&field.name, target, join))
            }
            (true, _) => Self::HasMany(HasMany::new(
                &field.name,
                target,
                ForeignKeyDao::new(target, reverse_column()),
            )),
            (false, Some(true)) => Self::BelongsTo(BelongsTo::new(
                &field.name,
                target,
                ForeignKeyDao::new(&owner.name, &field.name),
            )),
            (false, _) if owner.name.as_str() <= target => Self::BelongsTo(BelongsTo::new(
                &field.name,
                target,
                ForeignKeyDao::new(&owner.name, &field.name),
            )),
            (false, _) => Self::HasOne(HasOne::new(
                &field.name,
                target,
                ForeignKeyDao::new(target, reverse_column()),
            )),
        };

        Ok(association)
    }

    pub fn field(&self) -> &str {
        match self {
            Self::BelongsTo(a) => &a.field,
            Self::HasOne(a) => &a.field,
            Self::HasMany(a) => &a.field,
            Self::HasAndBelongsToMany(a) => &a.field,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            Self::BelongsTo(a) => &a.target,
            Self::HasOne(a) => &a.target,
            Self::HasMany(a) => &a.target,
            Self::HasAndBelongsToMany(a) => &a.target,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::BelongsTo(_) => "BelongsTo",
            Self::HasOne(_) => "HasOne",
            Self::HasMany(_) => "HasMany",
            Self::HasAndBelongsToMany(_) => "HasAndBelongsToMany",
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::HasMany(_) | Self::HasAndBelongsToMany(_))
    }

    /// The column on the owner's own table, for `BelongsTo`.
    pub fn owner_column(&self) -> Option<&str> {
        match self {
            Self::BelongsTo(a) => Some(a.foreign_key.column()),
            _ => None,
        }
    }

    /// Create the storage this association needs: a column or a join table.
    pub fn init(&self, db: &mut dyn StorageHandle) -> Result<()> {
        match self {
            Self::BelongsTo(a) => a.init(db),
            Self::HasOne(a) => a.init(db),
            Self::HasMany(a) => a.init(db),
            Self::HasAndBelongsToMany(a) => a.init(db),
        }
    }

    pub fn load(
        &self,
        engine: &PersistenceEngine,
        db: &mut dyn StorageHandle,
        stack: &mut TraversalStack,
        owner_id: Uuid,
    ) -> Result<FieldValue> {
        match self {
            Self::BelongsTo(a) => a.load(engine, db, stack, owner_id),
            Self::HasOne(a) => a.load(engine, db, stack, owner_id),
            Self::HasMany(a) => a.load(engine, db, stack, owner_id),
            Self::HasAndBelongsToMany(a) => a.load(engine, db, stack, owner_id),
        }
    }

    pub fn save(&self, db: &mut dyn StorageHandle, owner_id: Uuid, value: &FieldValue) -> Result<()> {
        match self {
            Self::BelongsTo(a) => a.save(db, owner_id, value),
            Self::HasOne(a) => a.save(db, owner_id, value),
            Self::HasMany(a) => a.save(db, owner_id, value),
            Self::HasAndBelongsToMany(a) => a.save(db, owner_id, value),
        }
    }
}

/// Ids of the entities referenced by `value`.
///
/// References of the wrong type are rejected; references that were never
/// saved are skipped, since saving does not cascade. A back link counts by
/// the id it was loaded with, even if its target has since been dropped.
pub(crate) fn referenced_ids(field: &str, target: &str, value: &FieldValue) -> Result<Vec<Uuid>> {
    let mut ids = Vec::new();
    for link in value.links() {
        let type_name = link.type_name();
        if type_name != target {
            return Err(DbError::TypeMismatch(format!(
                "Field '{}' holds {} references, got a {}",
                field, target, type_name
            )));
        }
        match link.id() {
            Some(id) => ids.push(id),
            None => warn!(field, target, "skipping reference to an unsaved entity"),
        }
    }
    Ok(ids)
}

/// Resolve each id through the engine, dropping ids with no row.
pub(crate) fn resolve_all(
    engine: &PersistenceEngine,
    db: &mut dyn StorageHandle,
    stack: &mut TraversalStack,
    target: &str,
    ids: Vec<Uuid>,
) -> Result<Vec<Link>> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(link) = engine.resolve(db, stack, target, id)? {
            out.push(link);
        }
    }
    Ok(out)
}
