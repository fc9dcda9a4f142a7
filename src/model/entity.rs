use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};
use uuid::Uuid;
use crate::core::Value;

/// The value held by one field of an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Value),
    One(Option<Link>),
    Many(Vec<Link>),
}

impl FieldValue {
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// The single referenced entity, if set and still alive.
    pub fn as_one(&self) -> Option<EntityRef> {
        match self {
            Self::One(link) => link.as_ref().and_then(Link::get),
            _ => None,
        }
    }

    /// The stored links, including ones whose target has been dropped.
    pub fn links(&self) -> &[Link] {
        match self {
            Self::Scalar(_) => &[],
            Self::One(link) => link.as_slice(),
            Self::Many(links) => links.as_slice(),
        }
    }

    /// Every live entity referenced by this value, in order.
    pub fn references(&self) -> Vec<EntityRef> {
        self.links().iter().filter_map(Link::get).collect()
    }

    pub fn shape_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::One(_) => "reference",
            Self::Many(_) => "collection",
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

impl From<EntityRef> for FieldValue {
    fn from(entity: EntityRef) -> Self {
        Self::One(Some(entity.into()))
    }
}

impl From<Option<EntityRef>> for FieldValue {
    fn from(entity: Option<EntityRef>) -> Self {
        Self::One(entity.map(Link::from))
    }
}

impl From<Vec<EntityRef>> for FieldValue {
    fn from(entities: Vec<EntityRef>) -> Self {
        Self::Many(entities.into_iter().map(Link::from).collect())
    }
}

/// An entity instance: an optional identity plus named field values.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    type_name: String,
    id: Option<Uuid>,
    fields: BTreeMap<String, FieldValue>,
}

impl Entity {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_value(field, value);
        self
    }

    pub fn with_ref(mut self, field: impl Into<String>, entity: &EntityRef) -> Self {
        self.set(field, entity.clone().into());
        self
    }

    pub fn with_refs(mut self, field: impl Into<String>, entities: &[EntityRef]) -> Self {
        self.set(field, entities.to_vec().into());
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id
    }

    pub fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    pub fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }

    pub fn set_value(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.set(field, FieldValue::Scalar(value.into()));
    }

    pub fn set_ref(&mut self, field: impl Into<String>, entity: Option<EntityRef>) {
        self.set(field, entity.into());
    }

    pub fn set_refs(&mut self, field: impl Into<String>, entities: Vec<EntityRef>) {
        self.set(field, entities.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    /// Scalar value of `field`, `None` if unset or not a scalar.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.get(field).and_then(FieldValue::as_scalar)
    }

    pub fn reference(&self, field: &str) -> Option<EntityRef> {
        self.get(field).and_then(FieldValue::as_one)
    }

    pub fn references(&self, field: &str) -> Vec<EntityRef> {
        self.get(field).map(FieldValue::references).unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_ref(self) -> EntityRef {
        EntityRef::new(self)
    }
}

/// Shared handle to an entity.
///
/// Graphs returned by the engine own their entities top-down: a reference
/// that closes a cycle is stored as [`Link::Back`], so dropping the root
/// frees the whole graph. Graphs built by hand out of owned links can still
/// form cycles; [`EntityRef::release`] breaks those.
#[derive(Clone)]
pub struct EntityRef(Rc<RefCell<Entity>>);

impl EntityRef {
    pub fn new(entity: Entity) -> Self {
        Self(Rc::new(RefCell::new(entity)))
    }

    pub fn borrow(&self) -> Ref<'_, Entity> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Entity> {
        self.0.borrow_mut()
    }

    pub fn id(&self) -> Option<Uuid> {
        self.0.borrow().id
    }

    pub fn type_name(&self) -> String {
        self.0.borrow().type_name.clone()
    }

    pub fn downgrade(&self) -> Weak<RefCell<Entity>> {
        Rc::downgrade(&self.0)
    }

    /// Same allocation, not just the same identity.
    pub fn ptr_eq(&self, other: &EntityRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Clear every association field reachable from this entity, breaking
    /// reference cycles so the graph can be freed.
    pub fn release(&self) {
        let mut visited: HashSet<*const RefCell<Entity>> = HashSet::new();
        let mut pending = vec![self.clone()];

        while let Some(current) = pending.pop() {
            if !visited.insert(Rc::as_ptr(&current.0)) {
                continue;
            }

            let mut entity = current.0.borrow_mut();
            for value in entity.fields.values_mut() {
                let links = match value {
                    FieldValue::One(slot) => slot.take().into_iter().collect(),
                    FieldValue::Many(links) => std::mem::take(links),
                    FieldValue::Scalar(_) => Vec::new(),
                };
                pending.extend(links.into_iter().filter_map(|link| match link {
                    Link::Owned(next) => Some(next),
                    Link::Back(_) => None,
                }));
            }
        }
    }
}

/// A reference stored in an entity field.
#[derive(Clone)]
pub enum Link {
    Owned(EntityRef),
    /// Non-owning reference to an entity higher up the same loaded graph.
    Back(BackRef),
}

/// Weak handle that keeps the identity of its target after the target is
/// dropped, so the reference can still be saved.
#[derive(Clone)]
pub struct BackRef {
    type_name: String,
    id: Uuid,
    entity: Weak<RefCell<Entity>>,
}

impl Link {
    pub(crate) fn back(type_name: &str, id: Uuid, entity: &EntityRef) -> Self {
        Self::Back(BackRef {
            type_name: type_name.to_string(),
            id,
            entity: Rc::downgrade(&entity.0),
        })
    }

    /// The referenced entity, `None` for a back link whose target is gone.
    pub fn get(&self) -> Option<EntityRef> {
        match self {
            Self::Owned(entity) => Some(entity.clone()),
            Self::Back(back) => back.entity.upgrade().map(EntityRef),
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            Self::Owned(entity) => entity.id(),
            Self::Back(back) => Some(back.id),
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Self::Owned(entity) => entity.type_name(),
            Self::Back(back) => back.type_name.clone(),
        }
    }

    pub fn is_back(&self) -> bool {
        matches!(self, Self::Back(_))
    }
}

impl From<EntityRef> for Link {
    fn from(entity: EntityRef) -> Self {
        Self::Owned(entity)
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.get(), other.get()) {
            return a == b;
        }
        match (self.id(), other.id()) {
            (Some(x), Some(y)) => x == y && self.type_name() == other.type_name(),
            _ => false,
        }
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owned(entity) => fmt::Debug::fmt(entity, f),
            Self::Back(back) => write!(f, "^{}#{}", back.type_name, back.id),
        }
    }
}

/// References compare by identity: same type and id, or the same instance
/// when unsaved.
impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let (a, b) = (self.0.borrow(), other.0.borrow());
        match (a.id, b.id) {
            (Some(x), Some(y)) => x == y && a.type_name == b.type_name,
            _ => false,
        }
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(entity) => match entity.id {
                Some(id) => write!(f, "{}#{}", entity.type_name, id),
                None => write!(f, "{}#<unsaved>", entity.type_name),
            },
            Err(_) => f.write_str("<borrowed>"),
        }
    }
}
