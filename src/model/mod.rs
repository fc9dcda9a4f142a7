pub mod accessor;
pub mod descriptor;
pub mod entity;
pub mod loader;
pub mod macros;
pub mod registry;

pub use accessor::{FieldAccessor, Getter, Method, Setter, Shape};
pub use descriptor::{
    EntityTypeDescriptor, FieldDef, FieldDescriptor, FieldKind, FieldType, TypeDef,
};
pub use entity::{BackRef, Entity, EntityRef, FieldValue, Link};
pub use registry::{Registry, is_identifier};
