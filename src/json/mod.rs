//! Conversion between entities and JSON payloads at the API boundary.

pub mod input;
pub mod view;

pub use input::{apply_string_updates, entity_from_json};
pub use view::{entities_to_json, entity_to_json};
