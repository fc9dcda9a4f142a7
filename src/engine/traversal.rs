use uuid::Uuid;
use crate::model::{EntityRef, Link};

#[derive(Debug, Clone)]
struct Frame {
    type_name: String,
    id: Uuid,
    instance: EntityRef,
}

/// Instances currently being materialized within one read.
///
/// A lookup that hits a frame reuses its instance, which is how cycles in
/// the stored graph close without infinite recursion. The stack is scoped
/// to a single top-level read; two separate reads never share instances.
#[derive(Debug, Default)]
pub struct TraversalStack {
    frames: Vec<Frame>,
}

impl TraversalStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, type_name: impl Into<String>, id: Uuid, instance: EntityRef) {
        self.frames.push(Frame {
            type_name: type_name.into(),
            id,
            instance,
        });
    }

    pub fn pop(&mut self) -> Option<EntityRef> {
        self.frames.pop().map(|frame| frame.instance)
    }

    /// A back link to the in-progress instance for `(type_name, id)`.
    ///
    /// The link does not own the instance; the frame's own caller does.
    pub fn find(&self, type_name: &str, id: Uuid) -> Option<Link> {
        self.frames
            .iter()
            .find(|frame| frame.id == id && frame.type_name == type_name)
            .map(|frame| Link::back(&frame.type_name, frame.id, &frame.instance))
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Entity;

    #[test]
    fn test_find_matches_type_and_id() {
        let id = Uuid::new_v4();
        let node = Entity::new("Node").with_id(id).into_ref();
        let mut stack = TraversalStack::new();
        stack.push("Node", id, node.clone());

        let found = stack.find("Node", id).unwrap();
        assert!(found.is_back());
        assert!(found.get().unwrap().ptr_eq(&node));
        assert!(stack.find("Other", id).is_none());
        assert!(stack.find("Node", Uuid::new_v4()).is_none());
        assert_eq!(stack.depth(), 1);

        assert!(stack.pop().is_some());
        assert_eq!(stack.depth(), 0);
        assert!(stack.pop().is_none());
    }
}
