use super::EntityNode;
use indexmap::IndexMap;

/// Pinned entities, keyed by plain label, kept in pin order
#[derive(Debug, Default)]
pub struct PinRegistry {
    pinned: IndexMap<String, EntityNode>,
}

impl PinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the registry changed
    pub fn pin(&mut self, entity: &EntityNode) -> bool {
        if entity.label().is_empty() || !entity.kind().is_entity() {
            return false;
        }
        if self.pinned.contains_key(entity.key()) {
            return false;
        }

        tracing::debug!("Pinned {}", entity.key());
        self.pinned
            .insert(entity.key().to_string(), EntityNode::pinned(entity));
        true
    }

    /// Returns `true` when the registry changed
    pub fn unpin(&mut self, entity: &EntityNode) -> bool {
        let removed = self.pinned.shift_remove(entity.key()).is_some();
        if removed {
            tracing::debug!("Unpinned {}", entity.key());
        }
        removed
    }

    pub fn values(&self) -> impl Iterator<Item = &EntityNode> {
        self.pinned.values()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }

    pub fn clear(&mut self) {
        self.pinned.clear();
    }
}
