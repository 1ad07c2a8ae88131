//! The set of creatures currently recovering, with their remaining cooldowns.

use std::collections::{BTreeMap, BTreeSet};

use crate::world::EntityId;

/// Tracks which creatures the healer should visit.
///
/// An entity is a member iff it is eligible for timed recovery. A cooldown is
/// only kept for members; removing an entity drops its cooldown too. All
/// operations are idempotent. The registry is not synchronized itself: the
/// owning service serializes every access.
#[derive(Debug, Default, Clone)]
pub struct RecoveryRegistry {
    members: BTreeSet<EntityId>,
    delays: BTreeMap<EntityId, u64>,
}

impl RecoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the entity was not tracked before.
    pub fn add(&mut self, entity: EntityId) -> bool {
        self.members.insert(entity)
    }

    /// Returns `true` if the entity was tracked.
    pub fn remove(&mut self, entity: EntityId) -> bool {
        self.delays.remove(&entity);
        self.members.remove(&entity)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.members.contains(&entity)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Snapshot of the current members. Safe to mutate the registry while
    /// walking it.
    pub fn members(&self) -> Vec<EntityId> {
        self.members.iter().copied().collect()
    }

    /// Sets the remaining cooldown. Ignored for entities that are not tracked.
    pub fn set_delay(&mut self, entity: EntityId, ticks: u64) {
        if self.members.contains(&entity) {
            self.delays.insert(entity, ticks);
        }
    }

    pub fn delay(&self, entity: EntityId) -> Option<u64> {
        self.delays.get(&entity).copied()
    }

    pub fn clear_delay(&mut self, entity: EntityId) {
        self.delays.remove(&entity);
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.delays.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove_are_idempotent() {
        let mut registry = RecoveryRegistry::new();
        assert!(registry.add(EntityId(1)));
        assert!(!registry.add(EntityId(1)));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(EntityId(1)));
        assert!(!registry.remove(EntityId(1)));
        assert!(registry.is_empty());
    }

    #[test]
    fn delay_requires_membership() {
        let mut registry = RecoveryRegistry::new();
        registry.set_delay(EntityId(7), 40);
        assert_eq!(registry.delay(EntityId(7)), None);

        registry.add(EntityId(7));
        registry.set_delay(EntityId(7), 40);
        assert_eq!(registry.delay(EntityId(7)), Some(40));

        registry.clear_delay(EntityId(7));
        assert_eq!(registry.delay(EntityId(7)), None);
        assert!(registry.contains(EntityId(7)));
    }

    #[test]
    fn removal_drops_delay() {
        let mut registry = RecoveryRegistry::new();
        registry.add(EntityId(2));
        registry.set_delay(EntityId(2), 10);
        registry.remove(EntityId(2));
        registry.add(EntityId(2));
        assert_eq!(registry.delay(EntityId(2)), None);
    }

    #[test]
    fn snapshot_survives_removal() {
        let mut registry = RecoveryRegistry::new();
        for id in 1..=4 {
            registry.add(EntityId(id));
        }
        let mut visited = Vec::new();
        for entity in registry.members() {
            visited.push(entity);
            if entity.0 % 2 == 0 {
                registry.remove(entity);
            }
        }
        assert_eq!(visited.len(), 4);
        assert_eq!(registry.members(), vec![EntityId(1), EntityId(3)]);
    }
}
