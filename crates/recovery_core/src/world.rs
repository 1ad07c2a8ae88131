//! The host-side view of creatures and their owners.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::permissions::Capability;
use crate::policy::UNIT_MAX;

/// Stable identifier of a tameable creature. The core only ever stores these,
/// never the creature itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub u64);

/// Everything the engine needs to read from or write to the host world.
pub trait EntityWorld {
    /// Current health, or `None` if the host no longer knows the entity.
    fn health(&self, entity: EntityId) -> Option<u32>;

    fn set_health(&mut self, entity: EntityId, health: u32);

    fn is_tamed(&self, entity: EntityId) -> bool;

    fn is_alive(&self, entity: EntityId) -> bool;

    fn owner(&self, entity: EntityId) -> Option<OwnerId>;

    fn is_online(&self, owner: OwnerId) -> bool;

    fn has_permission(&self, owner: OwnerId, capability: Capability) -> bool;

    /// All live creatures the host currently simulates.
    fn entities(&mut self) -> Vec<EntityId>;

    /// Gives the host a chance to cancel a regain before it is applied.
    fn allow_regain(&mut self, _entity: EntityId, _amount: u32) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creature {
    pub health: u32,
    #[serde(default = "alive_by_default")]
    pub alive: bool,
    #[serde(default)]
    pub owner: Option<OwnerId>,
}

fn alive_by_default() -> bool {
    true
}

impl Creature {
    pub fn wild(health: u32) -> Self {
        Self {
            health: health.min(UNIT_MAX),
            alive: health > 0,
            owner: None,
        }
    }

    pub fn tamed(health: u32, owner: OwnerId) -> Self {
        Self {
            owner: Some(owner),
            ..Self::wild(health)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerRecord {
    pub online: bool,
    pub capabilities: HashSet<Capability>,
}

/// A self-contained host used by the scenario runner and by tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryWorld {
    creatures: BTreeMap<EntityId, Creature>,
    owners: BTreeMap<OwnerId, OwnerRecord>,
    vetoed: HashSet<EntityId>,
    next_id: u64,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, creature: Creature) -> EntityId {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        self.creatures.insert(id, creature);
        id
    }

    pub fn insert(&mut self, id: EntityId, creature: Creature) {
        self.next_id = self.next_id.max(id.0);
        self.creatures.insert(id, creature);
    }

    pub fn creature(&self, id: EntityId) -> Option<&Creature> {
        self.creatures.get(&id)
    }

    pub fn creatures(&self) -> impl Iterator<Item = (EntityId, &Creature)> {
        self.creatures.iter().map(|(id, c)| (*id, c))
    }

    pub fn tame(&mut self, id: EntityId, owner: OwnerId) {
        if let Some(creature) = self.creatures.get_mut(&id) {
            creature.owner = Some(owner);
        }
    }

    /// Subtracts `amount`; a creature reaching zero health dies.
    pub fn damage(&mut self, id: EntityId, amount: u32) {
        if let Some(creature) = self.creatures.get_mut(&id) {
            creature.health = creature.health.saturating_sub(amount);
            if creature.health == 0 {
                creature.alive = false;
            }
        }
    }

    pub fn kill(&mut self, id: EntityId) {
        if let Some(creature) = self.creatures.get_mut(&id) {
            creature.health = 0;
            creature.alive = false;
        }
    }

    pub fn despawn(&mut self, id: EntityId) -> Option<Creature> {
        self.creatures.remove(&id)
    }

    pub fn add_owner(&mut self, owner: OwnerId, online: bool, capabilities: &[Capability]) {
        self.owners.insert(
            owner,
            OwnerRecord {
                online,
                capabilities: capabilities.iter().copied().collect(),
            },
        );
    }

    pub fn set_online(&mut self, owner: OwnerId, online: bool) {
        self.owners.entry(owner).or_default().online = online;
    }

    pub fn grant(&mut self, owner: OwnerId, capability: Capability) {
        self.owners.entry(owner).or_default().capabilities.insert(capability);
    }

    pub fn revoke(&mut self, owner: OwnerId, capability: Capability) {
        if let Some(record) = self.owners.get_mut(&owner) {
            record.capabilities.remove(&capability);
        }
    }

    pub fn veto_regain(&mut self, id: EntityId, vetoed: bool) {
        if vetoed {
            self.vetoed.insert(id);
        } else {
            self.vetoed.remove(&id);
        }
    }
}

impl EntityWorld for MemoryWorld {
    fn health(&self, entity: EntityId) -> Option<u32> {
        self.creatures.get(&entity).map(|c| c.health)
    }

    fn set_health(&mut self, entity: EntityId, health: u32) {
        if let Some(creature) = self.creatures.get_mut(&entity) {
            creature.health = health.min(UNIT_MAX);
        }
    }

    fn is_tamed(&self, entity: EntityId) -> bool {
        self.creatures
            .get(&entity)
            .is_some_and(|c| c.owner.is_some())
    }

    fn is_alive(&self, entity: EntityId) -> bool {
        self.creatures.get(&entity).is_some_and(|c| c.alive)
    }

    fn owner(&self, entity: EntityId) -> Option<OwnerId> {
        self.creatures.get(&entity).and_then(|c| c.owner)
    }

    fn is_online(&self, owner: OwnerId) -> bool {
        self.owners.get(&owner).is_some_and(|o| o.online)
    }

    fn has_permission(&self, owner: OwnerId, capability: Capability) -> bool {
        self.owners
            .get(&owner)
            .is_some_and(|o| o.capabilities.contains(&capability))
    }

    fn entities(&mut self) -> Vec<EntityId> {
        self.creatures
            .iter()
            .filter(|(_, c)| c.alive)
            .map(|(id, _)| *id)
            .collect()
    }

    fn allow_regain(&mut self, entity: EntityId, _amount: u32) -> bool {
        !self.vetoed.contains(&entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lethal_damage_kills() {
        let mut world = MemoryWorld::new();
        let id = world.spawn(Creature::tamed(4, OwnerId(1)));
        world.damage(id, 9);
        assert_eq!(world.health(id), Some(0));
        assert!(!world.is_alive(id));
        assert!(world.entities().is_empty());
    }

    #[test]
    fn set_health_caps_at_unit_max() {
        let mut world = MemoryWorld::new();
        let id = world.spawn(Creature::wild(10));
        world.set_health(id, 99);
        assert_eq!(world.health(id), Some(UNIT_MAX));
        assert!(!world.is_tamed(id));
    }

    #[test]
    fn owner_capabilities() {
        let mut world = MemoryWorld::new();
        world.add_owner(OwnerId(3), true, &[Capability::Heal]);
        assert!(world.has_permission(OwnerId(3), Capability::Heal));
        assert!(!world.has_permission(OwnerId(3), Capability::NoDelay));
        world.revoke(OwnerId(3), Capability::Heal);
        assert!(!world.has_permission(OwnerId(3), Capability::Heal));
        assert!(!world.is_online(OwnerId(9)));
    }
}
