//! Lets the recovery engine read and write creatures stored in a bevy
//! `World`.

use bevy::prelude::*;
use recovery_core::{Capability, EntityId, EntityWorld, OwnerId, UNIT_MAX};

use crate::gameplay::{Dead, Health, NoRegen, Owners, Tameable, Tamed};

pub fn entity_id(entity: Entity) -> EntityId {
    EntityId(entity.to_bits())
}

pub fn to_entity(id: EntityId) -> Option<Entity> {
    Entity::try_from_bits(id.0).ok()
}

pub struct EcsWorld<'w> {
    world: &'w mut World,
}

impl<'w> EcsWorld<'w> {
    pub fn new(world: &'w mut World) -> Self {
        Self { world }
    }

    fn get<C: Component>(&self, id: EntityId) -> Option<&C> {
        to_entity(id).and_then(|entity| self.world.get::<C>(entity))
    }

    fn has<C: Component>(&self, id: EntityId) -> bool {
        self.get::<C>(id).is_some()
    }

    pub fn tame(&mut self, entity: Entity, owner: OwnerId) {
        if self.world.get::<Tameable>(entity).is_some() {
            self.world.entity_mut(entity).insert(Tamed { owner });
        }
    }

    /// Subtracts damage and marks the creature dead at zero health. Returns
    /// whether this damage killed it.
    pub fn apply_damage(&mut self, entity: Entity, amount: u32) -> bool {
        let killed = {
            let Some(mut health) = self.world.get_mut::<Health>(entity) else {
                return false;
            };
            let was_alive = health.0 > 0;
            health.0 = health.0.saturating_sub(amount);
            was_alive && health.0 == 0
        };
        if killed {
            self.world.entity_mut(entity).insert(Dead);
        }
        killed
    }

    pub fn mark_dead(&mut self, entity: Entity) {
        match self.world.get_mut::<Health>(entity) {
            Some(mut health) => health.0 = 0,
            None => return,
        }
        self.world.entity_mut(entity).insert(Dead);
    }
}

impl EntityWorld for EcsWorld<'_> {
    fn health(&self, entity: EntityId) -> Option<u32> {
        self.get::<Health>(entity).map(|h| h.0)
    }

    fn set_health(&mut self, entity: EntityId, health: u32) {
        let Some(entity) = to_entity(entity) else {
            return;
        };
        if let Some(mut current) = self.world.get_mut::<Health>(entity) {
            current.0 = health.min(UNIT_MAX);
        }
    }

    fn is_tamed(&self, entity: EntityId) -> bool {
        self.has::<Tamed>(entity)
    }

    fn is_alive(&self, entity: EntityId) -> bool {
        !self.has::<Dead>(entity) && self.health(entity).is_some_and(|h| h > 0)
    }

    fn owner(&self, entity: EntityId) -> Option<OwnerId> {
        self.get::<Tamed>(entity).map(|t| t.owner)
    }

    fn is_online(&self, owner: OwnerId) -> bool {
        self.world
            .get_resource::<Owners>()
            .and_then(|owners| owners.get(owner))
            .is_some_and(|record| record.online)
    }

    fn has_permission(&self, owner: OwnerId, capability: Capability) -> bool {
        self.world
            .get_resource::<Owners>()
            .and_then(|owners| owners.get(owner))
            .is_some_and(|record| record.capabilities.contains(&capability))
    }

    fn entities(&mut self) -> Vec<EntityId> {
        let mut query = self
            .world
            .query_filtered::<(Entity, &Health), (With<Tameable>, Without<Dead>)>();
        query
            .iter(self.world)
            .filter(|(_, health)| health.0 > 0)
            .map(|(entity, _)| entity_id(entity))
            .collect()
    }

    fn allow_regain(&mut self, entity: EntityId, _amount: u32) -> bool {
        !self.has::<NoRegen>(entity)
    }
}
