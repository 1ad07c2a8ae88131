//! The periodic heal pass.

use serde::Serialize;

use crate::engine::RecoveryEngine;
use crate::policy::{TICKS_PER_SECOND, UNIT_MAX};
use crate::world::{EntityId, EntityWorld};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthChange {
    pub entity: EntityId,
    pub health: u32,
}

/// What a single heal pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Creatures that gained a unit, with their new health.
    pub healed: Vec<HealthChange>,
    /// Creatures that reached the target and were released.
    pub recovered: Vec<EntityId>,
    /// Creatures still cooling down after combat.
    pub waiting: Vec<EntityId>,
    /// Creatures the host vetoed healing for this pass.
    pub vetoed: Vec<EntityId>,
    /// Tracked creatures that are gone or dead.
    pub dropped: Vec<EntityId>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.healed.is_empty()
            && self.recovered.is_empty()
            && self.waiting.is_empty()
            && self.vetoed.is_empty()
            && self.dropped.is_empty()
    }
}

impl RecoveryEngine {
    /// Advances every tracked creature by one interval: counts down
    /// cooldowns, heals one unit, and releases creatures at the target.
    /// Stops the heal task once nothing is left to heal.
    pub fn heal_tick<W: EntityWorld + ?Sized>(&mut self, world: &mut W) -> TickReport {
        let mut report = TickReport::default();
        let Self { scheduler, session } = self;
        let Some(session) = session.as_mut() else {
            scheduler.ensure_stopped();
            return report;
        };
        let config = session.config;
        let registry = &mut session.registry;

        for entity in registry.members() {
            let Some(health) = world.health(entity).filter(|_| world.is_alive(entity)) else {
                registry.remove(entity);
                report.dropped.push(entity);
                continue;
            };

            if let Some(remaining) = registry.delay(entity) {
                if remaining > config.interval_ticks {
                    let remaining = remaining - config.interval_ticks;
                    registry.set_delay(entity, remaining);
                    report.waiting.push(entity);
                    let remaining_secs = remaining as f64 / TICKS_PER_SECOND as f64;
                    diagnostic!(
                        config,
                        target: "recovery.heal",
                        entity = %entity,
                        remaining_secs,
                        "cooldown decreased"
                    );
                    continue;
                }
                registry.clear_delay(entity);
            }

            if health >= config.max_health {
                registry.remove(entity);
                report.recovered.push(entity);
                continue;
            }

            if !world.allow_regain(entity, 1) {
                report.vetoed.push(entity);
                continue;
            }

            let health = (health + 1).min(UNIT_MAX).min(config.max_health);
            world.set_health(entity, health);
            report.healed.push(HealthChange { entity, health });
            diagnostic!(
                config,
                target: "recovery.heal",
                entity = %entity,
                health,
                max = config.max_health,
                "healed"
            );

            if health >= config.max_health {
                registry.remove(entity);
                report.recovered.push(entity);
                diagnostic!(config, target: "recovery.heal", entity = %entity, "recovered");
            }
        }

        if registry.is_empty() {
            scheduler.ensure_stopped();
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SharedClock;
    use crate::config::RecoveryConfig;
    use crate::permissions::Capability;
    use crate::world::{Creature, MemoryWorld, OwnerId};

    const OWNER: OwnerId = OwnerId(1);

    fn setup(config: RecoveryConfig) -> (RecoveryEngine, MemoryWorld, SharedClock) {
        let mut world = MemoryWorld::new();
        world.add_owner(OWNER, true, &[Capability::Heal]);
        let clock = SharedClock::new();
        let mut engine = RecoveryEngine::new(clock.clone());
        engine.enable(config, &mut world);
        (engine, world, clock)
    }

    #[test]
    fn heals_one_unit_per_pass_until_target() {
        let (mut engine, mut world, clock) = setup(RecoveryConfig::new(1, 20, 60, 0));
        let wolf = world.spawn(Creature::tamed(15, OWNER));
        engine.dispatch(&mut world, wolf);

        let mut trace = Vec::new();
        for _ in 0..5 {
            engine.heal_tick(&mut world);
            trace.push(world.health(wolf).unwrap());
        }
        assert_eq!(trace, vec![16, 17, 18, 19, 20]);
        assert!(engine.registry().unwrap().is_empty());
        assert!(!engine.scheduler().is_running());
        assert_eq!(clock.active_tasks(), 0);
    }

    #[test]
    fn never_exceeds_configured_maximum() {
        let (mut engine, mut world, _) = setup(RecoveryConfig::new(1, 12, 60, 0));
        let wolf = world.spawn(Creature::tamed(11, OWNER));
        engine.dispatch(&mut world, wolf);
        let report = engine.heal_tick(&mut world);
        assert_eq!(world.health(wolf), Some(12));
        assert_eq!(report.recovered, vec![wolf]);
        assert!(!engine.registry().unwrap().contains(wolf));
    }

    #[test]
    fn creature_healed_elsewhere_is_released_untouched() {
        let (mut engine, mut world, _) = setup(RecoveryConfig::new(1, 12, 60, 0));
        let wolf = world.spawn(Creature::tamed(6, OWNER));
        engine.dispatch(&mut world, wolf);
        world.set_health(wolf, 18);

        let report = engine.heal_tick(&mut world);
        assert_eq!(world.health(wolf), Some(18));
        assert!(report.healed.is_empty());
        assert_eq!(report.recovered, vec![wolf]);
    }

    #[test]
    fn cooldown_counts_down_by_interval() {
        let (mut engine, mut world, _) = setup(RecoveryConfig::new(1, 20, 60, 40));
        let wolf = world.spawn(Creature::tamed(10, OWNER));
        engine.dispatch(&mut world, wolf);
        engine.reset_delay(&world, wolf);

        let report = engine.heal_tick(&mut world);
        assert_eq!(report.waiting, vec![wolf]);
        assert_eq!(engine.registry().unwrap().delay(wolf), Some(37));

        for _ in 1..13 {
            engine.heal_tick(&mut world);
        }
        assert_eq!(engine.registry().unwrap().delay(wolf), Some(1));
        assert_eq!(world.health(wolf), Some(10));

        let report = engine.heal_tick(&mut world);
        assert_eq!(report.healed, vec![HealthChange { entity: wolf, health: 11 }]);
        assert_eq!(engine.registry().unwrap().delay(wolf), None);
    }

    #[test]
    fn dead_and_vanished_creatures_are_dropped() {
        let (mut engine, mut world, _) = setup(RecoveryConfig::new(1, 20, 60, 0));
        let dead = world.spawn(Creature::tamed(10, OWNER));
        let gone = world.spawn(Creature::tamed(10, OWNER));
        engine.dispatch(&mut world, dead);
        engine.dispatch(&mut world, gone);
        world.kill(dead);
        world.despawn(gone);

        let report = engine.heal_tick(&mut world);
        assert_eq!(report.dropped, vec![dead, gone]);
        assert_eq!(world.health(dead), Some(0));
        assert!(!engine.scheduler().is_running());
    }

    #[test]
    fn vetoed_regain_keeps_creature_tracked() {
        let (mut engine, mut world, _) = setup(RecoveryConfig::new(1, 20, 60, 0));
        let wolf = world.spawn(Creature::tamed(10, OWNER));
        engine.dispatch(&mut world, wolf);
        world.veto_regain(wolf, true);

        let report = engine.heal_tick(&mut world);
        assert_eq!(report.vetoed, vec![wolf]);
        assert_eq!(world.health(wolf), Some(10));
        assert!(engine.registry().unwrap().contains(wolf));

        world.veto_regain(wolf, false);
        engine.heal_tick(&mut world);
        assert_eq!(world.health(wolf), Some(11));
    }

    #[test]
    fn empty_registry_is_a_no_op() {
        let (mut engine, mut world, _) = setup(RecoveryConfig::new(1, 20, 60, 0));
        assert!(engine.heal_tick(&mut world).is_empty());
    }
}
