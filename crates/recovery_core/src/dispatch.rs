//! Decides whether a creature enters, stays in, or leaves the registry.

use std::collections::HashSet;

use serde::Serialize;
use tracing::warn;

use crate::config::RecoveryConfig;
use crate::engine::{RecoveryEngine, RecoveryMode, Session};
use crate::permissions::{has_capability, Capability};
use crate::world::{EntityId, EntityWorld, OwnerId};

/// Outcome of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// The creature is (still) tracked for timed healing.
    Tracked,
    /// The creature is not eligible and is no longer tracked.
    Released,
    /// The creature was topped up immediately.
    HealedInstantly,
    /// Instant recovery is waiting for the host to apply pending damage and
    /// raise [`EntityEvent::HealthChanged`].
    Deferred,
    /// Recovery is disabled; nothing happened.
    Ignored,
}

/// Host notifications the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityEvent {
    Spawned(EntityId),
    Tamed(EntityId),
    /// Raised before the damage is subtracted from the creature's health.
    /// Hosts follow it with `HealthChanged`, or `Died` if the damage killed.
    Damaged { entity: EntityId, amount: u32 },
    /// Raised after the host has marked the creature dead.
    Died(EntityId),
    /// Raised after the host changed health itself, including once the damage
    /// from a `Damaged` event has been subtracted.
    HealthChanged(EntityId),
    OwnerJoined(OwnerId),
}

impl RecoveryEngine {
    /// Dispatches using the creature's live health.
    pub fn dispatch<W: EntityWorld + ?Sized>(
        &mut self,
        world: &mut W,
        entity: EntityId,
    ) -> Disposition {
        match world.health(entity) {
            Some(health) => self.dispatch_observed(world, entity, i64::from(health)),
            None => self.forget(entity),
        }
    }

    /// Dispatches for a damage event that has not been applied yet.
    pub fn dispatch_damaged<W: EntityWorld + ?Sized>(
        &mut self,
        world: &mut W,
        entity: EntityId,
        amount: u32,
    ) -> Disposition {
        match world.health(entity) {
            Some(health) => {
                let observed = i64::from(health) - i64::from(amount);
                self.route(world, entity, observed, true)
            }
            None => self.forget(entity),
        }
    }

    /// Tracks the creature if it is tamed, alive, permitted and its observed
    /// health lies in `[min_health, max_health)`; releases it otherwise.
    pub fn dispatch_observed<W: EntityWorld + ?Sized>(
        &mut self,
        world: &mut W,
        entity: EntityId,
        observed: i64,
    ) -> Disposition {
        self.route(world, entity, observed, false)
    }

    /// With `damage_pending` the live health is still above `observed`, so an
    /// instant top-up has to wait for the host's `HealthChanged`.
    fn route<W: EntityWorld + ?Sized>(
        &mut self,
        world: &mut W,
        entity: EntityId,
        observed: i64,
        damage_pending: bool,
    ) -> Disposition {
        let Self { scheduler, session } = self;
        let Some(session) = session.as_mut() else {
            return Disposition::Ignored;
        };
        let config = session.config;
        diagnostic!(config, target: "recovery.dispatch", entity = %entity, observed, "dispatching");

        if !is_eligible(&*world, &config, entity, observed) {
            if session.registry.remove(entity) {
                diagnostic!(config, target: "recovery.dispatch", entity = %entity, "no longer recovering");
            }
            return Disposition::Released;
        }

        if session.mode == RecoveryMode::Instant {
            session.registry.remove(entity);
            if damage_pending {
                return Disposition::Deferred;
            }
            heal_to_max(world, &config, entity);
            return Disposition::HealedInstantly;
        }

        if session.registry.add(entity) {
            diagnostic!(config, target: "recovery.dispatch", entity = %entity, "recovering");
        }
        match scheduler.ensure_running(config.interval_ticks) {
            Ok(()) => Disposition::Tracked,
            Err(err) => {
                warn!(
                    target: "recovery.scheduler",
                    error = %err,
                    "heal task could not be scheduled, switching to instant recovery"
                );
                if damage_pending {
                    session.registry.remove(entity);
                }
                fall_back_to_instant(session, world);
                if damage_pending {
                    Disposition::Deferred
                } else {
                    Disposition::HealedInstantly
                }
            }
        }
    }

    /// Drops the creature from tracking without consulting the world.
    pub fn forget(&mut self, entity: EntityId) -> Disposition {
        match self.session.as_mut() {
            Some(session) => {
                session.registry.remove(entity);
                Disposition::Released
            }
            None => Disposition::Ignored,
        }
    }

    /// Restarts the post-combat cooldown of a tracked creature. Returns
    /// whether a cooldown was set.
    pub fn reset_delay<W: EntityWorld + ?Sized>(&mut self, world: &W, entity: EntityId) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let config = session.config;
        if config.delay_ticks == 0
            || has_capability(world, entity, Capability::NoDelay)
            || !session.registry.contains(entity)
        {
            return false;
        }

        session.registry.set_delay(entity, config.delay_ticks);
        diagnostic!(config, target: "recovery.dispatch", entity = %entity, delay = config.delay_ticks, "cooldown reset");
        true
    }

    /// Re-evaluates every live creature and forgets tracked ones the world
    /// no longer reports.
    pub fn dispatch_all<W: EntityWorld + ?Sized>(&mut self, world: &mut W) {
        if self.session.is_none() {
            return;
        }
        let live = world.entities();
        for &entity in &live {
            self.dispatch(world, entity);
        }

        if let Some(session) = self.session.as_mut() {
            let live: HashSet<EntityId> = live.into_iter().collect();
            for entity in session.registry.members() {
                if !live.contains(&entity) {
                    session.registry.remove(entity);
                }
            }
        }
    }

    /// Routes a host notification to the matching operations.
    pub fn handle<W: EntityWorld + ?Sized>(&mut self, world: &mut W, event: EntityEvent) {
        match event {
            EntityEvent::Tamed(entity) => {
                self.dispatch(world, entity);
                self.reset_delay(&*world, entity);
            }
            EntityEvent::Damaged { entity, amount } => {
                self.dispatch_damaged(world, entity, amount);
                self.reset_delay(&*world, entity);
            }
            EntityEvent::Spawned(entity)
            | EntityEvent::Died(entity)
            | EntityEvent::HealthChanged(entity) => {
                self.dispatch(world, entity);
            }
            EntityEvent::OwnerJoined(_) => self.dispatch_all(world),
        }
    }
}

fn is_eligible<W: EntityWorld + ?Sized>(
    world: &W,
    config: &RecoveryConfig,
    entity: EntityId,
    observed: i64,
) -> bool {
    world.is_tamed(entity)
        && world.is_alive(entity)
        && has_capability(world, entity, Capability::Heal)
        && observed < i64::from(config.max_health)
        && observed >= i64::from(config.min_health)
}

fn heal_to_max<W: EntityWorld + ?Sized>(world: &mut W, config: &RecoveryConfig, entity: EntityId) {
    let Some(health) = world.health(entity) else {
        return;
    };
    if health >= config.max_health || !world.allow_regain(entity, config.max_health - health) {
        return;
    }
    world.set_health(entity, config.max_health);
    diagnostic!(config, target: "recovery.heal", entity = %entity, health = config.max_health, "healed instantly");
}

/// Switches the session to instant recovery and tops up everything that was
/// waiting for the heal task.
pub(crate) fn fall_back_to_instant<W: EntityWorld + ?Sized>(session: &mut Session, world: &mut W) {
    session.mode = RecoveryMode::Instant;
    for entity in session.registry.members() {
        heal_to_max(world, &session.config, entity);
    }
    session.registry.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SharedClock;
    use crate::world::{Creature, MemoryWorld};

    const OWNER: OwnerId = OwnerId(1);

    fn setup(config: RecoveryConfig) -> (RecoveryEngine, MemoryWorld, SharedClock) {
        let mut world = MemoryWorld::new();
        world.add_owner(OWNER, true, &[Capability::Heal]);
        let clock = SharedClock::new();
        let mut engine = RecoveryEngine::new(clock.clone());
        engine.enable(config, &mut world);
        (engine, world, clock)
    }

    fn tracked(engine: &RecoveryEngine, entity: EntityId) -> bool {
        engine.registry().is_some_and(|r| r.contains(entity))
    }

    #[test]
    fn health_band_decides_membership() {
        let (mut engine, mut world, _) = setup(RecoveryConfig::new(5, 15, 60, 0));
        for health in 0..=20 {
            let wolf = world.spawn(Creature::tamed(health, OWNER));
            let disposition = engine.dispatch(&mut world, wolf);
            let expected = (5..15).contains(&health);
            assert_eq!(tracked(&engine, wolf), expected, "health {health}");
            assert_eq!(
                disposition == Disposition::Tracked,
                expected,
                "health {health}"
            );
        }
    }

    #[test]
    fn dispatch_is_idempotent() {
        let (mut engine, mut world, clock) = setup(RecoveryConfig::new(1, 20, 60, 0));
        let wolf = world.spawn(Creature::tamed(10, OWNER));
        engine.dispatch(&mut world, wolf);
        let once = engine.registry().unwrap().members();
        engine.dispatch(&mut world, wolf);
        assert_eq!(engine.registry().unwrap().members(), once);
        assert_eq!(clock.active_tasks(), 1);
    }

    #[test]
    fn ineligible_creatures_are_released() {
        let (mut engine, mut world, _) = setup(RecoveryConfig::new(1, 20, 60, 0));
        let wild = world.spawn(Creature::wild(10));
        world.add_owner(OwnerId(2), true, &[]);
        let unpermitted = world.spawn(Creature::tamed(10, OwnerId(2)));
        world.add_owner(OwnerId(3), false, &[Capability::Heal]);
        let offline = world.spawn(Creature::tamed(10, OwnerId(3)));

        for entity in [wild, unpermitted, offline] {
            assert_eq!(engine.dispatch(&mut world, entity), Disposition::Released);
            assert!(!tracked(&engine, entity));
        }
    }

    #[test]
    fn losing_permission_releases_and_clears_delay() {
        let (mut engine, mut world, _) = setup(RecoveryConfig::new(1, 20, 60, 40));
        let wolf = world.spawn(Creature::tamed(10, OWNER));
        engine.dispatch(&mut world, wolf);
        assert!(engine.reset_delay(&world, wolf));

        world.revoke(OWNER, Capability::Heal);
        engine.dispatch(&mut world, wolf);
        assert!(!tracked(&engine, wolf));
        assert_eq!(engine.registry().unwrap().delay(wolf), None);
    }

    #[test]
    fn damage_uses_pending_health() {
        let (mut engine, mut world, _) = setup(RecoveryConfig::new(1, 20, 60, 0));
        let wolf = world.spawn(Creature::tamed(20, OWNER));
        assert_eq!(
            engine.dispatch_damaged(&mut world, wolf, 3),
            Disposition::Tracked
        );

        let doomed = world.spawn(Creature::tamed(2, OWNER));
        assert_eq!(
            engine.dispatch_damaged(&mut world, doomed, 5),
            Disposition::Released
        );
    }

    #[test]
    fn reset_delay_rules() {
        let (mut engine, mut world, _) = setup(RecoveryConfig::new(1, 20, 60, 40));
        let wolf = world.spawn(Creature::tamed(10, OWNER));
        assert!(!engine.reset_delay(&world, wolf), "untracked");

        engine.dispatch(&mut world, wolf);
        assert!(engine.reset_delay(&world, wolf));
        assert_eq!(engine.registry().unwrap().delay(wolf), Some(40));

        world.grant(OWNER, Capability::NoDelay);
        let other = world.spawn(Creature::tamed(10, OWNER));
        engine.dispatch(&mut world, other);
        assert!(!engine.reset_delay(&world, other));
        assert_eq!(engine.registry().unwrap().delay(other), None);
    }

    #[test]
    fn zero_delay_never_sets_cooldown() {
        let (mut engine, mut world, _) = setup(RecoveryConfig::new(1, 20, 60, 0));
        let wolf = world.spawn(Creature::tamed(10, OWNER));
        engine.dispatch(&mut world, wolf);
        assert!(!engine.reset_delay(&world, wolf));
    }

    #[test]
    fn scheduling_failure_falls_back_to_instant() {
        let mut world = MemoryWorld::new();
        world.add_owner(OWNER, true, &[Capability::Heal]);
        let clock = SharedClock::with_capacity(0);
        let mut engine = RecoveryEngine::new(clock.clone());
        engine.enable(RecoveryConfig::new(1, 16, 60, 0), &mut world);

        let wolf = world.spawn(Creature::tamed(4, OWNER));
        assert_eq!(
            engine.dispatch(&mut world, wolf),
            Disposition::HealedInstantly
        );
        assert_eq!(world.health(wolf), Some(16));
        assert_eq!(engine.mode(), Some(RecoveryMode::Instant));
        assert!(engine.registry().unwrap().is_empty());

        let second = world.spawn(Creature::tamed(9, OWNER));
        assert_eq!(
            engine.dispatch(&mut world, second),
            Disposition::HealedInstantly
        );
        assert_eq!(world.health(second), Some(16));
    }

    #[test]
    fn instant_mode_tops_up_once_damage_lands() {
        let mut world = MemoryWorld::new();
        world.add_owner(OWNER, true, &[Capability::Heal]);
        let mut engine = RecoveryEngine::new(SharedClock::with_capacity(0));
        engine.enable(RecoveryConfig::new(1, 20, 60, 0), &mut world);
        let wolf = world.spawn(Creature::tamed(20, OWNER));

        // first hit fails to schedule and switches modes
        assert_eq!(
            engine.dispatch_damaged(&mut world, wolf, 5),
            Disposition::Deferred
        );
        assert_eq!(engine.mode(), Some(RecoveryMode::Instant));
        world.damage(wolf, 5);
        engine.handle(&mut world, EntityEvent::HealthChanged(wolf));
        assert_eq!(world.health(wolf), Some(20));

        // later hits in instant mode
        engine.handle(&mut world, EntityEvent::Damaged { entity: wolf, amount: 7 });
        world.damage(wolf, 7);
        assert_eq!(world.health(wolf), Some(13));
        engine.handle(&mut world, EntityEvent::HealthChanged(wolf));
        assert_eq!(world.health(wolf), Some(20));
        assert!(engine.registry().unwrap().is_empty());
    }

    #[test]
    fn instant_mode_tops_up_on_taming() {
        let mut world = MemoryWorld::new();
        world.add_owner(OWNER, true, &[Capability::Heal]);
        let mut engine = RecoveryEngine::new(SharedClock::with_capacity(0));
        engine.enable(RecoveryConfig::new(1, 20, 60, 0), &mut world);
        let wolf = world.spawn(Creature::wild(8));

        world.tame(wolf, OWNER);
        engine.handle(&mut world, EntityEvent::Tamed(wolf));
        assert_eq!(engine.mode(), Some(RecoveryMode::Instant));
        assert_eq!(world.health(wolf), Some(20));
        assert_eq!(world.creature(wolf).map(|c| c.owner), Some(Some(OWNER)));
    }

    #[test]
    fn fallback_tops_up_already_tracked_creatures() {
        let (mut engine, mut world, clock) = setup(RecoveryConfig::new(1, 20, 60, 0));
        let first = world.spawn(Creature::tamed(5, OWNER));
        engine.dispatch(&mut world, first);

        clock.set_refusing(true);
        engine.reload(RecoveryConfig::new(1, 20, 100, 0), &mut world);
        assert_eq!(engine.mode(), Some(RecoveryMode::Instant));
        assert_eq!(world.health(first), Some(20));
        assert_eq!(clock.active_tasks(), 0);
    }

    #[test]
    fn death_event_releases_creature() {
        let (mut engine, mut world, _) = setup(RecoveryConfig::new(1, 20, 60, 0));
        let wolf = world.spawn(Creature::tamed(10, OWNER));
        engine.handle(&mut world, EntityEvent::Spawned(wolf));
        assert!(tracked(&engine, wolf));

        world.kill(wolf);
        engine.handle(&mut world, EntityEvent::Died(wolf));
        assert!(!tracked(&engine, wolf));
    }

    #[test]
    fn owner_join_rescans() {
        let (mut engine, mut world, _) = setup(RecoveryConfig::new(1, 20, 60, 0));
        world.add_owner(OwnerId(2), false, &[Capability::Heal]);
        let wolf = world.spawn(Creature::tamed(10, OwnerId(2)));
        engine.handle(&mut world, EntityEvent::Spawned(wolf));
        assert!(!tracked(&engine, wolf));

        world.set_online(OwnerId(2), true);
        engine.handle(&mut world, EntityEvent::OwnerJoined(OwnerId(2)));
        assert!(tracked(&engine, wolf));
    }

    #[test]
    fn rescan_forgets_vanished_creatures() {
        let (mut engine, mut world, _) = setup(RecoveryConfig::new(1, 20, 60, 0));
        let wolf = world.spawn(Creature::tamed(10, OWNER));
        engine.dispatch(&mut world, wolf);
        world.despawn(wolf);
        engine.dispatch_all(&mut world);
        assert!(!tracked(&engine, wolf));
    }

    #[test]
    fn disabled_engine_ignores_dispatch() {
        let mut world = MemoryWorld::new();
        world.add_owner(OWNER, true, &[Capability::Heal]);
        let wolf = world.spawn(Creature::tamed(10, OWNER));
        let mut engine = RecoveryEngine::new(SharedClock::new());
        assert_eq!(engine.dispatch(&mut world, wolf), Disposition::Ignored);
        assert!(!engine.reset_delay(&world, wolf));
    }
}
