use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::RecoveryConfig;
use crate::dispatch::{Disposition, EntityEvent};
use crate::engine::{RecoveryEngine, RecoveryMode};
use crate::healer::TickReport;
use crate::scheduler::{TaskHandle, TickScheduler};
use crate::world::{EntityId, EntityWorld};

/// Thread-safe entry point for hosts.
///
/// Every operation, including the heal pass and reloads, runs inside one
/// critical section, so event callbacks delivered on another thread can never
/// interleave with a heal pass.
pub struct RecoveryService {
    engine: Mutex<RecoveryEngine>,
}

impl RecoveryService {
    pub fn new(scheduler: impl TickScheduler + 'static) -> Self {
        Self {
            engine: Mutex::new(RecoveryEngine::new(scheduler)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecoveryEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enable<W: EntityWorld + ?Sized>(&self, config: RecoveryConfig, world: &mut W) {
        self.lock().enable(config, world);
    }

    pub fn disable(&self) {
        self.lock().disable();
    }

    pub fn reload<W: EntityWorld + ?Sized>(&self, config: RecoveryConfig, world: &mut W) {
        self.lock().reload(config, world);
    }

    pub fn dispatch<W: EntityWorld + ?Sized>(&self, world: &mut W, entity: EntityId) -> Disposition {
        self.lock().dispatch(world, entity)
    }

    pub fn dispatch_observed<W: EntityWorld + ?Sized>(
        &self,
        world: &mut W,
        entity: EntityId,
        observed: i64,
    ) -> Disposition {
        self.lock().dispatch_observed(world, entity, observed)
    }

    pub fn dispatch_damaged<W: EntityWorld + ?Sized>(
        &self,
        world: &mut W,
        entity: EntityId,
        amount: u32,
    ) -> Disposition {
        self.lock().dispatch_damaged(world, entity, amount)
    }

    pub fn dispatch_all<W: EntityWorld + ?Sized>(&self, world: &mut W) {
        self.lock().dispatch_all(world);
    }

    pub fn reset_delay<W: EntityWorld + ?Sized>(&self, world: &W, entity: EntityId) -> bool {
        self.lock().reset_delay(world, entity)
    }

    pub fn handle<W: EntityWorld + ?Sized>(&self, world: &mut W, event: EntityEvent) {
        self.lock().handle(world, event);
    }

    pub fn heal_tick<W: EntityWorld + ?Sized>(&self, world: &mut W) -> TickReport {
        self.lock().heal_tick(world)
    }

    pub fn on_task_fired<W: EntityWorld + ?Sized>(
        &self,
        handle: TaskHandle,
        world: &mut W,
    ) -> Option<TickReport> {
        self.lock().on_task_fired(handle, world)
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().is_enabled()
    }

    pub fn config(&self) -> Option<RecoveryConfig> {
        self.lock().config().copied()
    }

    pub fn mode(&self) -> Option<RecoveryMode> {
        self.lock().mode()
    }

    pub fn is_scheduled(&self) -> bool {
        self.lock().scheduler().is_running()
    }

    pub fn tracked(&self) -> Vec<EntityId> {
        self.lock()
            .registry()
            .map(|r| r.members())
            .unwrap_or_default()
    }

    pub fn delay(&self, entity: EntityId) -> Option<u64> {
        self.lock().registry().and_then(|r| r.delay(entity))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread;

    use super::*;
    use crate::clock::SharedClock;
    use crate::permissions::Capability;
    use crate::world::{Creature, MemoryWorld, OwnerId};

    #[test]
    fn service_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RecoveryService>();
    }

    #[test]
    fn concurrent_dispatch_and_ticks_keep_registry_consistent() {
        let mut world = MemoryWorld::new();
        world.add_owner(OwnerId(1), true, &[Capability::Heal]);
        let wolves: Vec<EntityId> = (0..16)
            .map(|i| world.spawn(Creature::tamed(2 + (i % 10), OwnerId(1))))
            .collect();
        let world = Arc::new(Mutex::new(world));

        let clock = SharedClock::new();
        let service = Arc::new(RecoveryService::new(clock.clone()));
        service.enable(RecoveryConfig::new(1, 20, 20, 0), &mut *world.lock().unwrap());

        let dispatcher = {
            let service = Arc::clone(&service);
            let world = Arc::clone(&world);
            let wolves = wolves.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    for &wolf in &wolves {
                        service.handle(
                            &mut *world.lock().unwrap(),
                            EntityEvent::Damaged { entity: wolf, amount: 0 },
                        );
                    }
                }
            })
        };

        for _ in 0..400 {
            for handle in clock.advance() {
                service.on_task_fired(handle, &mut *world.lock().unwrap());
            }
        }
        dispatcher.join().unwrap();

        for _ in 0..40 {
            service.heal_tick(&mut *world.lock().unwrap());
        }

        let world = world.lock().unwrap();
        for wolf in wolves {
            assert_eq!(world.health(wolf), Some(20));
        }
        assert!(service.tracked().is_empty());
        assert!(!service.is_scheduled());
        assert_eq!(clock.active_tasks(), 0);
    }
}
