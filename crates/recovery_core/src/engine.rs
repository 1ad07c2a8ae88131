//! Unsynchronized recovery engine: one enable cycle's configuration and
//! registry, plus the controller of the periodic heal task.
//!
//! Dispatch decisions live in `dispatch.rs`, the heal pass in `healer.rs`.
//! Concurrent hosts go through [`crate::RecoveryService`] instead.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RecoveryConfig;
use crate::healer::TickReport;
use crate::registry::RecoveryRegistry;
use crate::scheduler::{SchedulerController, TaskHandle, TickScheduler};
use crate::world::EntityWorld;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMode {
    /// Creatures heal one unit per interval.
    Timed,
    /// The heal task could not be scheduled; creatures are topped up on
    /// dispatch instead.
    Instant,
}

#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) config: RecoveryConfig,
    pub(crate) registry: RecoveryRegistry,
    pub(crate) mode: RecoveryMode,
}

pub struct RecoveryEngine {
    pub(crate) scheduler: SchedulerController,
    pub(crate) session: Option<Session>,
}

impl RecoveryEngine {
    pub fn new(scheduler: impl TickScheduler + 'static) -> Self {
        Self {
            scheduler: SchedulerController::new(scheduler),
            session: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.session.is_some()
    }

    pub fn config(&self) -> Option<&RecoveryConfig> {
        self.session.as_ref().map(|s| &s.config)
    }

    pub fn registry(&self) -> Option<&RecoveryRegistry> {
        self.session.as_ref().map(|s| &s.registry)
    }

    pub fn mode(&self) -> Option<RecoveryMode> {
        self.session.as_ref().map(|s| s.mode)
    }

    pub fn scheduler(&self) -> &SchedulerController {
        &self.scheduler
    }

    /// Starts a fresh enable cycle and picks up every wounded creature that
    /// is already in the world.
    pub fn enable<W: EntityWorld + ?Sized>(&mut self, config: RecoveryConfig, world: &mut W) {
        if self.session.is_some() {
            self.disable();
        }
        self.session = Some(Session {
            config,
            registry: RecoveryRegistry::new(),
            mode: RecoveryMode::Timed,
        });
        info!(
            target: "recovery",
            min_health = config.min_health,
            max_health = config.max_health,
            interval = config.interval_ticks,
            delay = config.delay_ticks,
            "recovery enabled"
        );
        self.dispatch_all(world);
    }

    /// Stops the heal task and drops all tracking state.
    pub fn disable(&mut self) {
        self.scheduler.ensure_stopped();
        if let Some(session) = self.session.take() {
            info!(target: "recovery", tracked = session.registry.len(), "recovery disabled");
        }
    }

    /// Swaps in a new configuration, moves a running heal task to the new
    /// interval and re-evaluates every creature. A previous fallback to
    /// instant recovery is lifted so timed healing is tried again.
    pub fn reload<W: EntityWorld + ?Sized>(&mut self, config: RecoveryConfig, world: &mut W) {
        let Some(session) = self.session.as_mut() else {
            self.enable(config, world);
            return;
        };

        session.config = config;
        session.mode = RecoveryMode::Timed;
        info!(target: "recovery", interval = config.interval_ticks, "configuration reloaded");

        if let Err(err) = self.scheduler.reschedule(config.interval_ticks) {
            warn!(target: "recovery.scheduler", error = %err, "could not move heal task to the new interval");
            crate::dispatch::fall_back_to_instant(session, world);
        }
        self.dispatch_all(world);
    }

    /// Runs a heal pass if `handle` is the task this engine scheduled.
    /// Stale handles from a cancelled task are ignored.
    pub fn on_task_fired<W: EntityWorld + ?Sized>(
        &mut self,
        handle: TaskHandle,
        world: &mut W,
    ) -> Option<TickReport> {
        if self.scheduler.handle() != Some(handle) {
            return None;
        }
        Some(self.heal_tick(world))
    }
}
