//! Timed recovery for tamed creatures.
//!
//! Wounded creatures are tracked in a registry, wait out a post-combat
//! cooldown, then regain one health unit per interval until they reach the
//! configured maximum. Hosts feed entity events in, drive a periodic tick, and
//! receive health mutations through [`EntityWorld`].

/// Emits a `debug!` line only when the session's `debug` flag is set.
macro_rules! diagnostic {
    ($config:expr, $($arg:tt)+) => {
        if $config.debug {
            tracing::debug!($($arg)+);
        }
    };
}

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod healer;
pub mod permissions;
pub mod policy;
pub mod registry;
pub mod scenario;
pub mod scheduler;
pub mod service;
pub mod world;

pub use clock::{SharedClock, TickClock};
pub use config::{ConfigWarning, RecoveryConfig, RecoverySettings, ResolvedConfig};
pub use dispatch::{Disposition, EntityEvent};
pub use engine::{RecoveryEngine, RecoveryMode};
pub use error::{RecoveryError, RecoveryResult, ScheduleError};
pub use healer::{HealthChange, TickReport};
pub use permissions::{has_capability, Capability};
pub use policy::{TICKS_PER_SECOND, UNIT_MAX};
pub use registry::RecoveryRegistry;
pub use scenario::{run_scenario, Scenario, SimulationReport};
pub use scheduler::{SchedulerController, SchedulerState, TaskHandle, TickScheduler};
pub use service::RecoveryService;
pub use world::{Creature, EntityId, EntityWorld, MemoryWorld, OwnerId};
