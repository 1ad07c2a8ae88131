//! Headless simulation: replays a scripted timeline against a
//! [`MemoryWorld`] and records every health change.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::SharedClock;
use crate::config::{ConfigWarning, RecoveryConfig, RecoverySettings};
use crate::dispatch::EntityEvent;
use crate::engine::RecoveryMode;
use crate::error::{RecoveryError, RecoveryResult};
use crate::healer::TickReport;
use crate::permissions::Capability;
use crate::service::RecoveryService;
use crate::world::{Creature, EntityId, MemoryWorld, OwnerId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    /// Game ticks to simulate.
    pub ticks: u64,
    #[serde(default)]
    pub settings: RecoverySettings,
    /// Limits concurrent heal tasks; `0` makes scheduling fail outright.
    #[serde(default)]
    pub scheduler_capacity: Option<usize>,
    #[serde(default)]
    pub owners: Vec<OwnerSpec>,
    #[serde(default)]
    pub creatures: Vec<CreatureSpec>,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerSpec {
    pub id: u64,
    #[serde(default = "online_by_default")]
    pub online: bool,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

fn online_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatureSpec {
    pub id: u64,
    pub health: u32,
    #[serde(default)]
    pub owner: Option<u64>,
}

impl CreatureSpec {
    fn creature(&self) -> Creature {
        match self.owner {
            Some(owner) => Creature::tamed(self.health, OwnerId(owner)),
            None => Creature::wild(self.health),
        }
    }
}

/// Something that happens right before the clock advances on `tick`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub tick: u64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    Spawn(CreatureSpec),
    Tame { entity: u64, owner: u64 },
    Damage { entity: u64, amount: u32 },
    Kill { entity: u64 },
    Join { owner: u64 },
    Leave { owner: u64 },
    Grant { owner: u64, capability: Capability },
    Revoke { owner: u64, capability: Capability },
    Reload { settings: RecoverySettings },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub tick: u64,
    pub event: TraceEvent,
    pub entity: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEvent {
    Healed,
    Recovered,
    Vetoed,
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatureOutcome {
    pub entity: EntityId,
    pub health: u32,
    pub alive: bool,
    pub tracked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub name: Option<String>,
    pub ticks: u64,
    pub config: RecoveryConfig,
    pub warnings: Vec<ConfigWarning>,
    pub mode: Option<RecoveryMode>,
    pub task_active: bool,
    pub trace: Vec<TraceEntry>,
    pub creatures: Vec<CreatureOutcome>,
}

impl SimulationReport {
    pub fn heals(&self) -> usize {
        self.trace
            .iter()
            .filter(|e| e.event == TraceEvent::Healed)
            .count()
    }

    pub fn recoveries(&self) -> usize {
        self.trace
            .iter()
            .filter(|e| e.event == TraceEvent::Recovered)
            .count()
    }
}

impl Scenario {
    pub fn from_path(path: &Path) -> RecoveryResult<Self> {
        let data = fs::read_to_string(path).map_err(|source| RecoveryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&data)
    }

    pub fn from_toml_str(data: &str) -> RecoveryResult<Self> {
        Ok(toml::from_str(data)?)
    }
}

/// Runs the scenario to completion. The world acts as host: it applies damage
/// after the engine has seen the damage event, reports deaths, and advances
/// the shared clock once per tick.
pub fn run_scenario(scenario: &Scenario) -> SimulationReport {
    let mut world = MemoryWorld::new();
    for owner in &scenario.owners {
        world.add_owner(OwnerId(owner.id), owner.online, &owner.capabilities);
    }
    for spec in &scenario.creatures {
        world.insert(EntityId(spec.id), spec.creature());
    }

    let clock = match scenario.scheduler_capacity {
        Some(capacity) => SharedClock::with_capacity(capacity),
        None => SharedClock::new(),
    };
    let service = RecoveryService::new(clock.clone());
    let resolved = scenario.settings.resolve();
    let mut warnings = resolved.warnings;
    service.enable(resolved.config, &mut world);

    let mut trace = Vec::new();
    for tick in 1..=scenario.ticks {
        for entry in scenario.timeline.iter().filter(|e| e.tick == tick) {
            if let Some(mut extra) = apply(&service, &mut world, &entry.action) {
                warnings.append(&mut extra);
            }
        }
        for handle in clock.advance() {
            if let Some(report) = service.on_task_fired(handle, &mut world) {
                record(&mut trace, tick, &report);
            }
        }
    }

    let tracked = service.tracked();
    let creatures = world
        .creatures()
        .map(|(entity, creature)| CreatureOutcome {
            entity,
            health: creature.health,
            alive: creature.alive,
            tracked: tracked.contains(&entity),
        })
        .collect();

    let report = SimulationReport {
        name: scenario.name.clone(),
        ticks: scenario.ticks,
        config: service.config().unwrap_or(resolved.config),
        warnings,
        mode: service.mode(),
        task_active: clock.active_tasks() > 0,
        trace,
        creatures,
    };
    service.disable();
    info!(
        target: "recovery.scenario",
        heals = report.heals(),
        recoveries = report.recoveries(),
        "scenario finished"
    );
    report
}

fn apply(
    service: &RecoveryService,
    world: &mut MemoryWorld,
    action: &Action,
) -> Option<Vec<ConfigWarning>> {
    match action {
        Action::Spawn(spec) => {
            let entity = EntityId(spec.id);
            world.insert(entity, spec.creature());
            service.handle(world, EntityEvent::Spawned(entity));
        }
        Action::Tame { entity, owner } => {
            let entity = EntityId(*entity);
            world.tame(entity, OwnerId(*owner));
            service.handle(world, EntityEvent::Tamed(entity));
        }
        Action::Damage { entity, amount } => {
            let entity = EntityId(*entity);
            service.handle(world, EntityEvent::Damaged { entity, amount: *amount });
            world.damage(entity, *amount);
            let landed = match world.creature(entity) {
                Some(creature) if !creature.alive => EntityEvent::Died(entity),
                _ => EntityEvent::HealthChanged(entity),
            };
            service.handle(world, landed);
        }
        Action::Kill { entity } => {
            let entity = EntityId(*entity);
            world.kill(entity);
            service.handle(world, EntityEvent::Died(entity));
        }
        Action::Join { owner } => {
            world.set_online(OwnerId(*owner), true);
            service.handle(world, EntityEvent::OwnerJoined(OwnerId(*owner)));
        }
        Action::Leave { owner } => {
            world.set_online(OwnerId(*owner), false);
            service.dispatch_all(world);
        }
        Action::Grant { owner, capability } => world.grant(OwnerId(*owner), *capability),
        Action::Revoke { owner, capability } => world.revoke(OwnerId(*owner), *capability),
        Action::Reload { settings } => {
            let resolved = settings.resolve();
            service.reload(resolved.config, world);
            return Some(resolved.warnings);
        }
    }
    None
}

fn record(trace: &mut Vec<TraceEntry>, tick: u64, report: &TickReport) {
    for change in &report.healed {
        trace.push(TraceEntry {
            tick,
            event: TraceEvent::Healed,
            entity: change.entity,
            health: Some(change.health),
        });
    }
    let rest = [
        (TraceEvent::Recovered, &report.recovered),
        (TraceEvent::Vetoed, &report.vetoed),
        (TraceEvent::Dropped, &report.dropped),
    ];
    for (event, entities) in rest {
        for &entity in entities {
            trace.push(TraceEntry {
                tick,
                event,
                entity,
                health: None,
            });
        }
    }
}
