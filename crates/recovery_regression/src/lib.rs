//! Scenario fixtures for deterministic recovery regression tests.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use recovery_core::config::RecoverSection;
use recovery_core::scenario::{Action, CreatureSpec, OwnerSpec, TimelineEntry};
use recovery_core::{Capability, RecoveryResult, RecoverySettings, Scenario};
use toml::Value;

pub const DEFAULT_SEED: u64 = 42;

/// One wolf at 15 units, 60-tick duration, no cooldown.
pub const SCENARIO_A: &str = r#"
name = "steady recovery"
ticks = 20

[settings.recover]
duration = 3
delay = 0
min-health = 5
max-health = 100

[[owners]]
id = 1
capabilities = ["heal"]

[[creatures]]
id = 1
health = 15
owner = 1
"#;

/// A healthy wolf is hit on tick 1 and waits out a 40-tick cooldown.
pub const SCENARIO_B: &str = r#"
name = "post-combat cooldown"
ticks = 60

[settings.recover]
duration = 3
delay = 2
min-health = 5
max-health = 100

[[owners]]
id = 1
capabilities = ["heal"]

[[creatures]]
id = 1
health = 20
owner = 1

[[timeline]]
tick = 1
action = "damage"
entity = 1
amount = 5
"#;

/// A tracked wolf is killed before the first heal pass.
pub const SCENARIO_C: &str = r#"
name = "death before heal"
ticks = 10

[settings.recover]
duration = 3
delay = 0
min-health = 5
max-health = 100

[[owners]]
id = 1
capabilities = ["heal"]

[[creatures]]
id = 1
health = 15
owner = 1

[[timeline]]
tick = 2
action = "damage"
entity = 1
amount = 30
"#;

pub fn scenario_a() -> RecoveryResult<Scenario> {
    Scenario::from_toml_str(SCENARIO_A)
}

pub fn scenario_b() -> RecoveryResult<Scenario> {
    Scenario::from_toml_str(SCENARIO_B)
}

pub fn scenario_c() -> RecoveryResult<Scenario> {
    Scenario::from_toml_str(SCENARIO_C)
}

/// Builds a random but reproducible scenario: a handful of owners and
/// creatures, random settings, and a timeline mixing every action kind.
pub fn random_scenario(seed: u64) -> Scenario {
    let mut rng = StdRng::seed_from_u64(seed);
    let ticks = rng.gen_range(100..=300);

    let settings = RecoverySettings {
        debug: None,
        recover: RecoverSection {
            duration: Some(Value::Integer(rng.gen_range(1..=10))),
            delay: Some(Value::Integer(rng.gen_range(0..=5))),
            min_health: Some(Value::Integer(rng.gen_range(0..=60))),
            max_health: Some(Value::Integer(rng.gen_range(40..=100))),
            unknown: BTreeMap::new(),
        },
        unknown: BTreeMap::new(),
    };

    let owner_count: u64 = rng.gen_range(1..=3);
    let owners = (1..=owner_count)
        .map(|id| OwnerSpec {
            id,
            online: rng.gen_bool(0.8),
            capabilities: random_capabilities(&mut rng),
        })
        .collect();

    let creature_count: u64 = rng.gen_range(2..=8);
    let creatures: Vec<CreatureSpec> = (1..=creature_count)
        .map(|id| random_creature(&mut rng, id, owner_count))
        .collect();

    let mut next_id = creature_count + 1;
    let mut timeline: Vec<TimelineEntry> = (0..rng.gen_range(5..=30))
        .map(|_| {
            let tick = rng.gen_range(1..=ticks);
            let known = rng.gen_range(1..next_id);
            let owner = rng.gen_range(1..=owner_count);
            let action = match rng.gen_range(0..9) {
                0 => {
                    next_id += 1;
                    Action::Spawn(random_creature(&mut rng, next_id - 1, owner_count))
                }
                1 => Action::Tame {
                    entity: known,
                    owner,
                },
                2 | 3 | 4 => Action::Damage {
                    entity: known,
                    amount: rng.gen_range(1..=12),
                },
                5 => Action::Kill { entity: known },
                6 => Action::Join { owner },
                7 => Action::Leave { owner },
                _ => Action::Grant {
                    owner,
                    capability: Capability::Heal,
                },
            };
            TimelineEntry { tick, action }
        })
        .collect();
    timeline.sort_by_key(|entry| entry.tick);

    Scenario {
        name: Some(format!("random-{seed}")),
        ticks,
        settings,
        scheduler_capacity: None,
        owners,
        creatures,
        timeline,
    }
}

fn random_capabilities(rng: &mut StdRng) -> Vec<Capability> {
    let mut capabilities = Vec::new();
    if rng.gen_bool(0.85) {
        capabilities.push(Capability::Heal);
    }
    if rng.gen_bool(0.3) {
        capabilities.push(Capability::NoDelay);
    }
    capabilities
}

fn random_creature(rng: &mut StdRng, id: u64, owner_count: u64) -> CreatureSpec {
    CreatureSpec {
        id,
        health: rng.gen_range(1..=20),
        owner: rng
            .gen_bool(0.75)
            .then(|| rng.gen_range(1..=owner_count)),
    }
}
