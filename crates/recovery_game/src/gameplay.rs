use std::path::PathBuf;

use bevy::prelude::*;
use bevy::utils::HashMap;
use recovery_core::world::OwnerRecord;
use recovery_core::{Capability, OwnerId, RecoverySettings, TICKS_PER_SECOND};
use tracing::warn;

/// Marks creatures the recovery plugin looks after.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Tameable;

#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Health(pub u32);

#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tamed {
    pub owner: OwnerId,
}

#[derive(Component, Clone, Copy, Debug)]
pub struct Dead;

/// Creatures carrying this never regain health from the plugin.
#[derive(Component, Clone, Copy, Debug)]
pub struct NoRegen;

#[derive(Event, Clone, Copy, Debug)]
pub struct CreatureSpawned(pub Entity);

#[derive(Event, Clone, Copy, Debug)]
pub struct CreatureTamed {
    pub entity: Entity,
    pub owner: OwnerId,
}

/// Damage about to be applied. The plugin subtracts it after the recovery
/// engine has seen it.
#[derive(Event, Clone, Copy, Debug)]
pub struct CreatureDamaged {
    pub entity: Entity,
    pub amount: u32,
}

#[derive(Event, Clone, Copy, Debug)]
pub struct CreatureDied(pub Entity);

#[derive(Event, Clone, Copy, Debug)]
pub struct OwnerJoined(pub OwnerId);

/// Sent when a creature has been healed back to the configured maximum.
#[derive(Event, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreatureRecovered(pub Entity);

#[derive(Event, Clone, Debug)]
pub struct ReloadRecovery(pub RecoverySettings);

/// Owners known to the game, with their online state and granted
/// capabilities.
#[derive(Resource, Default, Debug)]
pub struct Owners {
    records: HashMap<OwnerId, OwnerRecord>,
}

impl Owners {
    pub fn insert(&mut self, owner: OwnerId, online: bool, capabilities: &[Capability]) {
        self.records.insert(
            owner,
            OwnerRecord {
                online,
                capabilities: capabilities.iter().copied().collect(),
            },
        );
    }

    pub fn set_online(&mut self, owner: OwnerId, online: bool) {
        self.records.entry(owner).or_default().online = online;
    }

    pub fn grant(&mut self, owner: OwnerId, capability: Capability) {
        self.records
            .entry(owner)
            .or_default()
            .capabilities
            .insert(capability);
    }

    pub fn revoke(&mut self, owner: OwnerId, capability: Capability) {
        if let Some(record) = self.records.get_mut(&owner) {
            record.capabilities.remove(&capability);
        }
    }

    pub fn get(&self, owner: OwnerId) -> Option<&OwnerRecord> {
        self.records.get(&owner)
    }
}

#[derive(Resource, Clone, Debug)]
pub struct RecoveryParams {
    pub settings_path: Option<PathBuf>,
    pub settings: RecoverySettings,
    /// Fixed timestep the plugin sets at startup. `None` keeps whatever the
    /// host configured; recovery durations then scale with that rate.
    pub fixed_hz: Option<f64>,
}

impl Default for RecoveryParams {
    fn default() -> Self {
        Self {
            settings_path: None,
            settings: RecoverySettings::default(),
            fixed_hz: Some(TICKS_PER_SECOND as f64),
        }
    }
}

impl RecoveryParams {
    /// Reads settings from the file named by `RECOVERY_CONFIG`, creating it
    /// with defaults when missing. Falls back to the defaults on any error.
    pub fn from_env() -> Self {
        let Some(path) = std::env::var_os("RECOVERY_CONFIG").map(PathBuf::from) else {
            return Self::default();
        };
        let settings = RecoverySettings::load_or_init(&path).unwrap_or_else(|err| {
            warn!(target: "recovery.game", path = %path.display(), error = %err, "using default recovery settings");
            RecoverySettings::default()
        });
        Self {
            settings_path: Some(path),
            settings,
            ..Self::default()
        }
    }

    pub fn from_settings(settings: RecoverySettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }
}
