use std::fmt;

use serde::{Deserialize, Serialize};

use crate::world::{EntityId, EntityWorld};

const NODE_PREFIX: &str = "recovery";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// The creature may be healed over time at all.
    Heal,
    /// The creature skips the post-combat cooldown.
    NoDelay,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Capability::Heal => "heal",
            Capability::NoDelay => "no-delay",
        }
    }

    /// Fully qualified permission node, e.g. `recovery.no-delay`.
    pub fn node(&self) -> String {
        format!("{NODE_PREFIX}.{}", self.name())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.node())
    }
}

/// Resolves a capability through the creature's owner. Only online owners
/// carry permissions; wild creatures and creatures of offline owners have none.
pub fn has_capability<W: EntityWorld + ?Sized>(
    world: &W,
    entity: EntityId,
    capability: Capability,
) -> bool {
    match world.owner(entity) {
        Some(owner) if world.is_online(owner) => world.has_permission(owner, capability),
        _ => false,
    }
}
