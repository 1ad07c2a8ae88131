//! Bevy host for the recovery engine.
//!
//! Creatures are entities with [`gameplay::Health`] and [`gameplay::Tameable`];
//! the game reports what happens to them through events and the plugin heals
//! them on the fixed timestep.

pub mod gameplay;
pub mod host;
pub mod plugin;

pub use plugin::{Recovery, RecoveryPlugin};
