use std::sync::Arc;

use bevy::prelude::*;
use bevy::time::Fixed;
use recovery_core::{EntityEvent, RecoveryService, SharedClock};
use tracing::info;

use crate::gameplay::{
    CreatureDamaged, CreatureDied, CreatureRecovered, CreatureSpawned, CreatureTamed, OwnerJoined,
    Owners, RecoveryParams, ReloadRecovery,
};
use crate::host::{entity_id, to_entity, EcsWorld};

/// The running recovery service and the clock its heal task is scheduled on.
#[derive(Resource, Clone)]
pub struct Recovery {
    pub service: Arc<RecoveryService>,
    pub clock: SharedClock,
}

/// Heals wounded tamed creatures on the fixed timestep.
///
/// Each fixed step applies `ReloadRecovery` first, then creature events
/// grouped by type in this order: spawns, tames, damage, deaths, owner joins.
/// Events of one type keep the order they were sent in. The heal clock
/// advances last.
pub struct RecoveryPlugin;

impl Plugin for RecoveryPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<RecoveryParams>() {
            app.insert_resource(RecoveryParams::from_env());
        }

        app.init_resource::<Owners>()
            .add_event::<CreatureSpawned>()
            .add_event::<CreatureTamed>()
            .add_event::<CreatureDamaged>()
            .add_event::<CreatureDied>()
            .add_event::<OwnerJoined>()
            .add_event::<CreatureRecovered>()
            .add_event::<ReloadRecovery>()
            .add_systems(Startup, (configure_fixed_time, enable_recovery))
            .add_systems(
                FixedUpdate,
                (apply_recovery_reloads, apply_creature_events, run_heal_clock).chain(),
            )
            .add_systems(Last, disable_on_exit);
    }
}

fn configure_fixed_time(
    fixed_time: Option<ResMut<Time<Fixed>>>,
    params: Option<Res<RecoveryParams>>,
) {
    let (Some(mut fixed_time), Some(params)) = (fixed_time, params) else {
        return;
    };
    if let Some(hz) = params.fixed_hz {
        fixed_time.set_timestep_hz(hz);
    }
}

fn enable_recovery(world: &mut World) {
    let params = world
        .get_resource::<RecoveryParams>()
        .cloned()
        .unwrap_or_default();
    let resolved = params.settings.resolve();
    let clock = SharedClock::new();
    let service = Arc::new(RecoveryService::new(clock.clone()));
    service.enable(resolved.config, &mut EcsWorld::new(world));
    info!(
        target: "recovery.game",
        interval_ticks = resolved.config.interval_ticks,
        warnings = resolved.warnings.len(),
        "recovery enabled"
    );
    world.insert_resource(Recovery { service, clock });
}

fn drain<E: Event>(world: &mut World) -> Vec<E> {
    world
        .get_resource_mut::<Events<E>>()
        .map(|mut events| events.drain().collect())
        .unwrap_or_default()
}

fn apply_recovery_reloads(world: &mut World) {
    let Some(recovery) = world.get_resource::<Recovery>().cloned() else {
        return;
    };
    for ReloadRecovery(settings) in drain::<ReloadRecovery>(world) {
        let resolved = settings.resolve();
        recovery
            .service
            .reload(resolved.config, &mut EcsWorld::new(world));
        if let Some(mut params) = world.get_resource_mut::<RecoveryParams>() {
            params.settings = settings;
        }
    }
}

fn apply_creature_events(world: &mut World) {
    let Some(recovery) = world.get_resource::<Recovery>().cloned() else {
        return;
    };
    let service = &recovery.service;

    for CreatureSpawned(entity) in drain::<CreatureSpawned>(world) {
        service.handle(
            &mut EcsWorld::new(world),
            EntityEvent::Spawned(entity_id(entity)),
        );
    }

    for CreatureTamed { entity, owner } in drain::<CreatureTamed>(world) {
        let mut host = EcsWorld::new(world);
        host.tame(entity, owner);
        service.handle(&mut host, EntityEvent::Tamed(entity_id(entity)));
    }

    for CreatureDamaged { entity, amount } in drain::<CreatureDamaged>(world) {
        let mut host = EcsWorld::new(world);
        let id = entity_id(entity);
        service.handle(&mut host, EntityEvent::Damaged { entity: id, amount });
        let landed = if host.apply_damage(entity, amount) {
            EntityEvent::Died(id)
        } else {
            EntityEvent::HealthChanged(id)
        };
        service.handle(&mut host, landed);
    }

    for CreatureDied(entity) in drain::<CreatureDied>(world) {
        let mut host = EcsWorld::new(world);
        host.mark_dead(entity);
        service.handle(&mut host, EntityEvent::Died(entity_id(entity)));
    }

    for OwnerJoined(owner) in drain::<OwnerJoined>(world) {
        world.resource_mut::<Owners>().set_online(owner, true);
        service.handle(&mut EcsWorld::new(world), EntityEvent::OwnerJoined(owner));
    }
}

fn run_heal_clock(world: &mut World) {
    let Some(recovery) = world.get_resource::<Recovery>().cloned() else {
        return;
    };
    let mut recovered = Vec::new();
    for handle in recovery.clock.advance() {
        let report = recovery
            .service
            .on_task_fired(handle, &mut EcsWorld::new(world));
        if let Some(report) = report {
            recovered.extend(report.recovered.iter().copied().filter_map(to_entity));
        }
    }
    for entity in recovered {
        world.send_event(CreatureRecovered(entity));
    }
}

fn disable_on_exit(mut exits: EventReader<AppExit>, recovery: Option<Res<Recovery>>) {
    if exits.read().next().is_none() {
        return;
    }
    if let Some(recovery) = recovery {
        recovery.service.disable();
        info!(target: "recovery.game", "recovery disabled");
    }
}
