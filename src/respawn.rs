use avian3d::prelude::*;
use bevy::prelude::*;

use crate::LogicalPlayer;

/// Kill-zone detection and respawn teleport. Falling into a [`KillZone`]
/// sensor puts the body back at the [`SpawnPoint`] and broadcasts
/// [`RespawnEvent`] for anyone who cares (the speedrun clock resets on it).
///
/// The teleport only moves the body: ability timers, dash cooldown and
/// double-jump eligibility all survive a respawn unchanged.
pub struct RespawnPlugin;

impl Plugin for RespawnPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<RespawnEvent>()
            .add_systems(FixedUpdate, (detect_kill_zone, respawn_player).chain());
    }
}

/// Where respawns land. Exactly one per level.
#[derive(Component)]
pub struct SpawnPoint;

/// Sensor volume that sends the player back to the spawn point. Needs
/// `Sensor` + `CollisionEventsEnabled` on the same entity.
#[derive(Component)]
pub struct KillZone;

#[derive(Event, Debug, Clone, Copy)]
pub struct RespawnEvent {
    pub player: Entity,
}

fn detect_kill_zone(
    mut collisions: EventReader<CollisionStarted>,
    mut respawns: EventWriter<RespawnEvent>,
    players: Query<(), With<LogicalPlayer>>,
    zones: Query<(), With<KillZone>>,
) {
    for CollisionStarted(a, b) in collisions.read() {
        let player = if players.contains(*a) && zones.contains(*b) {
            *a
        } else if players.contains(*b) && zones.contains(*a) {
            *b
        } else {
            continue;
        };
        info!("entered kill zone, respawning");
        respawns.write(RespawnEvent { player });
    }
}

fn respawn_player(
    mut respawns: EventReader<RespawnEvent>,
    spawn_points: Query<&Transform, (With<SpawnPoint>, Without<LogicalPlayer>)>,
    mut players: Query<&mut Transform, With<LogicalPlayer>>,
) {
    for event in respawns.read() {
        let Ok(spawn) = spawn_points.single() else {
            continue;
        };
        if let Ok(mut transform) = players.get_mut(event.player) {
            transform.translation = spawn.translation;
        }
    }
}
