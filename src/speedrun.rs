use avian3d::prelude::*;
use bevy::prelude::*;

use crate::{LogicalPlayer, RespawnEvent};

/// Wall-clock of the current run. Starts immediately, resets whenever the
/// player respawns, and stops for good when a [`FinishZone`] is touched.
pub struct SpeedrunPlugin;

impl Plugin for SpeedrunPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SpeedrunTimer>().add_systems(
            Update,
            (
                tick_timer,
                reset_timer_on_respawn,
                stop_timer_at_finish,
                update_timer_display,
            ),
        );
    }
}

/// Sensor volume that ends the run. Needs `Sensor` +
/// `CollisionEventsEnabled` on the same entity.
#[derive(Component)]
pub struct FinishZone;

/// Marker for the HUD text entity showing the clock.
#[derive(Component)]
pub struct SpeedrunDisplay;

#[derive(Resource)]
pub struct SpeedrunTimer {
    elapsed: f32,
    running: bool,
}

impl Default for SpeedrunTimer {
    fn default() -> Self {
        Self {
            elapsed: 0.0,
            running: true,
        }
    }
}

impl SpeedrunTimer {
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn display(&self) -> String {
        format_clock(self.elapsed)
    }
}

/// `MM:SS.CC`, each field floored, centiseconds wrapping at 100.
pub fn format_clock(seconds: f32) -> String {
    let minutes = (seconds / 60.0).floor() as u32;
    let secs = (seconds % 60.0).floor() as u32;
    let centis = ((seconds * 100.0) % 100.0).floor() as u32;
    format!("{minutes:02}:{secs:02}.{centis:02}")
}

fn tick_timer(time: Res<Time>, mut timer: ResMut<SpeedrunTimer>) {
    if timer.running {
        timer.elapsed += time.delta_secs();
    }
}

fn reset_timer_on_respawn(mut respawns: EventReader<RespawnEvent>, mut timer: ResMut<SpeedrunTimer>) {
    for _ in respawns.read() {
        timer.reset();
    }
}

fn stop_timer_at_finish(
    mut collisions: EventReader<CollisionStarted>,
    mut timer: ResMut<SpeedrunTimer>,
    players: Query<(), With<LogicalPlayer>>,
    finish_zones: Query<(), With<FinishZone>>,
) {
    for CollisionStarted(a, b) in collisions.read() {
        let crossed = (players.contains(*a) && finish_zones.contains(*b))
            || (players.contains(*b) && finish_zones.contains(*a));
        if crossed && timer.running {
            info!("finish reached at {}", timer.display());
            timer.stop();
        }
    }
}

fn update_timer_display(
    timer: Res<SpeedrunTimer>,
    mut displays: Query<&mut Text, With<SpeedrunDisplay>>,
) {
    for mut text in displays.iter_mut() {
        text.0 = timer.display();
    }
}
