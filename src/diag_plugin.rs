use avian3d::prelude::*;
use bevy::diagnostic::{
    EntityCountDiagnosticsPlugin, FrameTimeDiagnosticsPlugin, SystemInformationDiagnosticsPlugin,
};
use bevy::prelude::*;
use iyes_perf_ui::prelude::*;

/// Frame pacing plus an on-screen overlay of frame, entity, system and
/// physics diagnostics. Meant for the demo; a game would pick its own.
pub struct DiagPlugin;

impl Plugin for DiagPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            FrameTimeDiagnosticsPlugin::default(),
            EntityCountDiagnosticsPlugin,
            SystemInformationDiagnosticsPlugin,
            bevy_framepace::FramepacePlugin,
            PhysicsDiagnosticsPlugin,
            PhysicsDiagnosticsUiPlugin,
            PerfUiPlugin,
        ))
        .add_systems(Startup, spawn_perf_ui);
    }
}

fn spawn_perf_ui(mut commands: Commands) {
    commands.spawn(PerfUiDefaultEntries::default());
}
