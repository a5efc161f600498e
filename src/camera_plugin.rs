use avian3d::prelude::*;
use bevy::math::FloatExt;
use bevy::prelude::*;

use crate::{
    CameraConfig, LogicalPlayer, ParkourController, ParkourControllerInput, RenderPlayer,
    collider_y_offset, surface_cast,
};

/// Derives the camera transform and FOV from the movement state every frame:
/// roll tilt while wall-running, a lowered eye while sliding, and a widened
/// FOV while sprinting. Everything is smoothed; nothing snaps after the
/// first frame.
pub struct CameraFeedbackPlugin;

impl Plugin for CameraFeedbackPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, camera_feedback);
    }
}

/// Smoothed camera values. These are the only persistent pieces of the
/// feedback; the targets are re-derived from the controller every frame.
#[derive(Component)]
pub struct CameraFeedback {
    pub tilt: Quat,
    pub height: f32,
    /// Radians, as stored in the projection.
    pub fov: f32,
}

impl CameraFeedback {
    /// Start at the rest pose so the first frame does not visibly snap.
    pub fn at_rest(config: &CameraConfig, controller: &ParkourController) -> Self {
        Self {
            tilt: Quat::IDENTITY,
            height: config.height_offset,
            fov: controller.normal_fov.to_radians(),
        }
    }
}

/// Tilt target in degrees. Only meaningful while wall-running; the side is
/// re-derived from the probes of the current frame, not from whichever wall
/// originally started the run.
pub fn tilt_target(wall_running: bool, surface_right: bool, surface_left: bool, tilt: f32) -> f32 {
    if !wall_running {
        return 0.0;
    }
    if surface_right {
        tilt
    } else if surface_left {
        -tilt
    } else {
        0.0
    }
}

pub fn fov_target(sprint_held: bool, normal_fov: f32, sprint_fov: f32) -> f32 {
    if sprint_held { sprint_fov } else { normal_fov }
}

/// Exponential approach: `Lerp(current, target, rate * dt)` with the factor
/// clamped so a large frame time lands on the target instead of past it.
pub fn smooth_toward(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    current.lerp(target, (rate * dt).clamp(0.0, 1.0))
}

pub fn camera_feedback(
    time: Res<Time>,
    spatial_query_pipeline: Res<SpatialQueryPipeline>,
    mut render_query: Query<
        (&mut Transform, &mut Projection, &mut CameraFeedback, &RenderPlayer),
        With<RenderPlayer>,
    >,
    logical_query: Query<
        (
            Entity,
            &Transform,
            &Collider,
            &ParkourController,
            &ParkourControllerInput,
            &CameraConfig,
        ),
        (With<LogicalPlayer>, Without<RenderPlayer>),
    >,
) {
    let dt = time.delta_secs();

    for (mut render_transform, mut projection, mut feedback, render_player) in
        render_query.iter_mut()
    {
        let Ok((entity, logical_transform, collider, controller, input, config)) =
            logical_query.get(render_player.logical_entity)
        else {
            continue;
        };

        // Side probes for the tilt are untagged: any nearby surface counts,
        // not just wall-runnable ones.
        let filter = SpatialQueryFilter::default().with_excluded_entities([entity]);
        let origin = logical_transform.translation;
        let right = controller.right();
        let surface_right = surface_cast(
            &spatial_query_pipeline,
            origin,
            right,
            controller.wall_probe_range,
            &filter,
        );
        let surface_left = surface_cast(
            &spatial_query_pipeline,
            origin,
            -right,
            controller.wall_probe_range,
            &filter,
        );

        let target_deg = tilt_target(
            controller.is_wall_running(),
            surface_right,
            surface_left,
            controller.wall_cam_tilt,
        );
        let target_tilt = Quat::from_rotation_z(target_deg.to_radians());
        let tilt_factor = (controller.wall_cam_tilt_speed * dt).clamp(0.0, 1.0);
        feedback.tilt = feedback.tilt.slerp(target_tilt, tilt_factor);

        let height_target = if controller.is_sliding() {
            config.slide_height_offset
        } else {
            config.height_offset
        };
        feedback.height = smooth_toward(
            feedback.height,
            height_target,
            controller.slide_cam_lerp_speed,
            dt,
        );

        let fov_goal = fov_target(input.sprint, controller.normal_fov, controller.sprint_fov);
        feedback.fov = smooth_toward(
            feedback.fov,
            fov_goal.to_radians(),
            controller.fov_lerp_speed,
            dt,
        );

        render_transform.translation = logical_transform.translation
            + collider_y_offset(collider)
            + Vec3::Y * feedback.height;
        render_transform.rotation = Quat::from_euler(
            EulerRot::YXZ,
            controller.yaw.to_radians(),
            controller.pitch.to_radians(),
            0.0,
        ) * feedback.tilt;

        if let Projection::Perspective(perspective) = projection.as_mut() {
            perspective.fov = feedback.fov;
        }
    }
}
