//! A small parkour course for the movement controller.
//!
//! This showcases the following:
//!
//! - Walking, sprinting, jumping and the double jump
//! - Dashing (E) with its trail puffs, sliding (Ctrl while moving forward)
//! - Wall-running along the tagged corridor walls
//! - Camera tilt, slide squash and sprint FOV feedback
//! - Kill zone respawn and the speedrun clock
//!
//! The controller logic itself lives in the `parkour` library.

use avian3d::prelude::*;
use bevy::prelude::*;

use parkour::*;

use bevy::{math::Vec3Swizzles, window::CursorGrabMode};

fn main() {
    App::new()
        .add_plugins((
            DefaultPlugins,
            PhysicsPlugins::default(),
            ParkourControllerPlugin,
            CameraFeedbackPlugin,
            RespawnPlugin,
            SpeedrunPlugin,
            DiagPlugin,
        ))
        .init_resource::<TrailEmitter>()
        .add_systems(Startup, setup)
        .add_systems(Update, (manage_cursor, display_text, dash_trail_toggle))
        .add_systems(FixedUpdate, (dash_trail_spawn, dash_trail_fade))
        .run();
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.spawn((
        DirectionalLight {
            illuminance: light_consts::lux::FULL_DAYLIGHT,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 7.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    let spawn_position = Vec3::new(0.0, 2.0, 0.0);
    commands.spawn((SpawnPoint, Transform::from_translation(spawn_position)));

    // Note that we have two entities for the player
    // One is a "logical" player that handles the physics computation and collision
    // The other is a "render" player that is what is displayed to the user
    let height = 1.8;
    let controller = ParkourController::default();
    let camera_config = CameraConfig {
        height_offset: 0.6,
        slide_height_offset: 0.1,
    };
    let feedback = CameraFeedback::at_rest(&camera_config, &controller);
    let normal_fov = controller.normal_fov;

    let logical_entity = commands
        .spawn((
            Collider::cylinder(0.5, height),
            Friction {
                dynamic_coefficient: 0.0,
                static_coefficient: 0.0,
                combine_rule: CoefficientCombine::Min,
            },
            Restitution {
                coefficient: 0.0,
                combine_rule: CoefficientCombine::Min,
            },
            LinearVelocity::ZERO,
            RigidBody::Dynamic,
            LockedAxes::ROTATION_LOCKED,
            Mass(1.0),
            // The controller integrates its own gravity
            GravityScale(0.0),
            CollisionEventsEnabled,
            Transform::from_translation(spawn_position),
            LogicalPlayer,
            ParkourControllerInput::default(),
            controller,
        ))
        .insert(camera_config)
        .id();

    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: normal_fov.to_radians(),
            ..default()
        }),
        RenderPlayer { logical_entity },
        feedback,
    ));

    let wall_material = materials.add(Color::srgb(0.55, 0.6, 0.8));
    let floor_material = materials.add(Color::srgb(0.8, 0.7, 0.6));
    let accent_material = materials.add(Color::srgb(0.9, 0.3, 0.3));

    // Starting floor
    commands.spawn((
        RigidBody::Static,
        Collider::cuboid(20.0, 1.0, 20.0),
        Mesh3d(meshes.add(Cuboid::new(20.0, 1.0, 20.0))),
        MeshMaterial3d(floor_material.clone()),
        Transform::from_xyz(0.0, -0.5, 0.0),
    ));

    // Wall-run corridor over a gap: two parallel tagged walls, no floor
    for side in [-1.0, 1.0] {
        commands.spawn((
            WallRunnable,
            RigidBody::Static,
            Collider::cuboid(1.0, 4.0, 24.0),
            Mesh3d(meshes.add(Cuboid::new(1.0, 4.0, 24.0))),
            MeshMaterial3d(wall_material.clone()),
            Transform::from_xyz(side * 2.0, 2.0, -24.0),
        ));
    }

    // Landing floor past the corridor, with the finish marker on it
    commands.spawn((
        RigidBody::Static,
        Collider::cuboid(12.0, 1.0, 12.0),
        Mesh3d(meshes.add(Cuboid::new(12.0, 1.0, 12.0))),
        MeshMaterial3d(floor_material),
        Transform::from_xyz(0.0, -0.5, -42.0),
    ));
    commands.spawn((
        FinishZone,
        Sensor,
        CollisionEventsEnabled,
        RigidBody::Static,
        Collider::cuboid(4.0, 3.0, 4.0),
        Transform::from_xyz(0.0, 1.5, -44.0),
    ));

    // Platforms for dash and double-jump practice
    for (i, x) in [3.0, 7.5, 12.5].into_iter().enumerate() {
        commands.spawn((
            RigidBody::Static,
            Collider::cuboid(2.0, 0.5, 2.0),
            Mesh3d(meshes.add(Cuboid::new(2.0, 0.5, 2.0))),
            MeshMaterial3d(accent_material.clone()),
            Transform::from_xyz(x, 1.0 + i as f32 * 0.75, 6.0),
        ));
    }

    // Kill zone catching anything that falls off the course
    commands.spawn((
        KillZone,
        Sensor,
        CollisionEventsEnabled,
        RigidBody::Static,
        Collider::cuboid(400.0, 2.0, 400.0),
        Transform::from_xyz(0.0, -20.0, 0.0),
    ));

    commands.spawn((
        PointLight {
            intensity: 2_000_000.0,
            range: 80.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(0.0, 15.0, -20.0),
    ));

    // HUD: speedrun clock top center, movement readout bottom left
    commands.spawn((
        Text::new("00:00.00"),
        SpeedrunDisplay,
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(8.0),
            left: Val::Percent(47.0),
            ..default()
        },
    ));
    commands.spawn((
        Text::new(""),
        MovementReadout,
        Node {
            position_type: PositionType::Absolute,
            bottom: Val::Px(8.0),
            left: Val::Px(8.0),
            ..default()
        },
    ));
}

#[derive(Component)]
struct MovementReadout;

fn manage_cursor(
    btn: Res<ButtonInput<MouseButton>>,
    key: Res<ButtonInput<KeyCode>>,
    mut window_query: Query<&mut Window>,
    mut controller_query: Query<&mut ParkourController>,
) {
    for mut window in &mut window_query {
        if btn.just_pressed(MouseButton::Left) {
            window.cursor_options.grab_mode = CursorGrabMode::Locked;
            window.cursor_options.visible = false;
            for mut controller in &mut controller_query {
                controller.enable_input = true;
            }
        }
        if key.just_pressed(KeyCode::Escape) {
            window.cursor_options.grab_mode = CursorGrabMode::None;
            window.cursor_options.visible = true;
            for mut controller in &mut controller_query {
                controller.enable_input = false;
            }
        }
    }
}

fn display_text(
    controller_query: Query<(&Transform, &LinearVelocity, &ParkourController), With<LogicalPlayer>>,
    mut text_query: Query<&mut Text, With<MovementReadout>>,
) {
    for (transform, velocity, controller) in &controller_query {
        for mut text in &mut text_query {
            let ability = if controller.is_dashing() {
                "dash"
            } else if controller.is_sliding() {
                "slide"
            } else if controller.is_wall_running() {
                "wallrun"
            } else {
                "-"
            };
            text.0 = format!(
                "spd: {:.2}  pos: {:.1}, {:.1}, {:.1}\nability: {}  double jump: {}",
                velocity.0.xz().length(),
                transform.translation.x,
                transform.translation.y,
                transform.translation.z,
                ability,
                if controller.can_double_jump { "ready" } else { "spent" },
            );
        }
    }
}

// ████████╗██████╗  █████╗ ██╗██╗
//    ██╔══╝██╔══██╗██╔══██╗██║██║
//    ██║   ██████╔╝███████║██║██║
//    ██║   ██╔══██╗██╔══██║██║██║
//    ██║   ██║  ██║██║  ██║██║███████╗
//    ╚═╝   ╚═╝  ╚═╝╚═╝  ╚═╝╚═╝╚══════╝

#[derive(Resource, Default)]
struct TrailEmitter {
    emitting: bool,
}

#[derive(Component)]
struct TrailPuff {
    ttl: Timer,
}

fn dash_trail_toggle(mut events: EventReader<DashTrailEvent>, mut emitter: ResMut<TrailEmitter>) {
    for event in events.read() {
        emitter.emitting = matches!(event, DashTrailEvent::Started);
    }
}

/// While the dash is active, drop a faint puff at the body every tick.
fn dash_trail_spawn(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    emitter: Res<TrailEmitter>,
    players: Query<&Transform, With<LogicalPlayer>>,
) {
    if !emitter.emitting {
        return;
    }
    for transform in &players {
        commands.spawn((
            TrailPuff {
                ttl: Timer::from_seconds(0.4, TimerMode::Once),
            },
            Mesh3d(meshes.add(Sphere::new(0.15))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgba(0.6, 0.8, 1.0, 0.4),
                alpha_mode: AlphaMode::Blend,
                unlit: true,
                ..default()
            })),
            Transform::from_translation(transform.translation),
        ));
    }
}

fn dash_trail_fade(
    mut commands: Commands,
    time: Res<Time>,
    mut puffs: Query<(Entity, &mut TrailPuff, &mut Transform)>,
) {
    for (entity, mut puff, mut transform) in &mut puffs {
        puff.ttl.tick(time.delta());
        transform.scale = Vec3::splat(puff.ttl.fraction_remaining());
        if puff.ttl.finished() {
            commands.entity(entity).despawn();
        }
    }
}
