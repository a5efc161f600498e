use avian3d::prelude::*;
use bevy::{input::mouse::MouseMotion, prelude::*};

/// Manages the parkour controllers. Input runs in `PreUpdate`, after bevy's
/// internal input processing is finished; the simulation step runs once per
/// fixed tick.
///
/// If you need a system in `PreUpdate` to execute after the controller's
/// systems, do it like so:
///
/// ```
/// # use bevy::prelude::*;
///
/// struct MyPlugin;
/// impl Plugin for MyPlugin {
///     fn build(&self, app: &mut App) {
///         app.add_systems(
///             PreUpdate,
///             my_system.after(parkour::parkour_controller_look),
///         );
///     }
/// }
///
/// fn my_system() { }
/// ```
pub struct ParkourControllerPlugin;

pub static FPS: f64 = 96.0;

impl Plugin for ParkourControllerPlugin {
    fn build(&self, app: &mut App) {
        use bevy::input::{gamepad, keyboard, mouse, touch};

        app.add_event::<DashTrailEvent>()
            .add_systems(
                PreUpdate,
                (parkour_controller_input, parkour_controller_look)
                    .chain()
                    .after(mouse::mouse_button_input_system)
                    .after(keyboard::keyboard_input_system)
                    .after(gamepad::gamepad_event_processing_system)
                    .after(gamepad::gamepad_connection_system)
                    .after(touch::touch_screen_input_system),
            )
            .insert_resource(Time::<Fixed>::from_hz(FPS))
            .add_systems(FixedUpdate, parkour_controller_move);
    }
}

/// The simulated body. Owns the physics state; the camera entity mirrors it.
#[derive(Component)]
pub struct LogicalPlayer;

/// The camera entity that follows a [`LogicalPlayer`].
#[derive(Component)]
pub struct RenderPlayer {
    pub logical_entity: Entity,
}

#[derive(Component)]
pub struct CameraConfig {
    /// Rest camera height above the body center.
    pub height_offset: f32,
    /// Lowered camera height while sliding.
    pub slide_height_offset: f32,
}

/// Surfaces the wall-run probes accept. Side casts that hit anything else
/// will not start or sustain a wall-run.
#[derive(Component)]
pub struct WallRunnable;

/// Visual trail hook for the dash. The controller only reports the phase
/// boundaries; rendering the trail is up to the consumer.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashTrailEvent {
    Started,
    Stopped,
}

#[derive(Component, Default)]
pub struct ParkourControllerInput {
    pub pitch: f32,
    pub yaw: f32,
    /// x = strafe axis, y = forward axis, each in [-1, 1].
    pub movement: Vec2,
    pub sprint: bool,
    // Edge-triggered buttons. Latched here by the input system (which runs
    // once per render frame) and cleared by the fixed-tick step after
    // consumption, so a press between two fixed ticks is never dropped.
    pub jump_pressed: bool,
    pub dash_pressed: bool,
    pub slide_pressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DashState {
    Ready,
    /// `initial` is the dash velocity captured on the trigger frame; the
    /// residual decays linearly from it to zero over the dash duration.
    Active { elapsed: f32, initial: Vec3 },
    Cooling { elapsed: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlideState {
    Idle,
    Active { elapsed: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallRunState {
    Idle,
    Active,
}

/// One fixed tick's worth of sampled input, as consumed by
/// [`ParkourController::step`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInput {
    pub move_axes: Vec2,
    pub sprint: bool,
    pub jump_pressed: bool,
    pub dash_pressed: bool,
    pub slide_pressed: bool,
}

/// Probe results for one fixed tick. `wall_right`/`wall_left` carry the
/// surface normal of a wall-runnable hit within probe range, or `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameProbes {
    pub grounded: bool,
    pub wall_right: Option<Vec3>,
    pub wall_left: Option<Vec3>,
}

/// What one step produced: the velocity to hand to the physics body, plus
/// dash phase boundaries for the trail effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameOutput {
    pub velocity: Vec3,
    pub dash_started: bool,
    pub dash_ended: bool,
}

/// Vertical velocity is clamped to this while grounded instead of zero, so
/// the body stays pressed against the ground across solver jitter.
const GROUND_STICK: f32 = -2.0;

#[derive(Component)]
pub struct ParkourController {
    // Movement
    pub walk_speed: f32,
    pub sprint_speed: f32,
    pub gravity: f32,
    pub jump_height: f32,

    // Dash
    pub dash_force: f32,
    pub dash_duration: f32,
    pub dash_cooldown: f32,

    // Slide
    pub slide_speed: f32,
    pub slide_duration: f32,
    pub slide_cam_lerp_speed: f32,

    // Wall run
    pub wall_run_force: f32,
    pub wall_run_duration: f32,
    pub wall_gravity: f32,
    pub wall_cam_tilt: f32,
    pub wall_cam_tilt_speed: f32,
    pub wall_probe_range: f32,

    // Camera & look. Angles are degrees; pitch is clamped to [-90, 90].
    pub look_sensitivity: f32,
    pub normal_fov: f32,
    pub sprint_fov: f32,
    pub fov_lerp_speed: f32,

    /// If the downward shape cast hits within this distance, the body is
    /// considered grounded
    pub grounded_distance: f32,
    /// If the dot product (alignment) of the normal of the surface and the
    /// upward vector, which is a value from [-1, 1], is greater than this
    /// value, the hit counts as ground
    pub traction_normal_cutoff: f32,

    // Runtime state
    pub yaw: f32,
    pub pitch: f32,
    pub vertical_velocity: f32,
    pub can_double_jump: bool,
    pub dash: DashState,
    pub dash_velocity: Vec3,
    pub slide: SlideState,
    pub wall_run: WallRunState,
    pub wall_run_elapsed: f32,
    pub wall_normal: Vec3,

    pub enable_input: bool,

    pub key_forward: KeyCode,
    pub key_back: KeyCode,
    pub key_left: KeyCode,
    pub key_right: KeyCode,
    pub key_sprint: KeyCode,
    pub key_jump: KeyCode,
    pub key_dash: KeyCode,
    pub key_slide: KeyCode,
}

impl Default for ParkourController {
    fn default() -> Self {
        Self {
            walk_speed: 4.0,
            sprint_speed: 8.0,
            gravity: -20.0,
            jump_height: 1.5,

            dash_force: 20.0,
            dash_duration: 0.25,
            dash_cooldown: 1.0,

            slide_speed: 12.0,
            slide_duration: 0.7,
            slide_cam_lerp_speed: 8.0,

            wall_run_force: 8.0,
            wall_run_duration: 1.2,
            wall_gravity: -2.0,
            wall_cam_tilt: 15.0,
            wall_cam_tilt_speed: 8.0,
            wall_probe_range: 1.0,

            look_sensitivity: 40.0,
            normal_fov: 75.0,
            sprint_fov: 90.0,
            fov_lerp_speed: 10.0,

            grounded_distance: 0.125,
            traction_normal_cutoff: 0.7,

            yaw: 0.0,
            pitch: 0.0,
            vertical_velocity: 0.0,
            can_double_jump: false,
            dash: DashState::Ready,
            dash_velocity: Vec3::ZERO,
            slide: SlideState::Idle,
            wall_run: WallRunState::Idle,
            wall_run_elapsed: 0.0,
            wall_normal: Vec3::ZERO,

            enable_input: true,
            key_forward: KeyCode::KeyW,
            key_back: KeyCode::KeyS,
            key_left: KeyCode::KeyA,
            key_right: KeyCode::KeyD,
            key_sprint: KeyCode::ShiftLeft,
            key_jump: KeyCode::Space,
            key_dash: KeyCode::KeyE,
            key_slide: KeyCode::ControlLeft,
        }
    }
}

impl ParkourController {
    pub fn is_dashing(&self) -> bool {
        matches!(self.dash, DashState::Active { .. })
    }

    pub fn dash_ready(&self) -> bool {
        matches!(self.dash, DashState::Ready)
    }

    pub fn is_sliding(&self) -> bool {
        matches!(self.slide, SlideState::Active { .. })
    }

    pub fn is_wall_running(&self) -> bool {
        self.wall_run == WallRunState::Active
    }

    fn ability_active(&self) -> bool {
        self.is_dashing() || self.is_sliding() || self.is_wall_running()
    }

    /// Body-relative forward on the horizontal plane. Forward is -Z at yaw 0.
    pub fn forward(&self) -> Vec3 {
        Quat::from_rotation_y(self.yaw.to_radians()) * -Vec3::Z
    }

    pub fn right(&self) -> Vec3 {
        Quat::from_rotation_y(self.yaw.to_radians()) * Vec3::X
    }

    fn jump_velocity(&self) -> f32 {
        // Projectile motion: the exact takeoff speed that peaks at jump_height.
        (self.jump_height * -2.0 * self.gravity).sqrt()
    }

    /// Advance the controller by one fixed tick. Pure with respect to the
    /// world: all external state arrives through `input` and `probes`, and
    /// the resulting body velocity comes back in the output.
    pub fn step(&mut self, input: &FrameInput, probes: &FrameProbes, dt: f32) -> FrameOutput {
        let mut out = FrameOutput::default();

        self.check_ground(probes);

        let mut velocity = self.locomotion_velocity(input);
        velocity += self.integrate_gravity(dt);
        self.handle_jump(input, probes);
        velocity += self.update_dash(input, dt, &mut out);
        velocity += self.update_slide(input, probes, dt);
        velocity += self.update_wall_run(input, probes, dt);

        out.velocity = velocity;
        out
    }

    fn check_ground(&mut self, probes: &FrameProbes) {
        if probes.grounded {
            self.can_double_jump = true;
            if self.vertical_velocity < 0.0 {
                self.vertical_velocity = GROUND_STICK;
            }
        }
    }

    /// Default ground locomotion. Suppressed entirely while any ability is
    /// active; the flags read here are the previous frame's, matching the
    /// update order (abilities are stepped after locomotion).
    fn locomotion_velocity(&self, input: &FrameInput) -> Vec3 {
        if self.ability_active() {
            return Vec3::ZERO;
        }
        let speed = if input.sprint {
            self.sprint_speed
        } else {
            self.walk_speed
        };
        (self.right() * input.move_axes.x + self.forward() * input.move_axes.y) * speed
    }

    /// Gravity accumulates every frame, ability or not; only the horizontal
    /// request above is gated.
    fn integrate_gravity(&mut self, dt: f32) -> Vec3 {
        let g = if self.is_wall_running() {
            self.wall_gravity
        } else {
            self.gravity
        };
        self.vertical_velocity += g * dt;
        Vec3::Y * self.vertical_velocity
    }

    fn handle_jump(&mut self, input: &FrameInput, probes: &FrameProbes) {
        if !input.jump_pressed {
            return;
        }
        if probes.grounded {
            self.vertical_velocity = self.jump_velocity();
        } else if self.can_double_jump && !self.is_wall_running() {
            self.vertical_velocity = self.jump_velocity();
            self.can_double_jump = false;
        }
    }

    fn update_dash(&mut self, input: &FrameInput, dt: f32, out: &mut FrameOutput) -> Vec3 {
        if input.dash_pressed && self.dash_ready() && !self.is_sliding() {
            self.dash = DashState::Active {
                elapsed: 0.0,
                initial: self.forward() * self.dash_force,
            };
            out.dash_started = true;
        }

        match self.dash {
            DashState::Ready => Vec3::ZERO,
            DashState::Active { elapsed, initial } => {
                self.dash_velocity = initial.lerp(Vec3::ZERO, elapsed / self.dash_duration);
                let contribution = self.dash_velocity;
                let elapsed = elapsed + dt;
                if elapsed >= self.dash_duration {
                    self.dash_velocity = Vec3::ZERO;
                    self.dash = DashState::Cooling { elapsed: 0.0 };
                    out.dash_ended = true;
                } else {
                    self.dash = DashState::Active { elapsed, initial };
                }
                contribution
            }
            DashState::Cooling { elapsed } => {
                let elapsed = elapsed + dt;
                self.dash = if elapsed >= self.dash_cooldown {
                    DashState::Ready
                } else {
                    DashState::Cooling { elapsed }
                };
                Vec3::ZERO
            }
        }
    }

    fn update_slide(&mut self, input: &FrameInput, probes: &FrameProbes, dt: f32) -> Vec3 {
        if input.slide_pressed
            && probes.grounded
            && !self.is_sliding()
            && !self.is_dashing()
            && input.move_axes.y > 0.0
        {
            self.slide = SlideState::Active { elapsed: 0.0 };
        }

        match self.slide {
            SlideState::Idle => Vec3::ZERO,
            SlideState::Active { elapsed } => {
                // Forward is re-sampled every frame; turning mid-slide steers it.
                let contribution = self.forward() * self.slide_speed;
                let elapsed = elapsed + dt;
                self.slide = if elapsed >= self.slide_duration {
                    SlideState::Idle
                } else {
                    SlideState::Active { elapsed }
                };
                contribution
            }
        }
    }

    fn update_wall_run(&mut self, input: &FrameInput, probes: &FrameProbes, dt: f32) -> Vec3 {
        if probes.grounded || input.move_axes.y <= 0.0 {
            self.wall_run = WallRunState::Idle;
            return Vec3::ZERO;
        }
        // Keeps the abilities mutually exclusive: a mid-air dash next to a
        // wall does not also start a wall-run.
        if self.is_dashing() || self.is_sliding() {
            self.wall_run = WallRunState::Idle;
            return Vec3::ZERO;
        }

        if let Some(normal) = probes.wall_right.or(probes.wall_left) {
            self.sustain_wall_run(normal, dt);
        } else {
            self.wall_run = WallRunState::Idle;
        }

        if self.is_wall_running() {
            self.forward() * self.wall_run_force
        } else {
            Vec3::ZERO
        }
    }

    /// Runs every frame a side probe hits: refreshes the stored normal,
    /// cancels this frame's gravity, and advances the shared elapsed budget.
    /// The budget only resets on its own timeout, never on surface loss.
    fn sustain_wall_run(&mut self, normal: Vec3, dt: f32) {
        self.wall_run = WallRunState::Active;
        self.wall_normal = normal;
        self.wall_run_elapsed += dt;
        self.vertical_velocity = 0.0;

        if self.wall_run_elapsed >= self.wall_run_duration {
            self.wall_run = WallRunState::Idle;
            self.wall_run_elapsed = 0.0;
        }
    }
}

/// Fold a look delta (already scaled by sensitivity and frame time, in
/// degrees) into accumulated pitch/yaw.
pub fn accumulate_look(pitch: f32, yaw: f32, delta: Vec2) -> (f32, f32) {
    let pitch = (pitch - delta.y).clamp(-90.0, 90.0);
    let mut yaw = yaw - delta.x;
    if yaw.abs() > 180.0 {
        yaw = yaw.rem_euclid(360.0);
    }
    (pitch, yaw)
}

pub fn parkour_controller_input(
    time: Res<Time>,
    key_input: Res<ButtonInput<KeyCode>>,
    mut mouse_events: EventReader<MouseMotion>,
    mut query: Query<(&ParkourController, &mut ParkourControllerInput)>,
) {
    for (controller, mut input) in query
        .iter_mut()
        .filter(|(controller, _)| controller.enable_input)
    {
        let mut mouse_delta = Vec2::ZERO;
        for mouse_event in mouse_events.read() {
            mouse_delta += mouse_event.delta;
        }
        mouse_delta *= controller.look_sensitivity * time.delta_secs();

        let (pitch, yaw) = accumulate_look(input.pitch, input.yaw, mouse_delta);
        input.pitch = pitch;
        input.yaw = yaw;

        input.movement = Vec2::new(
            get_axis(&key_input, controller.key_right, controller.key_left),
            get_axis(&key_input, controller.key_forward, controller.key_back),
        );
        input.sprint = key_input.pressed(controller.key_sprint);
        input.jump_pressed |= key_input.just_pressed(controller.key_jump);
        input.dash_pressed |= key_input.just_pressed(controller.key_dash);
        input.slide_pressed |= key_input.just_pressed(controller.key_slide);
    }
}

pub fn parkour_controller_look(mut query: Query<(&mut ParkourController, &ParkourControllerInput)>) {
    for (mut controller, input) in query.iter_mut() {
        controller.pitch = input.pitch;
        controller.yaw = input.yaw;
    }
}

pub fn parkour_controller_move(
    spatial_query_pipeline: Res<SpatialQueryPipeline>,
    runnable_walls: Query<(), With<WallRunnable>>,
    mut trail_events: EventWriter<DashTrailEvent>,
    mut query: Query<
        (
            Entity,
            &mut ParkourControllerInput,
            &mut ParkourController,
            &Collider,
            &Transform,
            &mut LinearVelocity,
        ),
        With<LogicalPlayer>,
    >,
) {
    let dt = 1.0 / FPS as f32;

    for (entity, mut input, mut controller, collider, transform, mut velocity) in query.iter_mut() {
        let filter = SpatialQueryFilter::default().with_excluded_entities([entity]);

        let grounded = ground_cast(
            &spatial_query_pipeline,
            collider,
            transform,
            controller.grounded_distance,
            &filter,
        )
        .is_some_and(|hit| Vec3::dot(hit.normal1, Vec3::Y) > controller.traction_normal_cutoff);

        let origin = transform.translation;
        let right = controller.right();
        let probes = FrameProbes {
            grounded,
            wall_right: wall_cast(
                &spatial_query_pipeline,
                &runnable_walls,
                origin,
                right,
                controller.wall_probe_range,
                &filter,
            ),
            wall_left: wall_cast(
                &spatial_query_pipeline,
                &runnable_walls,
                origin,
                -right,
                controller.wall_probe_range,
                &filter,
            ),
        };

        let frame = FrameInput {
            move_axes: input.movement,
            sprint: input.sprint,
            jump_pressed: input.jump_pressed,
            dash_pressed: input.dash_pressed,
            slide_pressed: input.slide_pressed,
        };

        let out = controller.step(&frame, &probes, dt);
        velocity.0 = out.velocity;

        if out.dash_started {
            trail_events.write(DashTrailEvent::Started);
        }
        if out.dash_ended {
            trail_events.write(DashTrailEvent::Stopped);
        }

        // Edges consumed; the input system re-latches them next render frame.
        input.jump_pressed = false;
        input.dash_pressed = false;
        input.slide_pressed = false;
    }
}

/// Shape cast downwards to find ground.
/// Better than a ray cast as it handles when you are near the edge of a surface.
fn ground_cast(
    spatial_query_pipeline: &SpatialQueryPipeline,
    collider: &Collider,
    transform: &Transform,
    max_distance: f32,
    filter: &SpatialQueryFilter,
) -> Option<ShapeHitData> {
    spatial_query_pipeline.cast_shape(
        // Consider when the controller is right up against a wall
        // We do not want the shape cast to detect it,
        // so provide a slightly smaller collider in the XZ plane
        &scaled_collider_laterally(collider, SLIGHT_SCALE_DOWN),
        transform.translation,
        transform.rotation,
        -Dir3::Y,
        &ShapeCastConfig::from_max_distance(max_distance),
        filter,
    )
}

/// Short lateral ray, accepted only when it lands on a [`WallRunnable`]
/// surface. Returns the hit surface normal.
fn wall_cast(
    spatial_query_pipeline: &SpatialQueryPipeline,
    runnable_walls: &Query<(), With<WallRunnable>>,
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    filter: &SpatialQueryFilter,
) -> Option<Vec3> {
    let direction = Dir3::new(direction).ok()?;
    let hit = spatial_query_pipeline.cast_ray(origin, direction, max_distance, true, filter)?;
    runnable_walls.contains(hit.entity).then_some(hit.normal)
}

/// Untagged variant of the side probe: true when the ray hits any surface.
/// The camera tilt re-derives its direction from these every frame instead
/// of remembering which wall started the run.
pub fn surface_cast(
    spatial_query_pipeline: &SpatialQueryPipeline,
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    filter: &SpatialQueryFilter,
) -> bool {
    let Ok(direction) = Dir3::new(direction) else {
        return false;
    };
    spatial_query_pipeline
        .cast_ray(origin, direction, max_distance, true, filter)
        .is_some()
}

const SLIGHT_SCALE_DOWN: f32 = 0.9375;

/// Returns the offset that puts a point at the center of the player transform to the bottom of the collider.
/// Needed for when we want to originate something at the foot of the player.
pub fn collider_y_offset(collider: &Collider) -> Vec3 {
    Vec3::Y
        * if let Some(cylinder) = collider.shape().as_cylinder() {
            cylinder.half_height
        } else {
            panic!("Controller must use a cylinder collider")
        }
}

/// Return a collider that is scaled laterally (XZ plane) but not vertically (Y axis).
fn scaled_collider_laterally(collider: &Collider, scale: f32) -> Collider {
    if let Some(cylinder) = collider.shape().as_cylinder() {
        Collider::cylinder(cylinder.radius * scale, cylinder.half_height * 2.0)
    } else {
        panic!("Controller must use a cylinder collider")
    }
}

fn get_pressed(key_input: &Res<ButtonInput<KeyCode>>, key: KeyCode) -> f32 {
    if key_input.pressed(key) { 1.0 } else { 0.0 }
}

fn get_axis(key_input: &Res<ButtonInput<KeyCode>>, key_pos: KeyCode, key_neg: KeyCode) -> f32 {
    get_pressed(key_input, key_pos) - get_pressed(key_input, key_neg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::Vec3Swizzles;

    const DT: f32 = 1.0 / FPS as f32;
    const EPS: f32 = 1e-4;

    fn controller() -> ParkourController {
        ParkourController::default()
    }

    fn idle() -> FrameInput {
        FrameInput::default()
    }

    fn forward_held() -> FrameInput {
        FrameInput {
            move_axes: Vec2::new(0.0, 1.0),
            ..default()
        }
    }

    fn grounded() -> FrameProbes {
        FrameProbes {
            grounded: true,
            ..default()
        }
    }

    fn airborne() -> FrameProbes {
        FrameProbes::default()
    }

    fn airborne_wall_right() -> FrameProbes {
        FrameProbes {
            grounded: false,
            wall_right: Some(Vec3::X),
            wall_left: None,
        }
    }

    fn frames(duration: f32) -> usize {
        (duration / DT).ceil() as usize
    }

    fn at_most_one_ability(c: &ParkourController) -> bool {
        [c.is_dashing(), c.is_sliding(), c.is_wall_running()]
            .iter()
            .filter(|active| **active)
            .count()
            <= 1
    }

    #[test]
    fn jump_velocity_matches_projectile_formula() {
        let mut c = controller();
        let input = FrameInput {
            jump_pressed: true,
            ..default()
        };
        c.step(&input, &grounded(), DT);
        // jump_height = 1.5, gravity = -20 => sqrt(60)
        assert!((c.vertical_velocity - 60.0_f32.sqrt()).abs() < EPS);
    }

    #[test]
    fn grounded_sticks_with_small_negative_velocity() {
        let mut c = controller();
        for _ in 0..10 {
            c.step(&idle(), &grounded(), DT);
        }
        // Clamped to the stick value each frame, plus one frame of gravity.
        assert!((c.vertical_velocity - (-2.0 + c.gravity * DT)).abs() < EPS);
    }

    #[test]
    fn double_jump_available_exactly_once_per_landing() {
        let mut c = controller();
        c.step(&idle(), &grounded(), DT);
        assert!(c.can_double_jump);

        // Leave the ground, then jump mid-air.
        c.step(&idle(), &airborne(), DT);
        let jump = FrameInput {
            jump_pressed: true,
            ..default()
        };
        c.step(&jump, &airborne(), DT);
        assert!(!c.can_double_jump);
        assert!((c.vertical_velocity - 60.0_f32.sqrt()).abs() < EPS);

        // A second attempt without landing is rejected: only gravity applies.
        let before = c.vertical_velocity;
        c.step(&jump, &airborne(), DT);
        assert!((c.vertical_velocity - (before + c.gravity * DT)).abs() < EPS);
    }

    #[test]
    fn double_jump_refused_while_wall_running() {
        let mut c = controller();
        c.step(&idle(), &grounded(), DT);
        c.step(&forward_held(), &airborne_wall_right(), DT);
        assert!(c.is_wall_running());

        let jump = FrameInput {
            move_axes: Vec2::new(0.0, 1.0),
            jump_pressed: true,
            ..default()
        };
        c.step(&jump, &airborne_wall_right(), DT);
        // vertical velocity is pinned to zero by the wall, never to jump speed
        assert!(c.can_double_jump);
        assert_eq!(c.vertical_velocity, 0.0);
    }

    #[test]
    fn dash_lifecycle_active_then_cooling_then_ready() {
        let mut c = controller();
        let trigger = FrameInput {
            dash_pressed: true,
            ..default()
        };
        let mut out = c.step(&trigger, &grounded(), DT);
        assert!(c.is_dashing());
        assert!(out.dash_started);
        // Full force on the trigger frame, straight along forward (-Z).
        assert!((out.velocity.z + c.dash_force).abs() < EPS);
        assert_eq!(out.velocity.x, 0.0);

        let mut active_frames = 1;
        while c.is_dashing() {
            out = c.step(&idle(), &grounded(), DT);
            active_frames += 1;
            assert!(at_most_one_ability(&c));
            assert!(active_frames <= frames(c.dash_duration) + 1);
        }
        assert!(active_frames >= frames(c.dash_duration) - 1);
        assert!(out.dash_ended);
        assert_eq!(c.dash_velocity, Vec3::ZERO);
        assert!(matches!(c.dash, DashState::Cooling { .. }));

        // Triggering while cooling is a no-op.
        c.step(&trigger, &grounded(), DT);
        assert!(!c.is_dashing());

        let mut guard = 0;
        while !c.dash_ready() {
            c.step(&idle(), &grounded(), DT);
            guard += 1;
            assert!(guard <= frames(c.dash_cooldown) + 1);
        }
    }

    #[test]
    fn dash_residual_velocity_decays_linearly() {
        let mut c = controller();
        let trigger = FrameInput {
            dash_pressed: true,
            ..default()
        };
        c.step(&trigger, &grounded(), DT);

        let halfway = frames(c.dash_duration) / 2;
        for _ in 1..halfway {
            c.step(&idle(), &grounded(), DT);
        }
        let expected = c.dash_force * (1.0 - ((halfway - 1) as f32 * DT) / c.dash_duration);
        assert!((c.dash_velocity.length() - expected).abs() < 1e-3);
    }

    #[test]
    fn dash_refused_while_sliding() {
        let mut c = controller();
        let slide = FrameInput {
            move_axes: Vec2::new(0.0, 1.0),
            slide_pressed: true,
            ..default()
        };
        c.step(&slide, &grounded(), DT);
        assert!(c.is_sliding());

        let dash = FrameInput {
            dash_pressed: true,
            ..default()
        };
        c.step(&dash, &grounded(), DT);
        assert!(!c.is_dashing());
        assert!(c.dash_ready());
    }

    #[test]
    fn slide_trigger_requires_ground_and_forward_input() {
        let mut c = controller();
        let mut press = FrameInput {
            slide_pressed: true,
            ..default()
        };

        // No forward input.
        c.step(&press, &grounded(), DT);
        assert!(!c.is_sliding());

        // Airborne.
        press.move_axes.y = 1.0;
        c.step(&press, &airborne(), DT);
        assert!(!c.is_sliding());

        // All conditions met.
        c.step(&press, &grounded(), DT);
        assert!(c.is_sliding());
    }

    #[test]
    fn slide_runs_fixed_duration_and_suppresses_locomotion() {
        let mut c = controller();
        let press = FrameInput {
            move_axes: Vec2::new(0.0, 1.0),
            slide_pressed: true,
            ..default()
        };
        let out = c.step(&press, &grounded(), DT);
        // Trigger frame still carries regular locomotion plus slide speed.
        assert!((out.velocity.z + c.walk_speed + c.slide_speed).abs() < EPS);

        let held = forward_held();
        let out = c.step(&held, &grounded(), DT);
        // Subsequent frames are slide-only.
        assert!((out.velocity.z + c.slide_speed).abs() < EPS);

        let mut active_frames = 2;
        while c.is_sliding() {
            c.step(&held, &grounded(), DT);
            active_frames += 1;
            assert!(active_frames <= frames(c.slide_duration) + 1);
        }
        assert!(active_frames >= frames(c.slide_duration) - 1);
    }

    #[test]
    fn wall_run_caps_duration_and_resets_budget_on_timeout() {
        let mut c = controller();
        let held = forward_held();
        let total = frames(c.wall_run_duration);
        for i in 0..total {
            c.step(&held, &airborne_wall_right(), DT);
            if i < total - 1 {
                assert!(c.is_wall_running());
            }
        }
        assert!(!c.is_wall_running());
        assert_eq!(c.wall_run_elapsed, 0.0);
    }

    #[test]
    fn wall_run_budget_persists_across_surface_loss() {
        let mut c = controller();
        let held = forward_held();
        for _ in 0..50 {
            c.step(&held, &airborne_wall_right(), DT);
        }
        let spent = c.wall_run_elapsed;
        assert!(spent > 0.0);

        // Lose the wall: the run ends but the budget is kept.
        c.step(&held, &airborne(), DT);
        assert!(!c.is_wall_running());
        assert_eq!(c.wall_run_elapsed, spent);

        // Re-attach and confirm the timeout arrives early.
        let remaining = frames(c.wall_run_duration - spent);
        for _ in 0..remaining {
            c.step(&held, &airborne_wall_right(), DT);
        }
        assert!(!c.is_wall_running());
        assert_eq!(c.wall_run_elapsed, 0.0);
    }

    #[test]
    fn wall_run_needs_forward_input_and_air() {
        let mut c = controller();
        c.step(&idle(), &airborne_wall_right(), DT);
        assert!(!c.is_wall_running());

        c.step(&forward_held(), &grounded(), DT);
        assert!(!c.is_wall_running());

        c.step(&forward_held(), &airborne_wall_right(), DT);
        assert!(c.is_wall_running());
        assert_eq!(c.wall_normal, Vec3::X);
    }

    #[test]
    fn wall_run_pins_vertical_velocity_and_uses_wall_gravity() {
        let mut c = controller();
        let held = forward_held();
        c.step(&held, &airborne_wall_right(), DT);
        assert_eq!(c.vertical_velocity, 0.0);

        // Next frame's fall is one tick of the weaker wall gravity.
        let out = c.step(&held, &airborne_wall_right(), DT);
        assert!((out.velocity.y - c.wall_gravity * DT).abs() < EPS);
    }

    #[test]
    fn abilities_stay_mutually_exclusive_under_button_mashing() {
        let mut c = controller();
        let mash = FrameInput {
            move_axes: Vec2::new(0.0, 1.0),
            sprint: true,
            jump_pressed: true,
            dash_pressed: true,
            slide_pressed: true,
        };
        for i in 0..600 {
            let probes = match i % 3 {
                0 => grounded(),
                1 => airborne_wall_right(),
                _ => airborne(),
            };
            c.step(&mash, &probes, DT);
            assert!(at_most_one_ability(&c), "frame {i}: {:?}", (c.dash, c.slide, c.wall_run));
        }
    }

    #[test]
    fn locomotion_speed_follows_sprint_modifier() {
        let mut c = controller();
        let walk = c.step(&forward_held(), &grounded(), DT).velocity;
        assert!((walk.xz().length() - c.walk_speed).abs() < EPS);

        let sprint_input = FrameInput {
            move_axes: Vec2::new(0.0, 1.0),
            sprint: true,
            ..default()
        };
        let sprint = c.step(&sprint_input, &grounded(), DT).velocity;
        assert!((sprint.xz().length() - c.sprint_speed).abs() < EPS);
    }

    #[test]
    fn pitch_clamps_at_ninety_degrees() {
        let mut pitch = 0.0;
        let mut yaw = 0.0;
        for _ in 0..1000 {
            (pitch, yaw) = accumulate_look(pitch, yaw, Vec2::new(0.0, 5.0));
        }
        assert_eq!(pitch, -90.0);
        for _ in 0..1000 {
            (pitch, yaw) = accumulate_look(pitch, yaw, Vec2::new(0.0, -5.0));
        }
        assert_eq!(pitch, 90.0);
        let _ = yaw;
    }

    #[test]
    fn yaw_wraps_instead_of_growing_without_bound() {
        let mut pitch = 0.0;
        let mut yaw = 0.0;
        for _ in 0..10_000 {
            (pitch, yaw) = accumulate_look(pitch, yaw, Vec2::new(7.3, 0.0));
        }
        assert!(yaw.abs() <= 360.0);
    }
}
