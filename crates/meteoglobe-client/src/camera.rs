//! Orbit camera with scripted fly-to targeting.
//!
//! Two mutually exclusive modes: free orbit (drag-rotate, scroll-zoom,
//! damped inertia) while idle, and a fixed-duration eased interpolation
//! towards the target whenever the host sets coordinates. Clearing the
//! target cancels any in-flight animation in place and re-derives the orbit
//! state from wherever the camera ended up, so control never snaps.

use bevy::ecs::message::MessageReader;
use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy_egui::EguiContexts;

use crate::host::{GlobeTarget, ViewState};

/// Closest the camera may orbit; also the fly-to arrival distance.
pub const MIN_DISTANCE: f32 = 8.0;
/// Farthest the camera may zoom out.
pub const MAX_DISTANCE: f32 = 50.0;
/// Fly-to animation length.
pub const FLY_TO_DURATION_SECS: f32 = 1.2;

/// Radians of yaw/pitch per pixel of drag.
const ROTATE_SENSITIVITY: f32 = 0.005;
/// Distance units per scroll line.
const ZOOM_SENSITIVITY: f32 = 0.8;
/// Per-frame inertia decay, matching a damping factor of 0.05.
const DAMPING_DECAY: f32 = 0.95;

/// Plugin for camera control.
pub struct CameraControllerPlugin;

impl Plugin for CameraControllerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (apply_target_changes, orbit_input, advance_fly_to, orbit_update).chain(),
        );
    }
}

/// Spherical orbit state around the globe's center.
#[derive(Component, Debug)]
pub struct OrbitCamera {
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
    yaw_velocity: f32,
    pitch_velocity: f32,
    zoom_velocity: f32,
    /// False while a target is set; drag and zoom input is ignored.
    pub enabled: bool,
}

impl OrbitCamera {
    pub const DEFAULT_DISTANCE: f32 = 15.0;

    /// Camera position for the current spherical state.
    pub fn position(&self) -> Vec3 {
        Vec3::new(
            self.distance * self.pitch.cos() * self.yaw.sin(),
            self.distance * self.pitch.sin(),
            self.distance * self.pitch.cos() * self.yaw.cos(),
        )
    }

    /// Re-derive yaw/pitch/distance from an arbitrary camera position.
    ///
    /// Used when a fly-to ends or is cancelled, so free orbit resumes from
    /// the camera's actual location instead of snapping back.
    pub fn sync_from_translation(&mut self, translation: Vec3) {
        self.distance = translation.length().clamp(MIN_DISTANCE, MAX_DISTANCE);
        if self.distance > f32::EPSILON {
            self.pitch = (translation.y / translation.length()).clamp(-1.0, 1.0).asin();
        }
        self.yaw = translation.x.atan2(translation.z);
        self.yaw_velocity = 0.0;
        self.pitch_velocity = 0.0;
        self.zoom_velocity = 0.0;
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            distance: Self::DEFAULT_DISTANCE,
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
            zoom_velocity: 0.0,
            enabled: true,
        }
    }
}

/// Ease-out-cubic: decelerates towards the endpoint.
pub fn ease_out_cubic(t: f32) -> f32 {
    1.0 - (1.0 - t).powi(3)
}

/// An in-flight scripted camera move.
#[derive(Component, Debug)]
pub struct FlyTo {
    start: Vec3,
    end: Vec3,
    elapsed: f32,
}

impl FlyTo {
    pub fn new(start: Vec3, end: Vec3) -> Self {
        Self {
            start,
            end,
            elapsed: 0.0,
        }
    }

    /// Advance by a frame's delta and return the new camera position.
    pub fn advance(&mut self, delta_secs: f32) -> Vec3 {
        self.elapsed += delta_secs;
        self.start.lerp(self.end, ease_out_cubic(self.progress()))
    }

    pub fn finished(&self) -> bool {
        self.progress() >= 1.0
    }

    fn progress(&self) -> f32 {
        (self.elapsed / FLY_TO_DURATION_SECS).min(1.0)
    }
}

/// React to the host setting or clearing target coordinates.
#[allow(clippy::needless_pass_by_value)]
fn apply_target_changes(
    mut commands: Commands,
    target: Res<GlobeTarget>,
    mut view_state: ResMut<ViewState>,
    mut query: Query<(Entity, &Transform, &mut OrbitCamera)>,
) {
    if !target.is_changed() {
        return;
    }
    let Ok((entity, transform, mut orbit)) = query.single_mut() else {
        return;
    };

    match target.coordinate {
        Some(coordinate) => {
            if matches!(*view_state, ViewState::Targeting(current) if current == coordinate) {
                return;
            }
            *view_state = ViewState::Targeting(coordinate);
            orbit.enabled = false;
            let destination = coordinate.to_cartesian(f64::from(MIN_DISTANCE));
            commands
                .entity(entity)
                .insert(FlyTo::new(transform.translation, destination));
            tracing::debug!(
                "Flying to ({:.2}, {:.2})",
                coordinate.lat,
                coordinate.lon
            );
        }
        None => {
            if *view_state == ViewState::Idle {
                return;
            }
            *view_state = ViewState::Idle;
            // Cancel mid-flight; the camera stays where the animation left it.
            commands.entity(entity).remove::<FlyTo>();
            orbit.sync_from_translation(transform.translation);
            orbit.enabled = true;
        }
    }
}

/// Accumulate drag and scroll input into orbit velocities.
#[allow(clippy::needless_pass_by_value)]
fn orbit_input(
    mouse: Res<ButtonInput<MouseButton>>,
    mut motion: MessageReader<MouseMotion>,
    mut scroll: MessageReader<MouseWheel>,
    mut contexts: EguiContexts,
    mut query: Query<&mut OrbitCamera>,
) {
    let Ok(mut orbit) = query.single_mut() else {
        return;
    };
    if !orbit.enabled {
        return;
    }

    // Ignore input directed at the control panel.
    let egui_wants_pointer = contexts
        .ctx_mut()
        .ok()
        .is_some_and(|ctx| ctx.is_pointer_over_area() || ctx.wants_pointer_input());
    if egui_wants_pointer {
        motion.clear();
        scroll.clear();
        return;
    }

    if mouse.pressed(MouseButton::Left) {
        for event in motion.read() {
            orbit.yaw_velocity -= event.delta.x * ROTATE_SENSITIVITY;
            orbit.pitch_velocity += event.delta.y * ROTATE_SENSITIVITY;
        }
    }

    for event in scroll.read() {
        // Normalize scroll value: web reports pixels, native reports lines.
        let lines = match event.unit {
            MouseScrollUnit::Line => event.y,
            MouseScrollUnit::Pixel => event.y / 120.0,
        };
        orbit.zoom_velocity -= lines * ZOOM_SENSITIVITY;
    }
}

/// Apply damped inertia and write the camera transform.
fn orbit_update(mut query: Query<(&mut OrbitCamera, &mut Transform), Without<FlyTo>>) {
    for (mut orbit, mut transform) in &mut query {
        if !orbit.enabled {
            continue;
        }

        let (yaw_velocity, pitch_velocity, zoom_velocity) = (
            orbit.yaw_velocity,
            orbit.pitch_velocity,
            orbit.zoom_velocity,
        );
        orbit.yaw += yaw_velocity;
        orbit.pitch = (orbit.pitch + pitch_velocity)
            .clamp(-std::f32::consts::FRAC_PI_2 + 0.01, std::f32::consts::FRAC_PI_2 - 0.01);
        orbit.distance = (orbit.distance + zoom_velocity).clamp(MIN_DISTANCE, MAX_DISTANCE);

        orbit.yaw_velocity *= DAMPING_DECAY;
        orbit.pitch_velocity *= DAMPING_DECAY;
        orbit.zoom_velocity *= DAMPING_DECAY;

        *transform = Transform::from_translation(orbit.position()).looking_at(Vec3::ZERO, Vec3::Y);
    }
}

/// Step the fly-to animation each frame until it lands.
#[allow(clippy::needless_pass_by_value)]
fn advance_fly_to(
    time: Res<Time>,
    mut commands: Commands,
    mut query: Query<(Entity, &mut FlyTo, &mut Transform, &mut OrbitCamera)>,
) {
    for (entity, mut fly_to, mut transform, mut orbit) in &mut query {
        let position = fly_to.advance(time.delta_secs());
        *transform = Transform::from_translation(position).looking_at(Vec3::ZERO, Vec3::Y);
        // Track continuously so cancellation at any frame resumes in place.
        orbit.sync_from_translation(position);

        if fly_to.finished() {
            commands.entity(entity).remove::<FlyTo>();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::GeoCoordinate;

    const EPSILON: f32 = 1e-4;

    #[test]
    fn test_ease_out_cubic_endpoints_and_midpoint() {
        assert!((ease_out_cubic(0.0)).abs() < EPSILON);
        assert!((ease_out_cubic(1.0) - 1.0).abs() < EPSILON);
        assert!((ease_out_cubic(0.5) - 0.875).abs() < EPSILON);
    }

    #[test]
    fn test_fly_to_completes_within_duration() {
        let start = Vec3::new(0.0, 0.0, 15.0);
        let end = GeoCoordinate::new(0.0, 0.0).to_cartesian(8.0);
        assert!((start.distance(end) - (f32::sqrt(225.0 + 64.0))).abs() < 1.0);

        let mut fly_to = FlyTo::new(start, end);
        let frame = 1.0 / 60.0;
        let mut frames = 0;
        let mut position = start;
        while !fly_to.finished() {
            position = fly_to.advance(frame);
            frames += 1;
            assert!(frames <= 74, "animation overran 1200ms + one frame");
        }
        // Lands exactly on the destination at t = 1.
        assert!((position - end).length() < EPSILON);
        assert!(frames >= 72);
    }

    #[test]
    fn test_fly_to_follows_eased_midpoint() {
        let start = Vec3::ZERO;
        let end = Vec3::new(10.0, 0.0, 0.0);
        let mut fly_to = FlyTo::new(start, end);
        let position = fly_to.advance(FLY_TO_DURATION_SECS / 2.0);
        assert!((position.x - 8.75).abs() < EPSILON);
    }

    #[test]
    fn test_orbit_roundtrips_through_sync() {
        let mut orbit = OrbitCamera {
            yaw: 1.2,
            pitch: 0.4,
            distance: 20.0,
            ..OrbitCamera::default()
        };
        let position = orbit.position();
        orbit.sync_from_translation(position);
        assert!((orbit.position() - position).length() < 1e-3);
    }

    #[test]
    fn test_clearing_target_leaves_camera_in_place() {
        let mut app = App::new();
        app.add_plugins(bevy::time::TimePlugin)
            .init_resource::<GlobeTarget>()
            .init_resource::<ViewState>()
            .add_systems(
                Update,
                (apply_target_changes, advance_fly_to, orbit_update).chain(),
            );
        let camera = app
            .world_mut()
            .spawn((
                Transform::from_xyz(0.0, 0.0, 15.0),
                OrbitCamera::default(),
            ))
            .id();

        // Begin targeting; input must be disabled and a FlyTo attached.
        app.world_mut().resource_mut::<GlobeTarget>().coordinate =
            Some(GeoCoordinate::new(48.85, 2.35));
        app.update();
        assert!(!app.world().get::<OrbitCamera>(camera).unwrap().enabled);
        assert!(app.world().get::<FlyTo>(camera).is_some());
        assert!(matches!(
            *app.world().resource::<ViewState>(),
            ViewState::Targeting(_)
        ));

        // Let the animation run partway.
        for _ in 0..5 {
            app.update();
        }
        let mid_flight = app.world().get::<Transform>(camera).unwrap().translation;

        // Clearing cancels immediately: input back on, no snap.
        app.world_mut().resource_mut::<GlobeTarget>().coordinate = None;
        app.update();
        let after = app.world().get::<Transform>(camera).unwrap();
        let orbit = app.world().get::<OrbitCamera>(camera).unwrap();
        assert!(orbit.enabled);
        assert!(app.world().get::<FlyTo>(camera).is_none());
        assert_eq!(*app.world().resource::<ViewState>(), ViewState::Idle);
        assert!(
            (after.translation - mid_flight).length() < 1e-2,
            "camera jumped from {mid_flight:?} to {:?}",
            after.translation
        );
    }
}
