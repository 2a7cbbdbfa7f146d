//! Per-frame animation and the capture ("swallow") state machine
//!
//! One [`World::step`] per frame moves the camera from input, advances the
//! capture sequence, then spins and orbits every animated object with a speed
//! boost that grows as the camera nears the hole.

use common::math::{hermite, saturate};
use common::{CameraState, Projection};
use glam::{Vec2, Vec3};

use crate::config::SceneConfig;
use crate::scene::{Scene, VisualType};

/// Progress at which a capture counts as finished.
const CAPTURE_COMPLETE: f32 = 1.0 - 1e-4;

const BOB_FREQUENCY: f32 = 0.8;
const BOB_AMPLITUDE: f32 = 0.15;

/// Objects closer than this to the axis start to stretch.
const STRETCH_START: f32 = 3.8;
/// Distance over which stretch ramps from 0 to 1.
const STRETCH_RANGE: f32 = 2.0;

/// Movement intent for one frame, each axis in {-1, 0, 1}.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    /// +1 forward, -1 back.
    pub forward: i8,
    /// +1 right, -1 left.
    pub strafe: i8,
    /// Pointer lock engaged.
    pub movement_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Free,
    Capturing,
}

/// Swallow sequence state. `progress` only moves while `active`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CaptureState {
    pub progress: f32,
    pub active: bool,
}

impl CaptureState {
    pub fn phase(&self) -> CapturePhase {
        if self.active {
            CapturePhase::Capturing
        } else {
            CapturePhase::Free
        }
    }
}

/// What happened during one step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepOutcome {
    pub proximity: f32,
    pub speed_boost: f32,
    pub capture_started: bool,
    pub capture_completed: bool,
}

/// Smooth `[0, 1]` closeness to the hole's axis: 1 within `inner`, 0 from
/// `outer` on, Hermite-eased in between.
pub fn proximity_factor(distance: f32, inner: f32, outer: f32) -> f32 {
    hermite(saturate((outer - distance) / (outer - inner)))
}

/// Cosmetic tidal stretch for an object at `distance` from the axis.
pub fn stretch_factor(distance: f32) -> f32 {
    let s = saturate((STRETCH_START - distance) / STRETCH_RANGE);
    s * s
}

/// Eye displacement that makes the view tremble near the hole.
pub fn camera_shake(proximity: f32, capture_progress: f32, time: f32) -> Vec3 {
    let amplitude = 0.01 + 0.08 * proximity + 0.14 * capture_progress;
    let t = time * (8.0 + 18.0 * proximity);
    Vec3::new(
        (t * 1.7).sin() * amplitude,
        (t * 2.3 + 10.0).sin() * amplitude * 0.6,
        (t * 1.1 + 20.0).sin() * amplitude * 0.4,
    )
}

/// Perspective widened as the capture progresses.
pub fn projection(config: &SceneConfig, capture_progress: f32) -> Projection {
    Projection {
        fov_y: config.fov + capture_progress * config.capture_fov_boost,
        near: config.near,
        far: config.far,
    }
}

/// All mutable per-session state: camera, capture sequence and scene.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    pub camera: CameraState,
    pub capture: CaptureState,
    pub scene: Scene,
}

impl World {
    pub fn new(config: &SceneConfig, scene: Scene) -> Self {
        Self {
            camera: config.spawn,
            capture: CaptureState::default(),
            scene,
        }
    }

    /// Advance by `dt` seconds; `time` is the absolute clock used for the
    /// purely time-driven wobbles.
    pub fn step(&mut self, config: &SceneConfig, input: InputSnapshot, dt: f32, time: f32) -> StepOutcome {
        let center = config.black_hole_center();
        let mut outcome = StepOutcome::default();

        if input.movement_enabled && !self.capture.active {
            self.integrate_movement(config, input, dt);
        }

        let distance = self.camera.horizontal_distance_to(center);
        if !self.capture.active {
            if distance < config.capture_radius {
                self.capture.active = true;
                outcome.capture_started = true;
                log::info!("Capture started at {:.2} units from the axis", distance);
            }
        } else if self.advance_capture(config, center, dt) {
            outcome.capture_completed = true;
            log::info!("Capture complete, respawning");
        }

        let distance = self.camera.horizontal_distance_to(center);
        outcome.proximity = proximity_factor(distance, config.proximity_inner, config.proximity_outer);
        outcome.speed_boost = 1.0
            + outcome.proximity * config.orbit_boost_proximity
            + self.capture.progress * config.orbit_boost_capture;

        self.animate_objects(config, center, outcome.speed_boost, dt, time);
        outcome
    }

    fn integrate_movement(&mut self, config: &SceneConfig, input: InputSnapshot, dt: f32) {
        let intent = Vec2::new(input.forward as f32, input.strafe as f32);
        if intent == Vec2::ZERO {
            return;
        }
        let step = self.camera.ground_forward() * intent.x + self.camera.ground_right() * intent.y;
        self.camera.position += step * config.move_speed * dt;
    }

    /// Returns true on the step that completes the capture.
    fn advance_capture(&mut self, config: &SceneConfig, center: Vec3, dt: f32) -> bool {
        let progress = (self.capture.progress + dt * config.capture_rate).min(1.0);
        self.capture.progress = progress;

        // Fall toward the axis faster as the blackout deepens.
        let k = hermite(progress);
        let pull = (1.0 - dt * (0.6 + 3.2 * k)).max(0.0);
        let position = &mut self.camera.position;
        position.x = center.x + (position.x - center.x) * pull;
        position.z = center.z + (position.z - center.z) * pull;
        self.camera.yaw += dt * (0.35 + 1.2 * k);

        if progress >= CAPTURE_COMPLETE {
            self.capture = CaptureState::default();
            self.camera = config.spawn;
            return true;
        }
        false
    }

    fn animate_objects(&mut self, config: &SceneConfig, center: Vec3, boost: f32, dt: f32, time: f32) {
        for object in &mut self.scene.objects {
            if object.visual == VisualType::LightMarker {
                object.position = config.light_position(time);
                continue;
            }
            let Some(orbit) = object.orbit.as_mut() else {
                continue;
            };

            orbit.phase += orbit.orbit_speed * boost * dt;
            object.rotation += orbit.rotation_speed * boost * dt;
            object.position = Vec3::new(
                center.x + orbit.phase.cos() * orbit.orbit_radius,
                orbit.orbit_height + (time * BOB_FREQUENCY + orbit.seed).sin() * BOB_AMPLITUDE,
                center.z + orbit.phase.sin() * orbit.orbit_radius,
            );

            let dx = object.position.x - center.x;
            let dz = object.position.z - center.z;
            object.stretch = stretch_factor(dx.hypot(dz));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::tests::fake_resources;
    use rand::{rngs::StdRng, SeedableRng};

    const IDLE: InputSnapshot = InputSnapshot {
        forward: 0,
        strafe: 0,
        movement_enabled: false,
    };

    fn world(config: &SceneConfig) -> World {
        let scene = Scene::build(config, &fake_resources(), &mut StdRng::seed_from_u64(7));
        World::new(config, scene)
    }

    fn place_at_distance(world: &mut World, config: &SceneConfig, distance: f32) {
        let center = config.black_hole_center();
        world.camera.position = Vec3::new(center.x + distance, 2.0, center.z);
    }

    #[test]
    fn proximity_is_monotone_and_clamped() {
        let (inner, outer) = (3.0, 14.0);
        assert_eq!(proximity_factor(outer, inner, outer), 0.0);
        assert_eq!(proximity_factor(outer + 5.0, inner, outer), 0.0);
        assert_eq!(proximity_factor(inner, inner, outer), 1.0);
        assert_eq!(proximity_factor(0.0, inner, outer), 1.0);

        let mut previous = f32::INFINITY;
        for i in 0..=200 {
            let p = proximity_factor(i as f32 * 0.1, inner, outer);
            assert!(p <= previous);
            previous = p;
        }
    }

    #[test]
    fn boundary_does_not_trigger_capture() {
        let config = SceneConfig::default();
        let mut world = world(&config);
        place_at_distance(&mut world, &config, config.capture_radius);
        let outcome = world.step(&config, IDLE, 0.016, 0.0);
        assert!(!outcome.capture_started);
        assert_eq!(world.capture.phase(), CapturePhase::Free);

        place_at_distance(&mut world, &config, config.capture_radius - 0.01);
        let outcome = world.step(&config, IDLE, 0.016, 0.016);
        assert!(outcome.capture_started);
        assert_eq!(world.capture.phase(), CapturePhase::Capturing);
        assert_eq!(world.capture.progress, 0.0);
    }

    #[test]
    fn capture_completes_after_one_over_rate_seconds() {
        let config = SceneConfig::default();
        let mut world = world(&config);
        place_at_distance(&mut world, &config, 1.0);
        assert!(world.step(&config, IDLE, 0.016, 0.0).capture_started);

        let steps = 60;
        let dt = 1.0 / (config.capture_rate * steps as f32);
        let mut completions = 0;
        let mut last_progress = 0.0;
        for i in 0..steps {
            let outcome = world.step(&config, IDLE, dt, i as f32 * dt);
            if outcome.capture_completed {
                completions += 1;
                assert_eq!(i, steps - 1, "completed early at step {i}");
            } else {
                assert!(world.capture.progress > last_progress);
                last_progress = world.capture.progress;
            }
        }

        assert_eq!(completions, 1);
        assert!(!world.capture.active);
        assert_eq!(world.capture.progress, 0.0);
        assert_eq!(world.camera, config.spawn);
    }

    #[test]
    fn capture_pulls_toward_axis_and_spins() {
        let config = SceneConfig::default();
        let mut world = world(&config);
        place_at_distance(&mut world, &config, 2.0);
        world.step(&config, IDLE, 0.016, 0.0);

        let yaw = world.camera.yaw;
        let before = world.camera.horizontal_distance_to(config.black_hole_center());
        world.step(&config, IDLE, 0.1, 0.1);
        let after = world.camera.horizontal_distance_to(config.black_hole_center());
        assert!(after < before);
        assert!(world.camera.yaw > yaw);
    }

    #[test]
    fn movement_follows_yaw_and_respects_lock() {
        let config = SceneConfig::default();
        let mut world = world(&config);
        let start = world.camera.position;

        let forward = InputSnapshot {
            forward: 1,
            strafe: 0,
            movement_enabled: true,
        };
        world.step(&config, forward, 0.5, 0.0);
        // Spawn faces -Z.
        assert!((world.camera.position - (start + Vec3::new(0.0, 0.0, -3.0))).length() < 1e-4);

        let right = InputSnapshot {
            forward: 0,
            strafe: 1,
            movement_enabled: true,
        };
        let before = world.camera.position;
        world.step(&config, right, 0.5, 0.5);
        assert!(world.camera.position.x > before.x + 2.9);

        let before = world.camera.position;
        world.step(&config, InputSnapshot { movement_enabled: false, ..forward }, 0.5, 1.0);
        assert_eq!(world.camera.position, before);
    }

    #[test]
    fn movement_is_ignored_while_capturing() {
        let config = SceneConfig::default();
        let mut world = world(&config);
        place_at_distance(&mut world, &config, 1.0);
        world.step(&config, IDLE, 0.016, 0.0);
        let before = world.camera.position;

        let push = InputSnapshot {
            forward: 0,
            strafe: 1,
            movement_enabled: true,
        };
        world.step(&config, push, 0.016, 0.016);
        // Only the pull toward the axis moves the camera.
        assert!(world.camera.position.x < before.x);
    }

    #[test]
    fn orbits_speed_up_near_the_hole() {
        let config = SceneConfig::default();
        let mut far = world(&config);
        let mut near = far.clone();
        place_at_distance(&mut near, &config, 4.0);

        let far_outcome = far.step(&config, IDLE, 0.1, 0.0);
        let near_outcome = near.step(&config, IDLE, 0.1, 0.0);
        assert_eq!(far_outcome.speed_boost, 1.0);
        assert!(near_outcome.speed_boost > 2.0);

        let center = config.black_hole_center();
        for (a, b) in far.scene.objects.iter().zip(&near.scene.objects) {
            let (Some(oa), Some(ob)) = (a.orbit, b.orbit) else {
                continue;
            };
            assert!(ob.phase > oa.phase);
            let radius = (a.position.x - center.x).hypot(a.position.z - center.z);
            assert!((radius - oa.orbit_radius).abs() < 1e-3);
            assert!((a.position.y - oa.orbit_height).abs() <= BOB_AMPLITUDE + 1e-5);
        }
    }

    #[test]
    fn light_marker_follows_the_light() {
        let config = SceneConfig::default();
        let mut world = world(&config);
        world.step(&config, IDLE, 0.016, 3.0);
        let marker = world
            .scene
            .objects
            .iter()
            .find(|o| o.visual == VisualType::LightMarker)
            .unwrap();
        assert_eq!(marker.position, config.light_position(3.0));
    }

    #[test]
    fn stretch_ramps_in_close() {
        assert_eq!(stretch_factor(4.0), 0.0);
        assert_eq!(stretch_factor(STRETCH_START), 0.0);
        assert_eq!(stretch_factor(1.5), 1.0);
        assert_eq!(stretch_factor(0.0), 1.0);
        assert!((stretch_factor(2.8) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn shake_grows_with_proximity_and_capture() {
        let amplitude = |p, c| {
            (0..400)
                .map(|i| camera_shake(p, c, i as f32 * 0.01).x.abs())
                .fold(0.0_f32, f32::max)
        };
        let calm = amplitude(0.0, 0.0);
        let close = amplitude(1.0, 0.0);
        let swallowed = amplitude(1.0, 1.0);
        assert!(calm <= 0.01 + 1e-6);
        assert!(close > calm * 4.0);
        assert!(swallowed > close);
    }

    #[test]
    fn fov_widens_with_capture() {
        let config = SceneConfig::default();
        assert_eq!(projection(&config, 0.0).fov_y, config.fov);
        assert!((projection(&config, 1.0).fov_y - config.fov - 0.35).abs() < 1e-6);
    }
}
