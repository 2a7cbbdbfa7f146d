//! Drawable objects and the startup scene layout

use glam::{Mat3, Mat4, Vec3};
use rand::Rng;
use std::f32::consts::TAU;

use crate::backend::{DrawPolicy, MeshHandle, TextureHandle};
use crate::config::SceneConfig;

/// What an object is, and therefore how it is shaded and drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualType {
    Room,
    BlackHole,
    Asteroid,
    LightMarker,
    Starfield,
}

impl VisualType {
    /// The black hole is a screen-space overlay volume; everything else is
    /// ordinary opaque geometry.
    pub fn draw_policy(self) -> DrawPolicy {
        match self {
            VisualType::BlackHole => DrawPolicy::VOLUME,
            VisualType::Room
            | VisualType::Asteroid
            | VisualType::LightMarker
            | VisualType::Starfield => DrawPolicy::SOLID,
        }
    }

    /// Branch selector read by `fs_main` in `scene.wgsl`.
    pub fn shader_code(self) -> u32 {
        match self {
            VisualType::Room => 0,
            VisualType::BlackHole => 1,
            VisualType::Asteroid => 2,
            VisualType::LightMarker => 3,
            VisualType::Starfield => 4,
        }
    }
}

/// Orbit of an object around the black hole's vertical axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitAnimation {
    /// Per-object offset so bobbing isn't in lockstep.
    pub seed: f32,
    pub orbit_radius: f32,
    pub orbit_height: f32,
    /// Radians per second before boost.
    pub orbit_speed: f32,
    pub rotation_speed: f32,
    /// Current orbital angle.
    pub phase: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub visual: VisualType,
    pub position: Vec3,
    pub scale: Vec3,
    /// Spin about the local Y axis.
    pub rotation: f32,
    /// Cosmetic tidal stretch in `[0, 1]`.
    pub stretch: f32,
    pub color: Vec3,
    pub mesh: MeshHandle,
    pub texture: Option<TextureHandle>,
    pub orbit: Option<OrbitAnimation>,
}

/// Lengthening along the pull direction at full stretch.
const STRETCH_RADIAL: f32 = 0.9;
/// Thinning across it at full stretch.
const STRETCH_LATERAL: f32 = 0.35;

impl SceneObject {
    fn new(visual: VisualType, position: Vec3, scale: Vec3, color: Vec3, mesh: MeshHandle) -> Self {
        Self {
            visual,
            position,
            scale,
            rotation: 0.0,
            stretch: 0.0,
            color,
            mesh,
            texture: None,
            orbit: None,
        }
    }

    /// `translate · stretch · rotate · scale`. The stretch is applied in world
    /// space so the elongation always points at `axis`.
    pub fn model_matrix(&self, axis: Vec3) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_mat3(self.stretch_matrix(axis))
            * Mat4::from_rotation_y(self.rotation)
            * Mat4::from_scale(self.scale)
    }

    fn stretch_matrix(&self, axis: Vec3) -> Mat3 {
        let toward = Vec3::new(axis.x - self.position.x, 0.0, axis.z - self.position.z);
        if self.stretch <= 0.0 || toward.length_squared() < 1e-8 {
            return Mat3::IDENTITY;
        }
        let n = toward.normalize();
        let lateral = 1.0 - self.stretch * STRETCH_LATERAL;
        let radial = 1.0 + self.stretch * STRETCH_RADIAL;
        // lateral·I + (radial - lateral)·n nᵀ
        let outer = Mat3::from_cols(n * n.x, n * n.y, n * n.z);
        Mat3::IDENTITY * lateral + outer * (radial - lateral)
    }
}

/// Shared GPU resources every object points at.
#[derive(Debug, Clone, Copy)]
pub struct SceneResources {
    pub cube: MeshHandle,
    pub stars: MeshHandle,
    pub rock: MeshHandle,
    pub rock_texture: TextureHandle,
}

/// Ordered draw list. The black hole is always last so its overlay blends
/// over everything already in the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
}

const LIGHT_MARKER_SCALE: f32 = 0.12;
const LIGHT_MARKER_COLOR: Vec3 = Vec3::new(0.85, 0.92, 1.0);
const ROOM_COLOR: Vec3 = Vec3::new(0.05, 0.06, 0.09);

impl Scene {
    pub fn build<R: Rng + ?Sized>(config: &SceneConfig, resources: &SceneResources, rng: &mut R) -> Self {
        let mut objects = Vec::with_capacity(config.asteroid_count + 4);

        if config.room {
            // Negative scale turns the cube inside out so its walls face in.
            objects.push(SceneObject::new(
                VisualType::Room,
                config.room_center,
                -config.room_half_extents,
                ROOM_COLOR,
                resources.cube,
            ));
        }

        objects.push(SceneObject::new(
            VisualType::Starfield,
            Vec3::ZERO,
            Vec3::ONE,
            Vec3::ONE,
            resources.stars,
        ));

        let center = config.black_hole_center();
        for i in 0..config.asteroid_count {
            objects.push(spawn_asteroid(i, config.asteroid_count, center, resources, rng));
        }

        objects.push(SceneObject::new(
            VisualType::LightMarker,
            config.light_position(0.0),
            Vec3::splat(LIGHT_MARKER_SCALE),
            LIGHT_MARKER_COLOR,
            resources.cube,
        ));

        objects.push(SceneObject::new(
            VisualType::BlackHole,
            center,
            Vec3::splat(config.black_hole_scale),
            Vec3::ZERO,
            resources.cube,
        ));

        log::debug!("Scene built with {} objects", objects.len());
        Self { objects }
    }
}

/// Loose ring around the hole: evenly spread angles with a little jitter,
/// neutral rock greys, slightly squashed scales.
fn spawn_asteroid<R: Rng + ?Sized>(
    index: usize,
    count: usize,
    center: Vec3,
    resources: &SceneResources,
    rng: &mut R,
) -> SceneObject {
    let angle = index as f32 / count as f32 * TAU + rng.gen::<f32>() * 0.6;
    let radius = 6.5 + rng.gen::<f32>() * 3.5;
    let height = 2.0 + rng.gen::<f32>() * 3.2;

    let grey = 0.45 + rng.gen::<f32>() * 0.18;
    let size = 0.35 + rng.gen::<f32>() * 0.55;
    let squash = 0.7 + rng.gen::<f32>() * 0.6;

    let orbit = OrbitAnimation {
        seed: rng.gen::<f32>() * 1000.0,
        orbit_radius: radius,
        orbit_height: height,
        orbit_speed: 0.18 + rng.gen::<f32>() * 0.22,
        rotation_speed: 0.15 + rng.gen::<f32>() * 0.6,
        phase: angle,
    };

    let mut object = SceneObject::new(
        VisualType::Asteroid,
        Vec3::new(center.x + angle.cos() * radius, height, center.z + angle.sin() * radius),
        Vec3::new(size, size * squash, size),
        Vec3::new(grey, grey * 0.95, grey * 0.9),
        resources.rock,
    );
    object.texture = Some(resources.rock_texture);
    object.orbit = Some(orbit);
    object
}
