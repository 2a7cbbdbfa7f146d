//! Scene tunables and the command line that overrides them

use std::f32::consts::{FRAC_PI_3, PI};
use std::path::PathBuf;

use clap::Parser;
use common::CameraState;
use glam::Vec3;

use crate::geometry::StarShell;
use crate::volume::VolumeParams;

/// Everything the scene builder and the per-frame animation read.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    pub spawn: CameraState,
    /// World units per second.
    pub move_speed: f32,

    /// Proximity is 1 at or inside this horizontal distance.
    pub proximity_inner: f32,
    /// Proximity is 0 at or beyond this horizontal distance.
    pub proximity_outer: f32,
    /// Capture begins strictly inside this horizontal distance.
    pub capture_radius: f32,
    /// Capture progress per second.
    pub capture_rate: f32,
    pub orbit_boost_proximity: f32,
    pub orbit_boost_capture: f32,

    pub fov: f32,
    /// Added to `fov` at full capture.
    pub capture_fov_boost: f32,
    pub near: f32,
    pub far: f32,

    /// Half extent of the cube enclosing the black hole volume.
    pub black_hole_scale: f32,
    pub asteroid_count: usize,
    pub star_count: usize,
    pub star_shell: StarShell,
    pub texture_size: u32,
    pub room: bool,
    pub room_center: Vec3,
    pub room_half_extents: Vec3,

    pub light_orbit_radius: f32,
    pub light_height: f32,
    pub light_orbit_speed: f32,

    pub volume: VolumeParams,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            spawn: CameraState::new(Vec3::new(0.0, 2.0, 14.0), PI, 0.0),
            move_speed: 6.0,

            proximity_inner: 3.0,
            proximity_outer: 14.0,
            capture_radius: 2.2,
            capture_rate: 0.45,
            orbit_boost_proximity: 1.8,
            orbit_boost_capture: 2.5,

            fov: FRAC_PI_3,
            capture_fov_boost: 0.35,
            near: 0.01,
            far: 220.0,

            black_hole_scale: 8.0,
            asteroid_count: 14,
            star_count: 2800,
            star_shell: StarShell {
                inner_radius: 55.0,
                thickness: 75.0,
            },
            texture_size: 256,
            room: false,
            room_center: Vec3::new(0.0, 6.0, 0.0),
            room_half_extents: Vec3::new(20.0, 8.0, 20.0),

            light_orbit_radius: 7.0,
            light_height: 5.5,
            light_orbit_speed: 0.8,

            volume: VolumeParams::default(),
        }
    }
}

impl SceneConfig {
    /// Centre of the black hole; the capture axis passes through it.
    pub fn black_hole_center(&self) -> Vec3 {
        self.volume.center
    }

    /// Orbiting point light at time `t`.
    pub fn light_position(&self, t: f32) -> Vec3 {
        let angle = t * self.light_orbit_speed;
        Vec3::new(
            angle.sin() * self.light_orbit_radius,
            self.light_height,
            angle.cos() * self.light_orbit_radius,
        )
    }
}

/// Interactive black hole fly-through.
///
/// Click the window to capture the mouse, WASD or arrows to move, Escape to
/// release. Fly too close and the hole swallows you.
#[derive(Debug, Parser)]
#[command(name = "singularity", version)]
pub struct Args {
    /// Window width in physical pixels
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Window height in physical pixels
    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Seed for asteroid layout, rock texture and starfield
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of orbiting asteroids
    #[arg(long, default_value_t = 14)]
    pub asteroids: usize,

    /// Number of background stars
    #[arg(long, default_value_t = 2800)]
    pub stars: usize,

    /// Surround the scene with a grid-lined room
    #[arg(long)]
    pub room: bool,

    /// Render one frame of the black hole on the CPU to this PNG and exit
    #[arg(long, value_name = "PNG")]
    pub snapshot: Option<PathBuf>,
}

impl Args {
    pub fn to_config(&self) -> SceneConfig {
        SceneConfig {
            asteroid_count: self.asteroids,
            star_count: self.stars,
            room: self.room,
            ..SceneConfig::default()
        }
    }
}
