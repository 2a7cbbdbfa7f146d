//! Volumetric black hole shading model
//!
//! A ray is marched from the eye through the black hole's bounding sphere,
//! accumulating emissive density from two noise-driven volumes: a polar jet
//! cone and an equatorial accretion disk. Contributions are composited front
//! to back; the march stops early at the event horizon, on saturation, or on
//! leaving the outer radius.
//!
//! `shaders/scene.wgsl` encodes the same algorithm for the GPU and reads its
//! constants from [`VolumeUniform`], so both stay in lockstep with
//! [`VolumeParams`].

use common::math::{fract, saturate, smoothstep};
use glam::{Vec2, Vec3, Vec4};

/// Accumulated density at which a ray counts as opaque.
pub const SATURATION: f32 = 1.0;

/// Density reported for rays swallowed by the horizon.
pub const HORIZON_DENSITY: f32 = 100.0;

const LUMA: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);

/// Tuning constants for the march and its post-processing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeParams {
    pub center: Vec3,
    /// Rays start on this sphere when the eye is outside it.
    pub bound_radius: f32,
    pub schwarzschild_radius: f32,
    /// Event horizon = Schwarzschild radius × this.
    pub horizon_factor: f32,
    pub exit_radius: f32,
    pub max_steps: u32,
    pub near_step: f32,
    pub far_step: f32,
    /// Distances between which the step size blends from near to far.
    pub step_blend: Vec2,
    /// Fraction of a step the per-pixel start offset may shift.
    pub jitter: f32,

    pub jet_base_width: f32,
    pub jet_spread: f32,
    pub jet_min_height: f32,
    pub jet_speed: f32,
    pub jet_noise_scale: f32,
    pub jet_height_falloff: f32,
    pub jet_color: Vec3,
    pub jet_weight: f32,

    pub disk_radius: f32,
    /// Inner disk edge = event horizon × this.
    pub disk_inner_factor: f32,
    pub disk_half_thickness: f32,
    pub disk_falloff: f32,
    pub disk_rotation_speed: f32,
    pub disk_noise_scale: f32,
    pub disk_color: Vec3,
    pub disk_core_color: Vec3,
    pub disk_weight: f32,
    /// Stylised brightness bias along `doppler_axis`; not physical.
    pub doppler_strength: f32,
    pub doppler_axis: Vec2,

    pub gamma: f32,
    pub bloom_threshold: f32,
    pub bloom_strength: f32,
    pub vignette_strength: f32,
    pub dither_amplitude: f32,
}

impl Default for VolumeParams {
    fn default() -> Self {
        Self {
            center: Vec3::new(0.0, 3.5, 0.0),
            bound_radius: 9.0,
            schwarzschild_radius: 0.8,
            horizon_factor: 1.2,
            exit_radius: 12.0,
            max_steps: 150,
            near_step: 0.08,
            far_step: 0.2,
            step_blend: Vec2::new(1.5, 6.0),
            jitter: 1.0,

            jet_base_width: 0.3,
            jet_spread: 0.15,
            jet_min_height: 1.0,
            jet_speed: 8.0,
            jet_noise_scale: 2.5,
            jet_height_falloff: 0.3,
            jet_color: Vec3::new(0.2, 0.6, 1.0) * 1.5,
            jet_weight: 0.3,

            disk_radius: 4.5,
            disk_inner_factor: 1.5,
            disk_half_thickness: 1.0,
            disk_falloff: 3.0,
            disk_rotation_speed: 3.0,
            disk_noise_scale: 1.5,
            disk_color: Vec3::new(1.0, 0.5, 0.1),
            disk_core_color: Vec3::new(1.0, 0.9, 0.8),
            disk_weight: 0.15,
            doppler_strength: 0.5,
            doppler_axis: Vec2::X,

            gamma: 0.45,
            bloom_threshold: 0.55,
            bloom_strength: 0.35,
            vignette_strength: 0.35,
            dither_amplitude: 1.0 / 255.0,
        }
    }
}

impl VolumeParams {
    pub fn event_horizon(&self) -> f32 {
        self.schwarzschild_radius * self.horizon_factor
    }

    pub fn disk_inner_radius(&self) -> f32 {
        self.event_horizon() * self.disk_inner_factor
    }

    /// Coarse far from the centre, fine near it.
    pub fn step_size(&self, distance_to_center: f32) -> f32 {
        let t = smoothstep(self.step_blend.x, self.step_blend.y, distance_to_center);
        self.near_step + (self.far_step - self.near_step) * t
    }
}

/// What one ray collected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayMarchSample {
    pub color: Vec3,
    pub density: f32,
    pub hit_horizon: bool,
}

impl RayMarchSample {
    const EMPTY: Self = Self {
        color: Vec3::ZERO,
        density: 0.0,
        hit_horizon: false,
    };
}

fn hash(n: f32) -> f32 {
    fract(n.sin() * 43758.547)
}

/// Value noise on the integer lattice with smooth interpolation.
pub fn noise(x: Vec3) -> f32 {
    let p = x.floor();
    let f = x - p;
    let f = f * f * (Vec3::splat(3.0) - 2.0 * f);
    let n = p.x + p.y * 57.0 + 113.0 * p.z;

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    lerp(
        lerp(
            lerp(hash(n), hash(n + 1.0), f.x),
            lerp(hash(n + 57.0), hash(n + 58.0), f.x),
            f.y,
        ),
        lerp(
            lerp(hash(n + 113.0), hash(n + 114.0), f.x),
            lerp(hash(n + 170.0), hash(n + 171.0), f.x),
            f.y,
        ),
        f.z,
    )
}

/// Three octaves of [`noise`]; result in `[0, 0.875)`.
pub fn fbm(mut p: Vec3) -> f32 {
    let mut f = 0.5 * noise(p);
    p *= 2.02;
    f += 0.25 * noise(p);
    p *= 2.03;
    f += 0.125 * noise(p);
    f
}

/// Per-pixel pseudo-random value in `[0, 1)`.
pub fn pixel_hash(frag: Vec2) -> f32 {
    fract((frag.dot(Vec2::new(12.9898, 78.233))).sin() * 43758.547)
}

/// Distance along `dir` (unit length) to the first intersection with a
/// sphere, `Some(0)` when `origin` is already inside, `None` on a miss.
pub fn ray_sphere_entry(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let oc = origin - center;
    let c = oc.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let b = oc.dot(dir);
    let disc = b * b - c;
    if b > 0.0 || disc < 0.0 {
        return None;
    }
    Some(-b - disc.sqrt())
}

/// March one ray. `jitter` in `[0, 1)` offsets the start by part of a step.
pub fn march(origin: Vec3, dir: Vec3, time: f32, jitter: f32, params: &VolumeParams) -> RayMarchSample {
    let Some(entry) = ray_sphere_entry(origin, dir, params.center, params.bound_radius) else {
        return RayMarchSample::EMPTY;
    };

    let horizon = params.event_horizon();
    let disk_inner = params.disk_inner_radius();

    let mut p = origin + dir * entry;
    p += dir * params.step_size((p - params.center).length()) * jitter * params.jitter;

    let mut color = Vec3::ZERO;
    let mut density = 0.0_f32;

    for _ in 0..params.max_steps {
        p += dir * params.step_size((p - params.center).length());
        let q = p - params.center;
        let dist = q.length();

        if dist < horizon {
            return RayMarchSample {
                color: Vec3::ZERO,
                density: HORIZON_DENSITY,
                hit_horizon: true,
            };
        }

        let dist_y = q.y.abs();
        let radial = Vec2::new(q.x, q.z);
        let dist_r = radial.length();

        let jet_width = params.jet_base_width + dist_y * params.jet_spread;
        if dist_r < jet_width && dist_y > params.jet_min_height {
            let core = (1.0 - dist_r / jet_width).powi(2);
            let mut noise_pos = q * params.jet_noise_scale;
            noise_pos.y -= time * params.jet_speed * q.y.signum();
            let attenuation = 1.0 / (1.0 + dist_y * params.jet_height_falloff);

            let step = core * fbm(noise_pos) * attenuation * params.jet_weight;
            color += params.jet_color * step * (1.0 - density.min(1.0));
            density += step;
        }

        if dist_r < params.disk_radius && dist_r > disk_inner && dist_y < params.disk_half_thickness {
            let shape = (1.0 - smoothstep(disk_inner, params.disk_radius, dist_r))
                * (-dist_y * params.disk_falloff).exp();

            let angle = q.z.atan2(q.x) + time * params.disk_rotation_speed;
            let mut noise_pos = p * params.disk_noise_scale;
            noise_pos.x += angle.cos();
            noise_pos.z += angle.sin();
            let plasma_noise = fbm(noise_pos + Vec3::splat(time));

            let doppler = 1.0 + params.doppler_strength * (radial / dist_r).dot(params.doppler_axis);
            let plasma = params.disk_color * shape * plasma_noise * 4.0
                + params.disk_core_color * shape.powi(4);

            let step = shape * params.disk_weight * doppler;
            color += plasma * step * (1.0 - density.min(1.0));
            density += step;
        }

        if density >= SATURATION || dist > params.exit_radius {
            break;
        }
    }

    RayMarchSample {
        color,
        density,
        hit_horizon: false,
    }
}

/// Soft tone map `c / (1 + c)`, per channel.
pub fn tone_map(c: Vec3) -> Vec3 {
    c / (Vec3::ONE + c)
}

/// Tone map, gamma, bloom, vignette, dither and the capture blackout.
///
/// `frag` is the pixel position (top-left origin), `resolution` the target
/// size. Returns straight (non-premultiplied) RGBA.
pub fn post_process(
    sample: &RayMarchSample,
    frag: Vec2,
    resolution: Vec2,
    capture_progress: f32,
    params: &VolumeParams,
) -> Vec4 {
    let coverage = smoothstep(0.0, 0.2, sample.density);
    let alpha = coverage * (1.0 - capture_progress);

    if sample.hit_horizon {
        return Vec4::new(0.0, 0.0, 0.0, alpha);
    }

    let mapped = tone_map(sample.color);
    let mut color = Vec3::new(
        mapped.x.powf(params.gamma),
        mapped.y.powf(params.gamma),
        mapped.z.powf(params.gamma),
    );

    let luma = color.dot(LUMA);
    color += color * smoothstep(params.bloom_threshold, 1.0, luma) * params.bloom_strength;

    let aspect = resolution.x / resolution.y.max(1.0);
    let centered = (frag / resolution.max(Vec2::ONE) - Vec2::splat(0.5)) * Vec2::new(aspect, 1.0);
    color *= saturate(1.0 - params.vignette_strength * centered.length_squared());

    color += Vec3::splat((pixel_hash(frag + Vec2::splat(17.0)) - 0.5) * params.dither_amplitude);
    color = color.max(Vec3::ZERO) * (1.0 - capture_progress);

    color.extend(alpha)
}

/// Full per-pixel evaluation.
pub fn shade_pixel(
    origin: Vec3,
    dir: Vec3,
    frag: Vec2,
    resolution: Vec2,
    time: f32,
    capture_progress: f32,
    params: &VolumeParams,
) -> Vec4 {
    let sample = march(origin, dir, time, pixel_hash(frag), params);
    post_process(&sample, frag, resolution, capture_progress, params)
}

/// GPU copy of [`VolumeParams`], packed into `vec4`s.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VolumeUniform {
    /// xyz centre, w bounding radius
    pub center: [f32; 4],
    /// x horizon, y exit radius, z max steps, w jitter
    pub limits: [f32; 4],
    /// near step, far step, blend start, blend end
    pub steps: [f32; 4],
    /// base width, spread, min height, speed
    pub jet: [f32; 4],
    /// noise scale, height falloff, weight, unused
    pub jet_shape: [f32; 4],
    pub jet_color: [f32; 4],
    /// disk radius, inner radius, half thickness, falloff
    pub disk: [f32; 4],
    /// rotation speed, noise scale, weight, doppler strength
    pub disk_motion: [f32; 4],
    pub disk_color: [f32; 4],
    pub disk_core_color: [f32; 4],
    /// doppler axis xy, gamma, bloom threshold
    pub post: [f32; 4],
    /// bloom strength, vignette, dither, unused
    pub finish: [f32; 4],
}

impl VolumeUniform {
    pub fn from_params(params: &VolumeParams) -> Self {
        Self {
            center: params.center.extend(params.bound_radius).to_array(),
            limits: [
                params.event_horizon(),
                params.exit_radius,
                params.max_steps as f32,
                params.jitter,
            ],
            steps: [
                params.near_step,
                params.far_step,
                params.step_blend.x,
                params.step_blend.y,
            ],
            jet: [
                params.jet_base_width,
                params.jet_spread,
                params.jet_min_height,
                params.jet_speed,
            ],
            jet_shape: [
                params.jet_noise_scale,
                params.jet_height_falloff,
                params.jet_weight,
                0.0,
            ],
            jet_color: params.jet_color.extend(1.0).to_array(),
            disk: [
                params.disk_radius,
                params.disk_inner_radius(),
                params.disk_half_thickness,
                params.disk_falloff,
            ],
            disk_motion: [
                params.disk_rotation_speed,
                params.disk_noise_scale,
                params.disk_weight,
                params.doppler_strength,
            ],
            disk_color: params.disk_color.extend(1.0).to_array(),
            disk_core_color: params.disk_core_color.extend(1.0).to_array(),
            post: [
                params.doppler_axis.x,
                params.doppler_axis.y,
                params.gamma,
                params.bloom_threshold,
            ],
            finish: [
                params.bloom_strength,
                params.vignette_strength,
                params.dither_amplitude,
                0.0,
            ],
        }
    }
}
