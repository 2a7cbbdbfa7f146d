//! Headless CPU render of the black hole volume

use common::CameraState;
use glam::{Vec2, Vec3};
use image::{Rgba, RgbaImage};

use crate::animation::projection;
use crate::config::SceneConfig;
use crate::volume::shade_pixel;

/// World-space view ray through the centre of pixel `(x, y)`.
fn pixel_ray(camera: &CameraState, fov_y: f32, width: u32, height: u32, x: u32, y: u32) -> Vec3 {
    let forward = camera.forward();
    let right = forward.cross(Vec3::Y).normalize_or_zero();
    let up = right.cross(forward);

    let aspect = width as f32 / height.max(1) as f32;
    let half = (fov_y * 0.5).tan();
    let ndc_x = (x as f32 + 0.5) / width as f32 * 2.0 - 1.0;
    let ndc_y = 1.0 - (y as f32 + 0.5) / height as f32 * 2.0;

    (forward + right * ndc_x * half * aspect + up * ndc_y * half).normalize()
}

/// Ray-march every pixel on the CPU and composite over black.
///
/// Pixels whose rays miss the bounding sphere stay black.
pub fn render_volume_snapshot(
    camera: &CameraState,
    config: &SceneConfig,
    width: u32,
    height: u32,
    time: f32,
    capture_progress: f32,
) -> RgbaImage {
    let fov_y = projection(config, capture_progress).fov_y;
    let resolution = Vec2::new(width as f32, height as f32);

    RgbaImage::from_fn(width, height, |x, y| {
        let dir = pixel_ray(camera, fov_y, width, height, x, y);
        let frag = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
        let shaded = shade_pixel(
            camera.position,
            dir,
            frag,
            resolution,
            time,
            capture_progress,
            &config.volume,
        );
        let rgb = shaded.truncate() * shaded.w;
        let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgba([to_byte(rgb.x), to_byte(rgb.y), to_byte(rgb.z), 255])
    })
}
