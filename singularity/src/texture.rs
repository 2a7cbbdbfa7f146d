//! Procedural mottled rock texture for the asteroids

use image::{Rgba, RgbaImage};
use rand::Rng;

/// Edge length the blot/speckle sizes below are tuned for.
pub const REFERENCE_SIZE: u32 = 256;

const BASE_GREY: u8 = 0x44;
const BLOT_COUNT: usize = 400;
const BLOT_MIN_RADIUS: f32 = 2.0;
const BLOT_RADIUS_RANGE: f32 = 10.0;
const BLOT_MAX_ALPHA: f32 = 0.3;
const SPECKLE_COUNT: usize = 200;
const SPECKLE_MAX_SIZE: f32 = 4.0;
const SPECKLE_GREY: f32 = 200.0;
const SPECKLE_MAX_ALPHA: f32 = 0.2;

/// Grey base, dark translucent craters, faint light mineral glints.
///
/// The result is fully opaque; alpha only matters while compositing.
pub fn generate_rock_texture<R: Rng + ?Sized>(size: u32, rng: &mut R) -> RgbaImage {
    let size = size.max(1);
    let scale = size as f32 / REFERENCE_SIZE as f32;
    let mut image = RgbaImage::from_pixel(size, size, Rgba([BASE_GREY, BASE_GREY, BASE_GREY, 255]));

    for _ in 0..BLOT_COUNT {
        let cx = rng.gen::<f32>() * size as f32;
        let cy = rng.gen::<f32>() * size as f32;
        let radius = (rng.gen::<f32>() * BLOT_RADIUS_RANGE + BLOT_MIN_RADIUS) * scale;
        let alpha = rng.gen::<f32>() * BLOT_MAX_ALPHA;
        fill_disc(&mut image, cx, cy, radius, 0.0, alpha);
    }

    for _ in 0..SPECKLE_COUNT {
        let x = rng.gen::<f32>() * size as f32;
        let y = rng.gen::<f32>() * size as f32;
        let side = rng.gen::<f32>() * SPECKLE_MAX_SIZE * scale;
        let alpha = rng.gen::<f32>() * SPECKLE_MAX_ALPHA;
        fill_square(&mut image, x, y, side, SPECKLE_GREY, alpha);
    }

    image
}

fn blend(pixel: &mut Rgba<u8>, grey: f32, alpha: f32) {
    for channel in pixel.0.iter_mut().take(3) {
        let mixed = grey * alpha + *channel as f32 * (1.0 - alpha);
        *channel = mixed.round().clamp(0.0, 255.0) as u8;
    }
}

/// Pixels whose centres fall inside the disc.
fn fill_disc(image: &mut RgbaImage, cx: f32, cy: f32, radius: f32, grey: f32, alpha: f32) {
    let (width, height) = image.dimensions();
    let x0 = (cx - radius).floor().max(0.0) as u32;
    let y0 = (cy - radius).floor().max(0.0) as u32;
    let x1 = ((cx + radius).ceil() as u32).min(width);
    let y1 = ((cy + radius).ceil() as u32).min(height);

    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= radius * radius {
                blend(image.get_pixel_mut(x, y), grey, alpha);
            }
        }
    }
}

/// Pixels whose centres fall inside `[x, x + side) × [y, y + side)`.
fn fill_square(image: &mut RgbaImage, x: f32, y: f32, side: f32, grey: f32, alpha: f32) {
    let (width, height) = image.dimensions();
    for py in (y.floor() as u32)..((y + side).ceil() as u32).min(height) {
        for px in (x.floor() as u32)..((x + side).ceil() as u32).min(width) {
            let (fx, fy) = (px as f32 + 0.5, py as f32 + 0.5);
            if fx >= x && fx < x + side && fy >= y && fy < y + side {
                blend(image.get_pixel_mut(px, py), grey, alpha);
            }
        }
    }
}
