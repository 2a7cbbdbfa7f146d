//! First-person camera for the fly-through

use glam::{Mat4, Vec3};

/// Pitch limit applied by mouse-look, just short of straight up/down.
pub const PITCH_LIMIT: f32 = 1.4;

/// Position plus yaw/pitch orientation.
///
/// Yaw 0 looks down +Z; increasing yaw turns toward +X.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
}

impl CameraState {
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        Self { position, yaw, pitch }
    }

    /// Full look direction including pitch.
    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.cos() * self.pitch.cos(),
        )
    }

    /// Horizontal forward used for walking.
    pub fn ground_forward(&self) -> Vec3 {
        Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }

    /// Horizontal right-hand vector (`ground_forward × up`).
    pub fn ground_right(&self) -> Vec3 {
        Vec3::new(-self.yaw.cos(), 0.0, self.yaw.sin())
    }

    /// Turn by the given deltas, clamping pitch.
    pub fn look(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        self.pitch = (self.pitch + delta_pitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Horizontal distance from this camera to a vertical axis through `axis`.
    pub fn horizontal_distance_to(&self, axis: Vec3) -> f32 {
        let dx = self.position.x - axis.x;
        let dz = self.position.z - axis.z;
        (dx * dx + dz * dz).sqrt()
    }

    /// View matrix with the eye displaced by `eye_offset` (camera shake).
    pub fn view_matrix(&self, eye_offset: Vec3) -> Mat4 {
        let eye = self.position + eye_offset;
        Mat4::look_at_rh(eye, eye + self.forward(), Vec3::Y)
    }
}

/// Perspective projection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Projection {
    pub fn matrix(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect_ratio.max(1e-3), self.near, self.far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn yaw_pi_faces_negative_z() {
        let camera = CameraState::new(Vec3::ZERO, PI, 0.0);
        let f = camera.forward();
        assert!(f.x.abs() < 1e-6);
        assert!((f.z + 1.0).abs() < 1e-6);
        let r = camera.ground_right();
        assert!((r.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn right_is_perpendicular_to_forward() {
        let camera = CameraState::new(Vec3::ZERO, 0.7, 0.0);
        assert!(camera.ground_forward().dot(camera.ground_right()).abs() < 1e-6);
        let cross = camera.ground_forward().cross(Vec3::Y);
        assert!((cross - camera.ground_right()).length() < 1e-6);
    }

    #[test]
    fn look_clamps_pitch() {
        let mut camera = CameraState::new(Vec3::ZERO, 0.0, 0.0);
        camera.look(0.5, 10.0);
        assert_eq!(camera.pitch, PITCH_LIMIT);
        assert_eq!(camera.yaw, 0.5);
        camera.look(0.0, -20.0);
        assert_eq!(camera.pitch, -PITCH_LIMIT);
    }

    #[test]
    fn view_matrix_moves_eye_to_origin() {
        let camera = CameraState::new(Vec3::new(1.0, 2.0, 3.0), 0.3, 0.1);
        let view = camera.view_matrix(Vec3::ZERO);
        let eye = view.transform_point3(camera.position);
        assert!(eye.length() < 1e-5);
        // The look direction maps onto -Z in view space.
        let ahead = view.transform_point3(camera.position + camera.forward());
        assert!((ahead - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn horizontal_distance_ignores_height() {
        let camera = CameraState::new(Vec3::new(3.0, 100.0, 4.0), 0.0, 0.0);
        assert!((camera.horizontal_distance_to(Vec3::new(0.0, 3.5, 0.0)) - 5.0).abs() < 1e-6);
    }
}
