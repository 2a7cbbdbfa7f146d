//! Frame driver: startup resource creation and the per-frame update/draw
//!
//! The driver owns the [`World`] and is generic over the [`RenderBackend`]
//! so the whole update-and-submit sequence runs the same against the GPU and
//! against a recording double.

use glam::Vec2;
use rand::Rng;
use thiserror::Error;

use crate::animation::{camera_shake, projection, InputSnapshot, StepOutcome, World};
use crate::backend::{DrawCall, FrameParams, ObjectParams, RenderBackend};
use crate::config::SceneConfig;
use crate::geometry::{build_cube, build_starfield, parse_model, ModelError, ROCK_MODEL};
use crate::scene::{Scene, SceneResources};
use crate::texture::generate_rock_texture;

/// Fatal errors before the first frame.
#[derive(Debug, Error)]
pub enum SetupError<E: std::error::Error + 'static> {
    #[error("embedded rock model is malformed: {0}")]
    Model(#[from] ModelError),
    #[error("rendering backend rejected a startup resource: {0}")]
    Backend(#[source] E),
}

/// Drawable size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    pub fn resolution(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

/// Summary of one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub outcome: StepOutcome,
    pub capture_progress: f32,
    pub capturing: bool,
    pub draw_count: usize,
}

pub struct FrameDriver {
    config: SceneConfig,
    world: World,
}

impl FrameDriver {
    /// Generate and upload the shared meshes and texture, then lay out the
    /// scene around them.
    pub fn new<B, R>(config: SceneConfig, backend: &mut B, rng: &mut R) -> Result<Self, SetupError<B::Error>>
    where
        B: RenderBackend,
        R: Rng + ?Sized,
    {
        let rock_model = parse_model(ROCK_MODEL)?;
        let starfield = build_starfield(config.star_count, config.star_shell, rng);
        let rock_image = generate_rock_texture(config.texture_size, rng);

        let resources = SceneResources {
            cube: backend.upload_mesh(&build_cube()).map_err(SetupError::Backend)?,
            stars: backend.upload_mesh(&starfield).map_err(SetupError::Backend)?,
            rock: backend.upload_mesh(&rock_model).map_err(SetupError::Backend)?,
            rock_texture: backend.upload_texture(&rock_image).map_err(SetupError::Backend)?,
        };
        log::info!(
            "Uploaded {} stars, rock mesh with {} vertices, {}x{} rock texture",
            starfield.vertices.len(),
            rock_model.vertices.len(),
            rock_image.width(),
            rock_image.height()
        );

        let scene = Scene::build(&config, &resources, rng);
        let world = World::new(&config, scene);
        Ok(Self { config, world })
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Step the animation by `dt`, then submit one draw per scene object.
    pub fn frame<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        input: InputSnapshot,
        dt: f32,
        time: f32,
        viewport: Viewport,
    ) -> Result<FrameReport, B::Error> {
        let outcome = self.world.step(&self.config, input, dt, time);
        let capture = self.world.capture;

        let shake = camera_shake(outcome.proximity, capture.progress, time);
        let camera = &self.world.camera;
        let params = FrameParams {
            view: camera.view_matrix(shake),
            projection: projection(&self.config, capture.progress).matrix(viewport.aspect_ratio()),
            eye: camera.position + shake,
            light_position: self.config.light_position(time),
            resolution: viewport.resolution(),
            time,
            capture_progress: capture.progress,
        };

        backend.begin_frame(&params)?;
        let axis = self.config.black_hole_center();
        for object in &self.world.scene.objects {
            backend.draw(DrawCall {
                mesh: object.mesh,
                texture: object.texture,
                object: ObjectParams {
                    model: object.model_matrix(axis),
                    color: object.color,
                    visual: object.visual,
                },
                policy: object.visual.draw_policy(),
            });
        }
        backend.end_frame()?;

        Ok(FrameReport {
            outcome,
            capture_progress: capture.progress,
            capturing: capture.active,
            draw_count: self.world.scene.objects.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::RecordingBackend;
    use crate::backend::{DrawPolicy, MeshHandle, Primitive, TextureHandle};
    use crate::geometry::MeshData;
    use crate::scene::VisualType;
    use image::RgbaImage;
    use rand::{rngs::StdRng, SeedableRng};

    const VIEWPORT: Viewport = Viewport {
        width: 800,
        height: 600,
    };

    fn driver(config: SceneConfig, backend: &mut RecordingBackend) -> FrameDriver {
        FrameDriver::new(config, backend, &mut StdRng::seed_from_u64(11)).unwrap()
    }

    #[test]
    fn setup_uploads_shared_resources_once() {
        let mut backend = RecordingBackend::default();
        let driver = driver(SceneConfig::default(), &mut backend);

        assert_eq!(backend.meshes.len(), 3);
        assert_eq!(backend.textures, vec![(256, 256)]);
        assert_eq!(backend.meshes[1].primitive, Primitive::Points);
        assert_eq!(backend.meshes[1].element_count, 2800);
        assert!(backend.meshes[2].element_count > 0);
        assert_eq!(driver.world().camera, driver.config().spawn);
    }

    #[test]
    fn spawn_frame_draws_every_object_once() {
        let mut backend = RecordingBackend::default();
        let mut driver = driver(SceneConfig::default(), &mut backend);

        let report = driver
            .frame(&mut backend, InputSnapshot::default(), 0.0, 0.0, VIEWPORT)
            .unwrap();

        let objects = driver.world().scene.objects.len();
        assert_eq!(report.draw_count, objects);
        assert_eq!(backend.draws.len(), objects);
        assert_eq!(backend.frames_ended, 1);

        for (draw, object) in backend.draws.iter().zip(&driver.world().scene.objects) {
            assert_eq!(draw.object.visual, object.visual);
            if object.visual == VisualType::BlackHole {
                assert_eq!(draw.policy, DrawPolicy::VOLUME);
                assert!(!draw.policy.depth_write && !draw.policy.cull_faces);
            } else {
                assert_eq!(draw.policy, DrawPolicy::SOLID);
                assert!(draw.policy.depth_write && draw.policy.cull_faces);
            }
            assert_eq!(draw.texture.is_some(), object.visual == VisualType::Asteroid);
        }
    }

    #[test]
    fn frame_params_follow_the_camera() {
        let mut backend = RecordingBackend::default();
        let config = SceneConfig::default();
        let mut driver = driver(config.clone(), &mut backend);
        driver
            .frame(&mut backend, InputSnapshot::default(), 0.016, 1.0, VIEWPORT)
            .unwrap();

        let frame = backend.frames[0];
        assert!((frame.eye - config.spawn.position).length() <= 0.013);
        assert_eq!(frame.resolution, Vec2::new(800.0, 600.0));
        assert_eq!(frame.light_position, config.light_position(1.0));
        assert_eq!(frame.capture_progress, 0.0);
        assert_eq!(frame.projection, projection(&config, 0.0).matrix(800.0 / 600.0));
    }

    #[test]
    fn large_step_at_the_axis_completes_one_capture() {
        let mut backend = RecordingBackend::default();
        let config = SceneConfig::default();
        let mut driver = driver(config.clone(), &mut backend);
        let center = config.black_hole_center();
        driver.world_mut().camera.position = glam::Vec3::new(center.x, 2.0, center.z);

        let mut started = 0;
        let mut completed = 0;
        for i in 0..6 {
            let report = driver
                .frame(&mut backend, InputSnapshot::default(), 10.0, i as f32 * 10.0, VIEWPORT)
                .unwrap();
            started += report.outcome.capture_started as usize;
            completed += report.outcome.capture_completed as usize;
            if i == 0 {
                assert!(report.capturing);
            }
        }

        assert_eq!((started, completed), (1, 1));
        assert_eq!(driver.world().camera, config.spawn);
        assert!(!driver.world().capture.active);
        assert_eq!(backend.frames_ended, 6);
    }

    #[derive(Debug, Error)]
    #[error("texture memory exhausted")]
    struct OutOfTextures;

    #[derive(Default)]
    struct NoTextures(RecordingBackend);

    impl RenderBackend for NoTextures {
        type Error = OutOfTextures;

        fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle, Self::Error> {
            Ok(MeshHandle::for_mesh(self.0.meshes.len(), mesh))
        }

        fn upload_texture(&mut self, _image: &RgbaImage) -> Result<TextureHandle, Self::Error> {
            Err(OutOfTextures)
        }

        fn begin_frame(&mut self, _frame: &FrameParams) -> Result<(), Self::Error> {
            Ok(())
        }

        fn draw(&mut self, _call: DrawCall) {}

        fn end_frame(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn backend_failure_aborts_setup() {
        let mut backend = NoTextures::default();
        let result = FrameDriver::new(SceneConfig::default(), &mut backend, &mut StdRng::seed_from_u64(1));
        assert!(matches!(result, Err(SetupError::Backend(OutOfTextures))));
    }
}
