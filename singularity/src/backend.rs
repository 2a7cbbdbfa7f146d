//! The seam between the frame driver and whatever puts pixels on screen

use glam::{Mat4, Vec2, Vec3};
use image::RgbaImage;

use crate::geometry::MeshData;
use crate::scene::VisualType;

/// Primitive assembly for a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Triangles,
    Points,
}

/// Per-draw depth and culling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawPolicy {
    pub depth_write: bool,
    pub cull_faces: bool,
}

impl DrawPolicy {
    /// Regular depth-tested, back-face-culled geometry.
    pub const SOLID: Self = Self {
        depth_write: true,
        cull_faces: true,
    };

    /// Screen-space overlay volumes: visible from inside and never occluding.
    pub const VOLUME: Self = Self {
        depth_write: false,
        cull_faces: false,
    };

    pub const ALL: [Self; 4] = [
        Self::SOLID,
        Self::VOLUME,
        Self {
            depth_write: true,
            cull_faces: false,
        },
        Self {
            depth_write: false,
            cull_faces: true,
        },
    ];
}

/// Uploaded geometry. Cheap to copy; every object of the same shape shares one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshHandle {
    pub id: usize,
    pub element_count: u32,
    pub primitive: Primitive,
}

impl MeshHandle {
    pub fn for_mesh(id: usize, mesh: &MeshData) -> Self {
        Self {
            id,
            element_count: mesh.element_count(),
            primitive: mesh.primitive,
        }
    }
}

/// Uploaded 2D texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureHandle(pub usize);

/// Values shared by every draw in a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub view: Mat4,
    pub projection: Mat4,
    pub eye: Vec3,
    pub light_position: Vec3,
    pub resolution: Vec2,
    pub time: f32,
    pub capture_progress: f32,
}

/// Per-object values for one draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectParams {
    pub model: Mat4,
    pub color: Vec3,
    pub visual: VisualType,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub mesh: MeshHandle,
    pub texture: Option<TextureHandle>,
    pub object: ObjectParams,
    pub policy: DrawPolicy,
}

/// Rendering backend the frame driver submits to.
///
/// Resources are created once at startup; per frame the driver calls
/// `begin_frame`, one `draw` per scene object, then `end_frame`.
pub trait RenderBackend {
    type Error: std::error::Error + Send + Sync + 'static;

    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle, Self::Error>;

    fn upload_texture(&mut self, image: &RgbaImage) -> Result<TextureHandle, Self::Error>;

    fn begin_frame(&mut self, frame: &FrameParams) -> Result<(), Self::Error>;

    fn draw(&mut self, call: DrawCall);

    fn end_frame(&mut self) -> Result<(), Self::Error>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records everything it is asked to do.
    #[derive(Default)]
    pub struct RecordingBackend {
        pub meshes: Vec<MeshHandle>,
        pub textures: Vec<(u32, u32)>,
        pub frames: Vec<FrameParams>,
        pub draws: Vec<DrawCall>,
        pub frames_ended: usize,
        in_frame: bool,
    }

    impl RenderBackend for RecordingBackend {
        type Error = std::convert::Infallible;

        fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle, Self::Error> {
            let handle = MeshHandle::for_mesh(self.meshes.len(), mesh);
            self.meshes.push(handle);
            Ok(handle)
        }

        fn upload_texture(&mut self, image: &RgbaImage) -> Result<TextureHandle, Self::Error> {
            self.textures.push(image.dimensions());
            Ok(TextureHandle(self.textures.len() - 1))
        }

        fn begin_frame(&mut self, frame: &FrameParams) -> Result<(), Self::Error> {
            assert!(!self.in_frame, "begin_frame called twice");
            self.in_frame = true;
            self.frames.push(*frame);
            Ok(())
        }

        fn draw(&mut self, call: DrawCall) {
            assert!(self.in_frame, "draw outside of a frame");
            self.draws.push(call);
        }

        fn end_frame(&mut self) -> Result<(), Self::Error> {
            assert!(self.in_frame, "end_frame without begin_frame");
            self.in_frame = false;
            self.frames_ended += 1;
            Ok(())
        }
    }
}
