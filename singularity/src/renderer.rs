//! wgpu implementation of the rendering backend

use std::collections::HashMap;

use bytemuck::Zeroable;
use common::{GraphicsContext, MeshVertex, DEPTH_FORMAT};
use image::{imageops, RgbaImage};
use thiserror::Error;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;

use crate::backend::{DrawCall, DrawPolicy, FrameParams, MeshHandle, Primitive, RenderBackend, TextureHandle};
use crate::geometry::MeshData;
use crate::hud::{Hud, HudStatus};
use crate::volume::{VolumeParams, VolumeUniform};

/// Most draws a single frame may issue.
pub const MAX_DRAWS_PER_FRAME: usize = 256;

/// Vertices per star billboard.
const BILLBOARD_VERTICES: u32 = 6;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("shader or pipeline validation failed: {0}")]
    Shader(String),
    #[error("failed to acquire surface texture: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("frame issued {requested} draws, object buffer holds {capacity}")]
    CapacityExceeded { requested: usize, capacity: usize },
    #[error("unknown mesh handle {0}")]
    UnknownMesh(usize),
    #[error("unknown texture handle {0}")]
    UnknownTexture(usize),
}

/// Per-frame uniform
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniform {
    pub view_proj: [[f32; 4]; 4],
    pub eye_time: [f32; 4],
    pub light_capture: [f32; 4],
    pub resolution: [f32; 4],
}

impl FrameUniform {
    pub fn from_params(frame: &FrameParams) -> Self {
        Self {
            view_proj: (frame.projection * frame.view).to_cols_array_2d(),
            eye_time: frame.eye.extend(frame.time).to_array(),
            light_capture: frame.light_position.extend(frame.capture_progress).to_array(),
            resolution: [frame.resolution.x, frame.resolution.y, 0.0, 0.0],
        }
    }
}

/// Per-draw uniform, one slot per draw in a dynamic-offset buffer
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub kind: [u32; 4],
}

impl ObjectUniform {
    pub fn from_call(call: &DrawCall) -> Self {
        let object = &call.object;
        Self {
            model: object.model.to_cols_array_2d(),
            normal_matrix: object.model.inverse().transpose().to_cols_array_2d(),
            color: object.color.extend(1.0).to_array(),
            kind: [object.visual.shader_code(), 0, 0, 0],
        }
    }
}

fn align_to(size: u64, alignment: u64) -> u64 {
    size.div_ceil(alignment) * alignment
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
    handle: MeshHandle,
}

pub struct WgpuRenderer {
    gfx: GraphicsContext,
    pipelines: HashMap<(Primitive, DrawPolicy), wgpu::RenderPipeline>,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    object_buffer: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
    object_stride: u64,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    default_texture: wgpu::BindGroup,
    textures: Vec<wgpu::BindGroup>,
    meshes: Vec<GpuMesh>,
    depth_texture: wgpu::TextureView,
    pending: Vec<DrawCall>,
    hud: Hud,
    hud_status: HudStatus,
}

impl WgpuRenderer {
    pub fn new(gfx: GraphicsContext, volume: &VolumeParams) -> Result<Self, RendererError> {
        let device = &gfx.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });

        let frame_buffer = common::create_uniform_buffer(device, &FrameUniform::zeroed());
        let volume_buffer = common::create_uniform_buffer(device, &VolumeUniform::from_params(volume));

        let object_size = std::mem::size_of::<ObjectUniform>() as u64;
        let object_stride = align_to(
            object_size,
            device.limits().min_uniform_buffer_offset_alignment as u64,
        );
        let object_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Object Buffer"),
            size: object_stride * MAX_DRAWS_PER_FRAME as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_entry = |binding, visibility, dynamic, size| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: dynamic,
                min_binding_size: wgpu::BufferSize::new(size),
            },
            count: None,
        };
        let all_stages = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[
                uniform_entry(0, all_stages, false, std::mem::size_of::<FrameUniform>() as u64),
                uniform_entry(
                    1,
                    wgpu::ShaderStages::FRAGMENT,
                    false,
                    std::mem::size_of::<VolumeUniform>() as u64,
                ),
            ],
        });
        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Object Bind Group Layout"),
            entries: &[uniform_entry(0, all_stages, true, object_size)],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: volume_buffer.as_entire_binding(),
                },
            ],
        });
        let object_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Object Bind Group"),
            layout: &object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &object_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(object_size),
                }),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Surface Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &object_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let mut pipelines = HashMap::new();
        for primitive in [Primitive::Triangles, Primitive::Points] {
            for policy in DrawPolicy::ALL {
                let pipeline = create_pipeline(&gfx, &pipeline_layout, &shader, primitive, policy);
                pipelines.insert((primitive, policy), pipeline);
            }
        }

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(RendererError::Shader(error.to_string()));
        }

        let white = RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        let default_texture = upload_rgba(&gfx, &texture_layout, &sampler, &white);
        let depth_texture = common::create_depth_texture(device, gfx.size.width, gfx.size.height);
        let hud = Hud::new(&gfx);

        log::info!(
            "Renderer ready: {} pipelines, {}-byte object stride",
            pipelines.len(),
            object_stride
        );

        Ok(Self {
            gfx,
            pipelines,
            frame_buffer,
            frame_bind_group,
            object_buffer,
            object_bind_group,
            object_stride,
            texture_layout,
            sampler,
            default_texture,
            textures: Vec::new(),
            meshes: Vec::new(),
            depth_texture,
            pending: Vec::with_capacity(MAX_DRAWS_PER_FRAME),
            hud,
            hud_status: HudStatus::default(),
        })
    }

    pub fn gfx(&self) -> &GraphicsContext {
        &self.gfx
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.gfx.resize(new_size);
        self.depth_texture =
            common::create_depth_texture(&self.gfx.device, self.gfx.size.width, self.gfx.size.height);
    }

    /// Reconfigure the surface at its current size (after `Lost`/`Outdated`).
    pub fn reconfigure(&mut self) {
        self.resize(self.gfx.size);
    }

    pub fn set_hud_status(&mut self, status: HudStatus) {
        self.hud_status = status;
    }

    /// Forward a window event to the HUD. Returns true when it was consumed.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        self.hud.on_window_event(&self.gfx, event)
    }

    fn bind_group_for(&self, texture: Option<TextureHandle>) -> Result<&wgpu::BindGroup, RendererError> {
        match texture {
            None => Ok(&self.default_texture),
            Some(TextureHandle(id)) => self.textures.get(id).ok_or(RendererError::UnknownTexture(id)),
        }
    }
}

fn create_pipeline(
    gfx: &GraphicsContext,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    primitive: Primitive,
    policy: DrawPolicy,
) -> wgpu::RenderPipeline {
    let (entry_point, buffers, label) = match primitive {
        Primitive::Triangles => ("vs_mesh", [MeshVertex::LAYOUT], "Mesh Pipeline"),
        Primitive::Points => ("vs_star", [MeshVertex::INSTANCE_POSITION_LAYOUT], "Star Pipeline"),
    };

    gfx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point,
            buffers: &buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format: gfx.config.format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: policy.cull_faces.then_some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: policy.depth_write,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

/// Upload with a full box-filtered mip chain and wrap in a texture bind group.
fn upload_rgba(
    gfx: &GraphicsContext,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    image: &RgbaImage,
) -> wgpu::BindGroup {
    let (width, height) = image.dimensions();
    let mip_level_count = width.max(height).max(1).ilog2() + 1;

    let texture = gfx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Surface Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for level in 0..mip_level_count {
        let level_width = (width >> level).max(1);
        let level_height = (height >> level).max(1);
        let resized;
        let pixels = if level == 0 {
            image
        } else {
            resized = imageops::resize(image, level_width, level_height, imageops::FilterType::Triangle);
            &resized
        };

        gfx.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels.as_raw(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * level_width),
                rows_per_image: Some(level_height),
            },
            wgpu::Extent3d {
                width: level_width,
                height: level_height,
                depth_or_array_layers: 1,
            },
        );
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    gfx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Texture Bind Group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

impl RenderBackend for WgpuRenderer {
    type Error = RendererError;

    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle, Self::Error> {
        let handle = MeshHandle::for_mesh(self.meshes.len(), mesh);
        let vertex_buffer = common::create_vertex_buffer(&self.gfx.device, &mesh.vertices);
        let index_buffer = mesh
            .indices
            .as_deref()
            .map(|indices| common::create_index_buffer(&self.gfx.device, indices));

        log::debug!(
            "Uploaded mesh {} ({:?}, {} vertices, {} elements)",
            handle.id,
            handle.primitive,
            mesh.vertices.len(),
            handle.element_count
        );
        self.meshes.push(GpuMesh {
            vertex_buffer,
            index_buffer,
            handle,
        });
        Ok(handle)
    }

    fn upload_texture(&mut self, image: &RgbaImage) -> Result<TextureHandle, Self::Error> {
        let bind_group = upload_rgba(&self.gfx, &self.texture_layout, &self.sampler, image);
        self.textures.push(bind_group);
        Ok(TextureHandle(self.textures.len() - 1))
    }

    fn begin_frame(&mut self, frame: &FrameParams) -> Result<(), Self::Error> {
        self.pending.clear();
        self.gfx.queue.write_buffer(
            &self.frame_buffer,
            0,
            bytemuck::bytes_of(&FrameUniform::from_params(frame)),
        );
        Ok(())
    }

    fn draw(&mut self, call: DrawCall) {
        self.pending.push(call);
    }

    fn end_frame(&mut self) -> Result<(), Self::Error> {
        let draws = std::mem::take(&mut self.pending);
        if draws.len() > MAX_DRAWS_PER_FRAME {
            return Err(RendererError::CapacityExceeded {
                requested: draws.len(),
                capacity: MAX_DRAWS_PER_FRAME,
            });
        }

        let stride = self.object_stride as usize;
        let mut staging = vec![0u8; stride * draws.len()];
        for (slot, call) in staging.chunks_exact_mut(stride).zip(&draws) {
            let uniform = ObjectUniform::from_call(call);
            let bytes = bytemuck::bytes_of(&uniform);
            slot[..bytes.len()].copy_from_slice(bytes);
        }
        if !staging.is_empty() {
            self.gfx.queue.write_buffer(&self.object_buffer, 0, &staging);
        }

        let output = self.gfx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_bind_group(0, &self.frame_bind_group, &[]);
            for (slot, call) in draws.iter().enumerate() {
                let mesh = self
                    .meshes
                    .get(call.mesh.id)
                    .ok_or(RendererError::UnknownMesh(call.mesh.id))?;
                let texture = self.bind_group_for(call.texture)?;
                let pipeline = &self.pipelines[&(mesh.handle.primitive, call.policy)];
                let offset = (slot * stride) as wgpu::DynamicOffset;

                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(1, &self.object_bind_group, &[offset]);
                render_pass.set_bind_group(2, texture, &[]);
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));

                match (mesh.handle.primitive, &mesh.index_buffer) {
                    (Primitive::Points, _) => {
                        render_pass.draw(0..BILLBOARD_VERTICES, 0..mesh.handle.element_count);
                    }
                    (Primitive::Triangles, Some(index_buffer)) => {
                        render_pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                        render_pass.draw_indexed(0..mesh.handle.element_count, 0, 0..1);
                    }
                    (Primitive::Triangles, None) => {
                        render_pass.draw(0..mesh.handle.element_count, 0..1);
                    }
                }
            }
        }

        self.hud.paint(&self.gfx, &mut encoder, &view, &self.hud_status);

        self.gfx.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
