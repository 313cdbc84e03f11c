//! Unlit pipeline and the wgpu implementation of [`Renderer`].
//!
//! [`BasicRenderer`] does not draw while the scene graph is traversed. Every
//! `draw` call only queues a model-view matrix. After traversal,
//! [`BasicRenderer::prepare`] writes all queued matrices into one instance
//! buffer and [`BasicRenderer::encode`] replays the queue into a render pass,
//! one instanced draw per scene node.
//!
//! Attributes bound by pre-draw hooks travel with the queued draw in their own
//! vertex buffer, so nodes sharing a mesh never see each other's streams.

use std::num::NonZeroU64;

use cgmath::{Matrix4, SquareMatrix};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        Vertex,
        texture::Texture,
        transform::TransformRaw,
    },
    geometry::{Mesh, VertexAttribute},
    render::{RenderableHandle, Renderer},
    resources::mesh::{GpuMesh, MeshVertex, apply_attribute},
};

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub projection: [[f32; 4]; 4],
}

pub fn mk_camera_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(std::mem::size_of::<CameraUniform>() as u64),
            },
            count: None,
        }],
        label: Some("camera_bind_group_layout"),
    })
}

pub fn mk_basic_pipeline(
    device: &wgpu::Device,
    color_format: wgpu::TextureFormat,
    camera_bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Basic Pipeline Layout"),
        bind_group_layouts: &[Some(camera_bind_group_layout)],
        immediate_size: 0,
    });

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Basic Shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("basic.wgsl").into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Basic Pipeline"),
        layout: Some(&render_pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[MeshVertex::desc(), TransformRaw::desc()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        // spheres are closed, back faces never show
        primitive: wgpu::PrimitiveState {
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_FORMAT,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::Less),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
    })
}

/// One node's draw, waiting for [`BasicRenderer::encode`].
struct QueuedDraw {
    handle: RenderableHandle,
    instance: TransformRaw,
    /// Replaces the mesh's own vertex buffer for this draw only.
    vertices: Option<wgpu::Buffer>,
}

/// GPU-backed renderer using [`mk_basic_pipeline`].
pub struct BasicRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    meshes: Vec<GpuMesh>,
    queued: Vec<QueuedDraw>,
    /// Vertices with hook-bound streams applied, for the next draw of the handle.
    pending: Option<(RenderableHandle, Vec<MeshVertex>)>,
    /// How many queued instances [`prepare`](Self::prepare) has uploaded.
    prepared: usize,
    projection: Matrix4<f32>,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
}

impl BasicRenderer {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, color_format: wgpu::TextureFormat) -> Self {
        let camera_bind_group_layout = mk_camera_bind_group_layout(device);
        let pipeline = mk_basic_pipeline(device, color_format, &camera_bind_group_layout);

        let camera_uniform = CameraUniform {
            projection: Matrix4::identity().into(),
        };
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });

        let instance_capacity = 16;
        let instance_buffer = mk_instance_buffer(device, instance_capacity);

        Self {
            device: device.clone(),
            queue: queue.clone(),
            pipeline,
            camera_buffer,
            camera_bind_group,
            meshes: Vec::new(),
            queued: Vec::new(),
            pending: None,
            prepared: 0,
            projection: Matrix4::identity(),
            instance_buffer,
            instance_capacity,
        }
    }

    pub fn mesh(&self, handle: RenderableHandle) -> Option<&GpuMesh> {
        self.meshes.get(handle.index())
    }

    /// Draws queued since the last [`encode`](Self::encode).
    pub fn queued(&self) -> usize {
        self.queued.len()
    }

    /// Upload the projection and every queued model-view matrix.
    ///
    /// The instance buffer grows when the frame has more draws than it holds.
    pub fn prepare(&mut self) {
        let uniform = CameraUniform {
            projection: self.projection.into(),
        };
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[uniform]));

        if self.queued.len() > self.instance_capacity {
            self.instance_capacity = self.queued.len().next_power_of_two();
            self.instance_buffer = mk_instance_buffer(&self.device, self.instance_capacity);
            log::debug!("instance buffer grown to {} entries", self.instance_capacity);
        }
        let raw: Vec<TransformRaw> = self.queued.iter().map(|draw| draw.instance).collect();
        if !raw.is_empty() {
            self.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&raw));
        }
        self.prepared = self.queued.len();
    }

    /// Record every queued draw into `render_pass` and clear the queue.
    ///
    /// Runs [`prepare`](Self::prepare) first if draws were queued since.
    pub fn encode(&mut self, render_pass: &mut wgpu::RenderPass<'_>) {
        if self.prepared != self.queued.len() {
            self.prepare();
        }
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
        render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        for (i, draw) in self.queued.iter().enumerate() {
            let mesh = &self.meshes[draw.handle.index()];
            let instance = i as u32;
            let vertices = draw.vertices.as_ref().unwrap_or(&mesh.vertex_buffer);
            render_pass.set_vertex_buffer(0, vertices.slice(..));
            render_pass.set_index_buffer(mesh.index_buffer.slice(..), mesh.index_format);
            render_pass.draw_indexed(0..mesh.num_elements, 0, instance..instance + 1);
        }
        self.queued.clear();
        self.prepared = 0;
    }

    fn check(&self, handle: RenderableHandle) -> anyhow::Result<()> {
        if handle.index() >= self.meshes.len() {
            anyhow::bail!(
                "unknown renderable {:?}, {} meshes uploaded",
                handle,
                self.meshes.len()
            );
        }
        Ok(())
    }
}

impl Renderer for BasicRenderer {
    fn upload(&mut self, mesh: &Mesh) -> anyhow::Result<RenderableHandle> {
        let handle = RenderableHandle(self.meshes.len() as u32);
        let name = format!("mesh {}", handle.index());
        self.meshes.push(GpuMesh::new(&self.device, mesh, &name));
        Ok(handle)
    }

    fn draw(
        &mut self,
        handle: RenderableHandle,
        world: &Matrix4<f32>,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) -> anyhow::Result<()> {
        self.check(handle)?;
        let vertices = match self.pending.take() {
            Some((bound, vertices)) if bound == handle => Some(
                self.meshes[handle.index()].vertex_buffer_with(&self.device, &vertices),
            ),
            _ => None,
        };
        self.projection = *projection;
        self.queued.push(QueuedDraw {
            handle,
            instance: TransformRaw::new(view, world),
            vertices,
        });
        Ok(())
    }

    fn bind_attribute(
        &mut self,
        handle: RenderableHandle,
        attribute: &VertexAttribute,
    ) -> anyhow::Result<()> {
        self.check(handle)?;
        let mut vertices = match self.pending.take() {
            Some((bound, vertices)) if bound == handle => vertices,
            _ => self.meshes[handle.index()].vertices.clone(),
        };
        apply_attribute(&mut vertices, attribute)?;
        self.pending = Some((handle, vertices));
        Ok(())
    }

    fn discard_bindings(&mut self) {
        self.pending = None;
    }
}

fn mk_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Instance Buffer"),
        size: (capacity * std::mem::size_of::<TransformRaw>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
