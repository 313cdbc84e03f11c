use std::time::Duration;

use cgmath::Matrix4;

use crate::{
    camera::{Camera, Projection},
    data_structures::texture::Texture,
};

/// GPU device plus an offscreen colour and depth target.
///
/// There is no window: frames are rendered into [`Context::color_target`]
/// and can be copied back with [`Context::read_pixels`].
#[derive(Debug)]
pub struct Context {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub color_target: Texture,
    pub(crate) depth_texture: Texture,
    pub clear_colour: wgpu::Color,
    pub camera: Camera,
    pub projection: Projection,
    size: [u32; 2],
}

impl Context {
    pub async fn new_headless(width: u32, height: u32) -> anyhow::Result<Self> {
        let size = [width.max(1), height.max(1)];

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;
        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("orrery device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: Default::default(),
                ..Default::default()
            })
            .await?;

        let color_target = Texture::create_color_target(&device, size, "color_target");
        let depth_texture = Texture::create_depth_texture(&device, size, "depth_texture");
        let projection = Projection::new(size[0], size[1], cgmath::Deg(45.0), 0.1, 10_000.0);

        Ok(Self {
            device,
            queue,
            color_target,
            depth_texture,
            clear_colour: wgpu::Color::BLACK,
            camera: Camera::default(),
            projection,
            size,
        })
    }

    /// Apply user setup (camera placement, clear colour) before the first frame.
    pub fn configure(&mut self, setup: impl FnOnce(&mut Context)) {
        setup(self);
    }

    /// Recreate both targets at the new size. Zero extents are clamped to one.
    pub fn resize(&mut self, width: u32, height: u32) {
        let size = [width.max(1), height.max(1)];
        if size == self.size {
            return;
        }
        self.size = size;
        self.color_target = Texture::create_color_target(&self.device, size, "color_target");
        self.depth_texture = Texture::create_depth_texture(&self.device, size, "depth_texture");
        self.projection.resize(size[0], size[1]);
    }

    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.camera.calc_matrix()
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        self.projection.calc_matrix()
    }

    /// Copy the colour target back to the CPU as tightly packed RGBA8 rows.
    pub async fn read_pixels(&self) -> anyhow::Result<Vec<u8>> {
        let [width, height] = self.size;
        let unpadded = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback"),
            size: u64::from(padded * height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &self.color_target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = futures::channel::oneshot::channel();
        let buffer_slice = output_buffer.slice(..);
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(Duration::from_secs(3)),
        })?;
        rx.await??;

        let data = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded * height) as usize);
        for row in data.chunks(padded as usize) {
            pixels.extend_from_slice(&row[..unpadded as usize]);
        }
        drop(data);
        output_buffer.unmap();
        Ok(pixels)
    }
}
