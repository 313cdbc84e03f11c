use wgpu::util::DeviceExt;

use crate::{
    data_structures::Vertex,
    geometry::{AttributeKind, Mesh, VertexAttribute},
};

/**
 * Interleaved vertex as uploaded to the GPU.
 *
 * Meshes without a colour stream are tinted by their position so that
 * untextured spheres still show their shape.
 */
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub color: [f32; 3],
}

impl Vertex for MeshVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Build the interleaved vertex list for `mesh`.
pub fn mesh_vertices(mesh: &Mesh) -> Vec<MeshVertex> {
    let uvs = mesh.attribute(&AttributeKind::Uv);
    let colors = mesh.attribute(&AttributeKind::Color);
    mesh.vertices()
        .iter()
        .enumerate()
        .map(|(i, &position)| MeshVertex {
            position,
            tex_coords: uvs.map_or([0.0; 2], |uv| [uv.get(i)[0], uv.get(i)[1]]),
            color: colors.map_or_else(
                || position.map(|c| c * 0.5 + 0.5),
                |color| [color.get(i)[0], color.get(i)[1], color.get(i)[2]],
            ),
        })
        .collect()
}

/// Copy one attribute stream into already interleaved vertices.
///
/// Only UV and colour streams have a slot in [`MeshVertex`].
pub fn apply_attribute(
    vertices: &mut [MeshVertex],
    attribute: &VertexAttribute,
) -> anyhow::Result<()> {
    if attribute.len() != vertices.len() {
        anyhow::bail!(
            "{:?} attribute covers {} vertices, mesh has {}",
            attribute.kind,
            attribute.len(),
            vertices.len()
        );
    }
    match (&attribute.kind, attribute.components) {
        (AttributeKind::Uv, 2) => vertices.iter_mut().enumerate().for_each(|(i, v)| {
            v.tex_coords = [attribute.get(i)[0], attribute.get(i)[1]];
        }),
        (AttributeKind::Color, 3) => vertices.iter_mut().enumerate().for_each(|(i, v)| {
            let c = attribute.get(i);
            v.color = [c[0], c[1], c[2]];
        }),
        (kind, components) => anyhow::bail!(
            "{:?} with {} components has no slot in the vertex layout",
            kind,
            components
        ),
    }
    Ok(())
}

/// Vertex and index buffers of one uploaded mesh.
///
/// The interleaved vertices stay on the CPU side as well so single draws can
/// swap in other attribute streams.
#[derive(Debug)]
pub struct GpuMesh {
    pub name: String,
    pub vertices: Vec<MeshVertex>,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_format: wgpu::IndexFormat,
    pub num_elements: u32,
}

impl GpuMesh {
    pub fn new(device: &wgpu::Device, mesh: &Mesh, name: &str) -> Self {
        let vertices = mesh_vertices(mesh);

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Buffer", name)),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        // 16-bit indices while every vertex is addressable, like WebGL1 would need
        let (index_format, index_bytes) = if mesh.vertex_count() <= u16::MAX as usize + 1 {
            let indices: Vec<u16> = mesh.indices().iter().map(|&i| i as u16).collect();
            (
                wgpu::IndexFormat::Uint16,
                bytemuck::cast_slice::<u16, u8>(&pad_to_four_bytes(indices)).to_vec(),
            )
        } else {
            (
                wgpu::IndexFormat::Uint32,
                bytemuck::cast_slice::<u32, u8>(mesh.indices()).to_vec(),
            )
        };

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Index Buffer", name)),
            contents: &index_bytes,
            usage: wgpu::BufferUsages::INDEX,
        });

        log::debug!(
            "uploaded {}: {} vertices, {} indices as {:?}",
            name,
            vertices.len(),
            mesh.indices().len(),
            index_format
        );

        Self {
            name: name.to_string(),
            vertices,
            vertex_buffer,
            index_buffer,
            index_format,
            num_elements: mesh.indices().len() as u32,
        }
    }

    /// Vertex buffer for one draw of this mesh with `vertices` in place of its own.
    ///
    /// The mesh's shared buffer is left as uploaded.
    pub fn vertex_buffer_with(&self, device: &wgpu::Device, vertices: &[MeshVertex]) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Vertex Override", self.name)),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        })
    }
}

// Buffer sizes must be a multiple of COPY_BUFFER_ALIGNMENT (4 bytes).
fn pad_to_four_bytes(mut indices: Vec<u16>) -> Vec<u16> {
    if indices.len() % 2 == 1 {
        indices.push(0);
    }
    indices
}
