//! Engine data structures: transforms, textures and the scene graph.
//!
//! - `transform` holds per-node position/rotation/scale and its GPU layout
//! - `texture` contains GPU texture wrapper and creation utilities
//! - `scene_graph` enables hierarchical scene organization

pub mod scene_graph;
pub mod texture;
pub mod transform;

/// Anything that can describe itself as a vertex buffer layout.
pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}
