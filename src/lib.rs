//! orrery
//!
//! Icosphere generation and a small scene graph for hierarchical, animated
//! scenes such as a solar system. Spheres are built by repeatedly splitting
//! the faces of an icosahedron and pushing the new vertices onto the unit
//! sphere. Scene nodes carry a local transform, an optional per-frame update
//! function and an optional mesh handle; a depth-first traversal composes
//! world matrices and forwards draws to a pluggable renderer.
//!
//! High-level modules
//! - `geometry`: meshes, base shapes and midpoint subdivision
//! - `data_structures`: transforms, the scene graph and GPU textures
//! - `render`: the renderer boundary and an in-memory recording renderer
//! - `camera`: view and projection matrices
//! - `context`: headless GPU device and offscreen targets
//! - `pipelines`: the wgpu renderer and its shader
//! - `resources`: mesh upload into GPU buffers
//! - `flow`: per-frame driver and frame clock
//!

pub mod camera;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod geometry;
pub mod pipelines;
pub mod render;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use data_structures::scene_graph::{FrameStats, NodeId, SceneError, SceneGraph};
pub use data_structures::transform::Transform;
pub use geometry::{GeometryError, Mesh, VertexAttribute};
pub use render::{HeadlessRenderer, Renderable, RenderableHandle, Renderer};
pub use wgpu;
