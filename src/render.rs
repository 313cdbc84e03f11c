//! The boundary between the scene graph and whatever draws it.
//!
//! The scene graph never talks to a graphics API. It holds
//! [`RenderableHandle`]s handed out by a [`Renderer`] at construction time and
//! gets the renderer passed back in on every frame.
//!
//! # Key types
//!
//! - [`Renderer`] is the adapter trait: upload once, draw every frame
//! - [`Renderable`] pairs a shared [`Mesh`] with the handle it was uploaded as
//! - [`HeadlessRenderer`] records every call and never touches a GPU
//!

use std::sync::Arc;

use cgmath::Matrix4;

use crate::geometry::{Mesh, VertexAttribute};

/// Opaque id of a mesh that a [`Renderer`] has already uploaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderableHandle(pub(crate) u32);

impl RenderableHandle {
    /// For [`Renderer`] implementations outside this crate.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Adapter for the graphics backend.
///
/// Implementations own all GPU-side resources. Errors are returned as-is; the
/// caller decides whether to log and skip.
pub trait Renderer {
    /// Make `mesh` drawable. Called once per mesh, at scene construction.
    fn upload(&mut self, mesh: &Mesh) -> anyhow::Result<RenderableHandle>;

    /// Draw a previously uploaded mesh with the given matrices.
    fn draw(
        &mut self,
        handle: RenderableHandle,
        world: &Matrix4<f32>,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) -> anyhow::Result<()>;

    /// Replace or add one per-vertex stream for the next [`draw`](Self::draw)
    /// of `handle` only.
    ///
    /// Pre-draw hooks use this for auxiliary data the node itself doesn't carry.
    /// Other nodes sharing the mesh keep drawing the uploaded streams.
    fn bind_attribute(
        &mut self,
        handle: RenderableHandle,
        attribute: &VertexAttribute,
    ) -> anyhow::Result<()> {
        let _ = handle;
        anyhow::bail!("this renderer can't bind {:?} attributes", attribute.kind)
    }

    /// Drop streams bound since the last draw. Called when that draw is skipped.
    fn discard_bindings(&mut self) {}
}

/// A mesh plus the handle a renderer gave it.
///
/// Cloning is cheap; clones share the same mesh and GPU resources.
#[derive(Clone, Debug)]
pub struct Renderable {
    pub mesh: Arc<Mesh>,
    pub handle: RenderableHandle,
}

impl Renderable {
    pub fn upload(renderer: &mut dyn Renderer, mesh: Arc<Mesh>) -> anyhow::Result<Self> {
        let handle = renderer.upload(&mesh)?;
        Ok(Self { mesh, handle })
    }
}

/// One call observed by a [`HeadlessRenderer`].
#[derive(Clone, Debug, PartialEq)]
pub enum RenderCall {
    Upload {
        handle: RenderableHandle,
        vertices: usize,
        triangles: usize,
    },
    Draw {
        handle: RenderableHandle,
        world: Matrix4<f32>,
        view: Matrix4<f32>,
        projection: Matrix4<f32>,
    },
    BindAttribute {
        handle: RenderableHandle,
        attribute: VertexAttribute,
    },
}

/// Renderer that only records. Used by tests and by hosts without a GPU.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    meshes: Vec<(usize, usize)>,
    calls: Vec<RenderCall>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[RenderCall] {
        &self.calls
    }

    pub fn draws(&self) -> impl Iterator<Item = (RenderableHandle, &Matrix4<f32>)> {
        self.calls.iter().filter_map(|call| match call {
            RenderCall::Draw { handle, world, .. } => Some((*handle, world)),
            _ => None,
        })
    }

    pub fn uploaded(&self) -> usize {
        self.meshes.len()
    }

    /// Forget recorded calls but keep uploaded meshes, e.g. between frames.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
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

impl Renderer for HeadlessRenderer {
    fn upload(&mut self, mesh: &Mesh) -> anyhow::Result<RenderableHandle> {
        let handle = RenderableHandle(self.meshes.len() as u32);
        self.meshes.push((mesh.vertex_count(), mesh.triangle_count()));
        self.calls.push(RenderCall::Upload {
            handle,
            vertices: mesh.vertex_count(),
            triangles: mesh.triangle_count(),
        });
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
        self.calls.push(RenderCall::Draw {
            handle,
            world: *world,
            view: *view,
            projection: *projection,
        });
        Ok(())
    }

    fn bind_attribute(
        &mut self,
        handle: RenderableHandle,
        attribute: &VertexAttribute,
    ) -> anyhow::Result<()> {
        self.check(handle)?;
        let (vertices, _) = self.meshes[handle.index()];
        if attribute.len() != vertices {
            anyhow::bail!(
                "{:?} attribute covers {} vertices, mesh has {}",
                attribute.kind,
                attribute.len(),
                vertices
            );
        }
        self.calls.push(RenderCall::BindAttribute {
            handle,
            attribute: attribute.clone(),
        });
        Ok(())
    }
}
