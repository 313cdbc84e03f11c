//! Scene graph and hierarchical scene organization.
//!
//! A [`SceneGraph`] owns every node of a scene in one arena and hands out
//! [`NodeId`]s that are only meaningful inside that graph. Nodes form a
//! forest: the graph keeps an ordered list of roots, each node keeps an
//! ordered list of children, and children are drawn in that order.
//!
//! Once per frame [`SceneGraph::render_frame`] walks the forest depth first.
//! For every node it runs the node's update function, recomputes the local
//! and world matrices from the authoritative [`Transform`], draws the node if
//! it is renderable, then descends into its children. Nothing is cached
//! between frames except the last computed matrices, which are exposed for
//! inspection.

use std::time::Duration;

use cgmath::Matrix4;
use log::warn;

use crate::{
    data_structures::transform::Transform,
    render::{Renderable, RenderableHandle, Renderer},
};

/// Per-frame animation callback. Gets the node's own transform and the
/// elapsed time since the previous frame.
pub type UpdateFn = Box<dyn FnMut(&mut Transform, Duration)>;

/// Runs right before a renderable node is drawn, e.g. to bind extra
/// per-vertex data through [`Renderer::bind_attribute`].
pub type PreDrawHook = Box<dyn FnMut(&mut dyn Renderer, RenderableHandle) -> anyhow::Result<()>>;

/// Handle of a node inside one [`SceneGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("node {0:?} does not exist in this scene")]
    UnknownNode(NodeId),

    #[error("attaching {child:?} under {parent:?} would make {child:?} its own ancestor")]
    Cycle { parent: NodeId, child: NodeId },

    #[error("node {0:?} is already attached to the scene")]
    AlreadyAttached(NodeId),
}

/// Counters for one traversal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub visited: usize,
    pub updated: usize,
    pub drawn: usize,
    pub failed: usize,
}

struct Frame<'a> {
    dt: Duration,
    view: &'a Matrix4<f32>,
    projection: &'a Matrix4<f32>,
}

pub struct SceneNode {
    pub name: Option<String>,
    pub local: Transform,
    local_matrix: Matrix4<f32>,
    world_matrix: Matrix4<f32>,
    renderable: Option<Renderable>,
    update: Option<UpdateFn>,
    pre_draw: Vec<PreDrawHook>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    is_root: bool,
}

impl SceneNode {
    fn new(renderable: Option<Renderable>, local: Transform) -> Self {
        let matrix = local.to_matrix();
        Self {
            name: None,
            local,
            local_matrix: matrix,
            world_matrix: matrix,
            renderable,
            update: None,
            pre_draw: Vec::new(),
            parent: None,
            children: Vec::new(),
            is_root: false,
        }
    }

    pub fn renderable(&self) -> Option<&Renderable> {
        self.renderable.as_ref()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Local matrix as of the last traversal (or construction).
    pub fn local_matrix(&self) -> &Matrix4<f32> {
        &self.local_matrix
    }

    /// World matrix as of the last traversal (or construction).
    pub fn world_matrix(&self) -> &Matrix4<f32> {
        &self.world_matrix
    }

    pub fn has_update(&self) -> bool {
        self.update.is_some()
    }

    fn is_attached(&self) -> bool {
        self.is_root || self.parent.is_some()
    }
}

impl std::fmt::Debug for SceneNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneNode")
            .field("name", &self.name)
            .field("local", &self.local)
            .field("renderable", &self.renderable)
            .field("update", &self.update.is_some())
            .field("pre_draw", &self.pre_draw.len())
            .field("parent", &self.parent)
            .field("children", &self.children)
            .finish()
    }
}

/// Arena-backed forest of [`SceneNode`]s.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
    roots: Vec<NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached node. It takes part in traversal once it is added
    /// as a root or attached under another node.
    pub fn create_node(
        &mut self,
        renderable: Option<Renderable>,
        local: Option<Transform>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes
            .push(SceneNode::new(renderable, local.unwrap_or_default()));
        id
    }

    /// Shorthand for a non-renderable pivot node.
    pub fn create_group(&mut self, local: Transform) -> NodeId {
        self.create_node(None, Some(local))
    }

    pub fn add_root(&mut self, node: NodeId) -> Result<(), SceneError> {
        if self.get(node)?.is_attached() {
            return Err(SceneError::AlreadyAttached(node));
        }
        self.nodes[node.0].is_root = true;
        self.roots.push(node);
        Ok(())
    }

    /// Append `child` to `parent`'s children.
    ///
    /// Fails without touching the graph if either id is unknown, if `child`
    /// is `parent` or one of its ancestors, or if `child` already has a place
    /// in the scene.
    pub fn attach_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.get(parent)?;
        let child_node = self.get(child)?;
        if parent == child || self.is_ancestor(child, parent) {
            return Err(SceneError::Cycle { parent, child });
        }
        if child_node.is_attached() {
            return Err(SceneError::AlreadyAttached(child));
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    pub fn set_update_fn(
        &mut self,
        node: NodeId,
        update: impl FnMut(&mut Transform, Duration) + 'static,
    ) -> Result<(), SceneError> {
        self.get_mut(node)?.update = Some(Box::new(update));
        Ok(())
    }

    pub fn clear_update_fn(&mut self, node: NodeId) -> Result<(), SceneError> {
        self.get_mut(node)?.update = None;
        Ok(())
    }

    /// Hooks run in the order they were added.
    pub fn add_pre_draw_hook(
        &mut self,
        node: NodeId,
        hook: impl FnMut(&mut dyn Renderer, RenderableHandle) -> anyhow::Result<()> + 'static,
    ) -> Result<(), SceneError> {
        self.get_mut(node)?.pre_draw.push(Box::new(hook));
        Ok(())
    }

    pub fn set_name(&mut self, node: NodeId, name: impl Into<String>) -> Result<(), SceneError> {
        self.get_mut(node)?.name = Some(name.into());
        Ok(())
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name.as_deref() == Some(name))
            .map(NodeId)
    }

    pub fn node(&self, node: NodeId) -> Option<&SceneNode> {
        self.nodes.get(node.0)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children(&self, node: NodeId) -> Result<&[NodeId], SceneError> {
        Ok(&self.get(node)?.children)
    }

    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>, SceneError> {
        Ok(self.get(node)?.parent)
    }

    pub fn local_transform(&self, node: NodeId) -> Result<&Transform, SceneError> {
        Ok(&self.get(node)?.local)
    }

    pub fn local_transform_mut(&mut self, node: NodeId) -> Result<&mut Transform, SceneError> {
        Ok(&mut self.get_mut(node)?.local)
    }

    pub fn local_matrix(&self, node: NodeId) -> Result<Matrix4<f32>, SceneError> {
        Ok(self.get(node)?.local_matrix)
    }

    pub fn world_matrix(&self, node: NodeId) -> Result<Matrix4<f32>, SceneError> {
        Ok(self.get(node)?.world_matrix)
    }

    /// Whether `ancestor` lies on the parent chain above `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.nodes.get(node.0).and_then(|n| n.parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Update, transform and draw every root's subtree, in root order.
    pub fn render_frame(
        &mut self,
        renderer: &mut dyn Renderer,
        dt: Duration,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) -> FrameStats {
        let frame = Frame {
            dt,
            view,
            projection,
        };
        let mut stats = FrameStats::default();
        for i in 0..self.roots.len() {
            let root = self.roots[i];
            self.draw_graph(root, None, &frame, renderer, &mut stats);
        }
        stats
    }

    /// Like [`render_frame`](Self::render_frame) but over an explicit list of
    /// subtrees. Every id is checked before any node is touched.
    pub fn render_roots(
        &mut self,
        roots: &[NodeId],
        renderer: &mut dyn Renderer,
        dt: Duration,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) -> Result<FrameStats, SceneError> {
        roots.iter().try_for_each(|&id| self.get(id).map(|_| ()))?;
        let frame = Frame {
            dt,
            view,
            projection,
        };
        let mut stats = FrameStats::default();
        for &root in roots {
            let parent_world = self.nodes[root.0]
                .parent
                .map(|p| self.nodes[p.0].world_matrix);
            self.draw_graph(root, parent_world, &frame, renderer, &mut stats);
        }
        Ok(stats)
    }

    fn draw_graph(
        &mut self,
        id: NodeId,
        parent_world: Option<Matrix4<f32>>,
        frame: &Frame<'_>,
        renderer: &mut dyn Renderer,
        stats: &mut FrameStats,
    ) {
        stats.visited += 1;
        let node = &mut self.nodes[id.0];

        if let Some(update) = node.update.as_mut() {
            update(&mut node.local, frame.dt);
            stats.updated += 1;
        }

        node.local_matrix = node.local.to_matrix();
        node.world_matrix = match parent_world {
            Some(parent) => parent * node.local_matrix,
            None => node.local_matrix,
        };
        let world = node.world_matrix;

        if let Some(handle) = node.renderable.as_ref().map(|r| r.handle) {
            let hooks = node
                .pre_draw
                .iter_mut()
                .try_for_each(|hook| hook(&mut *renderer, handle));
            match hooks.and_then(|_| renderer.draw(handle, &world, frame.view, frame.projection)) {
                Ok(()) => stats.drawn += 1,
                Err(e) => {
                    renderer.discard_bindings();
                    warn!(
                        "skipping draw of node {:?} ({}): {:#}",
                        id,
                        node.name.as_deref().unwrap_or("unnamed"),
                        e
                    );
                    stats.failed += 1;
                }
            }
        }

        for i in 0..self.nodes[id.0].children.len() {
            let child = self.nodes[id.0].children[i];
            self.draw_graph(child, Some(world), frame, renderer, stats);
        }
    }

    fn get(&self, node: NodeId) -> Result<&SceneNode, SceneError> {
        self.nodes.get(node.0).ok_or(SceneError::UnknownNode(node))
    }

    fn get_mut(&mut self, node: NodeId) -> Result<&mut SceneNode, SceneError> {
        self.nodes.get_mut(node.0).ok_or(SceneError::UnknownNode(node))
    }
}

