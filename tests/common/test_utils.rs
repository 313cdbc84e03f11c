use std::{cell::RefCell, collections::HashSet, rc::Rc, sync::Arc};

use orrery::{
    Mesh, NodeId, Renderable, RenderableHandle, Renderer, SceneGraph, Transform, VertexAttribute,
    cgmath::{Matrix4, SquareMatrix},
};

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) type CallLog = Rc<RefCell<Vec<String>>>;

pub(crate) fn call_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Renderer that writes `draw:<name>`, `bind:<name>` and `discard` into a shared log so
/// update functions and draws can be checked for their relative order.
pub(crate) struct RecordingRenderer {
    log: CallLog,
    names: Vec<String>,
    failing: HashSet<RenderableHandle>,
}

impl RecordingRenderer {
    pub(crate) fn new(log: CallLog) -> Self {
        Self {
            log,
            names: Vec::new(),
            failing: HashSet::new(),
        }
    }

    /// Upload `mesh` and remember `name` for the log entries of its draws.
    pub(crate) fn upload_named(&mut self, name: &str, mesh: Arc<Mesh>) -> Renderable {
        let renderable = Renderable::upload(self, mesh).expect("recording upload never fails");
        self.names[renderable.handle.index()] = name.to_string();
        renderable
    }

    pub(crate) fn fail_draws_of(&mut self, handle: RenderableHandle) {
        self.failing.insert(handle);
    }

    fn name(&self, handle: RenderableHandle) -> &str {
        self.names
            .get(handle.index())
            .map(String::as_str)
            .unwrap_or("?")
    }
}

impl Renderer for RecordingRenderer {
    fn upload(&mut self, _mesh: &Mesh) -> anyhow::Result<RenderableHandle> {
        let handle = RenderableHandle::new(self.names.len() as u32);
        self.names.push(format!("mesh{}", handle.index()));
        Ok(handle)
    }

    fn draw(
        &mut self,
        handle: RenderableHandle,
        _world: &Matrix4<f32>,
        _view: &Matrix4<f32>,
        _projection: &Matrix4<f32>,
    ) -> anyhow::Result<()> {
        if self.failing.contains(&handle) {
            self.log.borrow_mut().push(format!("fail:{}", self.name(handle)));
            anyhow::bail!("draw of {} rejected", self.name(handle));
        }
        self.log.borrow_mut().push(format!("draw:{}", self.name(handle)));
        Ok(())
    }

    fn bind_attribute(
        &mut self,
        handle: RenderableHandle,
        _attribute: &VertexAttribute,
    ) -> anyhow::Result<()> {
        self.log.borrow_mut().push(format!("bind:{}", self.name(handle)));
        Ok(())
    }

    fn discard_bindings(&mut self) {
        self.log.borrow_mut().push("discard".to_string());
    }
}

/// Create a named renderable node whose update function logs `update:<name>`.
pub(crate) fn logged_node(
    scene: &mut SceneGraph,
    renderer: &mut RecordingRenderer,
    log: &CallLog,
    name: &str,
    mesh: Arc<Mesh>,
) -> NodeId {
    let renderable = renderer.upload_named(name, mesh);
    let node = scene.create_node(Some(renderable), None);
    scene.set_name(node, name).unwrap();
    let log = log.clone();
    let entry = format!("update:{}", name);
    scene
        .set_update_fn(node, move |_: &mut Transform, _| log.borrow_mut().push(entry.clone()))
        .unwrap();
    node
}

pub(crate) fn identity() -> Matrix4<f32> {
    Matrix4::identity()
}

pub(crate) fn assert_on_unit_sphere(mesh: &Mesh, tolerance: f32) {
    for v in mesh.vertices() {
        let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        assert!(
            (len - 1.0).abs() < tolerance,
            "vertex {:?} has length {}",
            v,
            len
        );
    }
}

/// Run `body` against a headless GPU context, or skip when no adapter exists.
#[cfg(feature = "integration-tests")]
macro_rules! headless_gpu_test {
    ($width:expr, $height:expr, $body:expr) => {{
        crate::common::test_utils::init_logger();
        match futures::executor::block_on(orrery::context::Context::new_headless($width, $height)) {
            Ok(ctx) => ($body)(ctx),
            Err(e) => log::warn!("skipping GPU test, no adapter: {:#}", e),
        }
    }};
}
