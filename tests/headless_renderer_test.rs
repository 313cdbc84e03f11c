use std::{sync::Arc, time::Duration};

use orrery::{
    HeadlessRenderer, Renderable, RenderableHandle, Renderer, SceneGraph, VertexAttribute,
    geometry::{self, DEFAULT_SPHERE_ITERATIONS},
    render::RenderCall,
};

use crate::common::test_utils::{identity, init_logger};
mod common;

#[test]
fn meshes_are_uploaded_once_and_drawn_every_frame() {
    init_logger();
    let mut renderer = HeadlessRenderer::new();
    let sphere = Arc::new(geometry::sphere(DEFAULT_SPHERE_ITERATIONS).unwrap());
    let renderable = Renderable::upload(&mut renderer, sphere.clone()).unwrap();

    let mut scene = SceneGraph::new();
    // both nodes share one mesh and one upload
    let a = scene.create_node(Some(renderable.clone()), None);
    let b = scene.create_node(Some(renderable), None);
    scene.add_root(a).unwrap();
    scene.add_root(b).unwrap();

    for _ in 0..3 {
        scene.render_frame(&mut renderer, Duration::from_millis(16), &identity(), &identity());
    }

    assert_eq!(renderer.uploaded(), 1);
    assert_eq!(
        renderer.calls()[0],
        RenderCall::Upload {
            handle: RenderableHandle::new(0),
            vertices: sphere.vertex_count(),
            triangles: 20 * 64,
        }
    );
    assert_eq!(renderer.draws().count(), 6);
}

#[test]
fn unknown_handles_and_bad_attributes_are_errors() {
    let mut renderer = HeadlessRenderer::new();
    let handle = renderer.upload(&geometry::quad()).unwrap();

    assert!(
        renderer
            .draw(RenderableHandle::new(7), &identity(), &identity(), &identity())
            .is_err()
    );
    assert!(
        renderer
            .bind_attribute(handle, &VertexAttribute::uv(vec![0.0; 2]))
            .is_err()
    );
    renderer
        .bind_attribute(handle, &VertexAttribute::uv(vec![0.0; 8]))
        .unwrap();
    assert!(matches!(
        renderer.calls().last(),
        Some(RenderCall::BindAttribute { .. })
    ));

    renderer.clear_calls();
    assert!(renderer.calls().is_empty());
    assert_eq!(renderer.uploaded(), 1);
}

#[test]
fn renderers_without_attribute_support_refuse_binding() {
    struct DrawOnly;
    impl Renderer for DrawOnly {
        fn upload(&mut self, _: &geometry::Mesh) -> anyhow::Result<RenderableHandle> {
            Ok(RenderableHandle::new(0))
        }

        fn draw(
            &mut self,
            _: RenderableHandle,
            _: &orrery::cgmath::Matrix4<f32>,
            _: &orrery::cgmath::Matrix4<f32>,
            _: &orrery::cgmath::Matrix4<f32>,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    let mut renderer = DrawOnly;
    let handle = renderer.upload(&geometry::quad()).unwrap();
    let err = renderer
        .bind_attribute(handle, &VertexAttribute::height(vec![0.0; 4]))
        .unwrap_err();
    assert!(err.to_string().contains("Height"));
}
