//! Frame driver for the GPU path.
//!
//! One call to [`draw_frame`] renders one frame of a [`SceneGraph`] into the
//! offscreen target of a [`Context`]:
//! 1. Traverse the scene with the [`BasicRenderer`], which queues one draw per
//!    renderable node
//! 2. Upload the projection and the queued model-view matrices
//! 3. Clear colour and depth, replay the queue into a render pass
//! 4. Submit
//!
//! [`FrameClock`] measures the `dt` handed to update functions.

use std::iter;

use instant::{Duration, Instant};

use crate::{
    context::Context,
    data_structures::scene_graph::{FrameStats, SceneGraph},
    pipelines::basic::BasicRenderer,
};

/// Time elapsed between consecutive [`tick`](FrameClock::tick)s.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    last_time: Instant,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last_time: Instant::now(),
        }
    }

    /// Time since the previous tick (or since construction).
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let dt = now - self.last_time;
        self.last_time = now;
        dt
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

pub fn draw_frame(
    ctx: &Context,
    scene: &mut SceneGraph,
    renderer: &mut BasicRenderer,
    dt: Duration,
) -> anyhow::Result<FrameStats> {
    let view = ctx.view_matrix();
    let projection = ctx.projection_matrix();
    let stats = scene.render_frame(renderer, dt, &view, &projection);
    if stats.failed > 0 {
        log::warn!("{} of {} draws failed this frame", stats.failed, stats.failed + stats.drawn);
    }

    renderer.prepare();

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });
    {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &ctx.color_target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(ctx.clear_colour),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &ctx.depth_texture.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
        renderer.encode(&mut render_pass);
    }

    ctx.queue.submit(iter::once(encoder.finish()));
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_ticks_are_monotonic() {
        let mut clock = FrameClock::new();
        std::thread::sleep(Duration::from_millis(2));
        let first = clock.tick();
        assert!(first >= Duration::from_millis(2));
        // the second tick only measures the time since the first
        let second = clock.tick();
        assert!(second < first + Duration::from_secs(1));
    }
}
