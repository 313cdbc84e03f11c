use std::{sync::Arc, time::Duration};

use clap::Parser;
use orrery::{
    HeadlessRenderer, Renderable, Renderer, SceneGraph, Transform,
    context::Context,
    flow::{self, FrameClock},
    geometry::{self, DEFAULT_SPHERE_ITERATIONS},
    pipelines::basic::BasicRenderer,
    wgpu,
};

const DEFAULT_FRAMES: u32 = 120;

/// Render the sun, jupiter, europa and pluto scene offscreen.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of frames to render
    #[arg(default_value_t = DEFAULT_FRAMES)]
    frames: u32,

    /// Subdivision iterations for the shared sphere mesh
    #[arg(default_value_t = DEFAULT_SPHERE_ITERATIONS)]
    iterations: u32,
}

/// Rotation about Y at `speed` degrees per millisecond.
fn spin(speed: f32) -> impl FnMut(&mut Transform, Duration) {
    let mut acc = 0.0f32;
    move |local, dt| {
        acc += dt.as_secs_f32() * 1000.0 * speed;
        local.set_euler(0.0, acc % 360.0, 0.0);
    }
}

fn build_scene(renderer: &mut dyn Renderer, iterations: u32) -> anyhow::Result<SceneGraph> {
    let sphere = Renderable::upload(renderer, Arc::new(geometry::sphere(iterations)?))?;
    let moon = Transform::new().with_uniform_scale(0.5);

    let mut scene = SceneGraph::new();
    let sun = scene.create_node(Some(sphere.clone()), None);
    let jupiter = scene.create_node(
        Some(sphere.clone()),
        Some(moon.with_position([1.75, 0.0, 0.0])),
    );
    let europa = scene.create_node(
        Some(sphere.clone()),
        Some(moon.with_position([1.8, 0.0, 0.0])),
    );
    let pluto = scene.create_node(Some(sphere), Some(moon.with_position([1.8, 0.0, 0.0])));

    for (node, name) in [(sun, "sun"), (jupiter, "jupiter"), (europa, "europa"), (pluto, "pluto")] {
        scene.set_name(node, name)?;
    }
    scene.add_root(sun)?;
    scene.attach_child(sun, jupiter)?;
    scene.attach_child(jupiter, europa)?;
    scene.attach_child(europa, pluto)?;

    scene.set_update_fn(sun, spin(0.03))?;
    scene.set_update_fn(jupiter, spin(0.1))?;
    scene.set_update_fn(europa, spin(0.5))?;
    Ok(scene)
}

fn run_gpu(mut ctx: Context, args: &Args) -> anyhow::Result<()> {
    ctx.configure(|ctx| {
        ctx.clear_colour = wgpu::Color {
            r: 0.05,
            g: 0.05,
            b: 0.1,
            a: 1.0,
        };
    });
    let mut renderer = BasicRenderer::new(&ctx.device, &ctx.queue, ctx.color_target.texture.format());
    let mut scene = build_scene(&mut renderer, args.iterations)?;

    let mut clock = FrameClock::new();
    for frame in 0..args.frames {
        let stats = flow::draw_frame(&ctx, &mut scene, &mut renderer, clock.tick())?;
        log::debug!("frame {}: {:?}", frame, stats);
    }
    log_positions(&scene)
}

fn run_headless(args: &Args) -> anyhow::Result<()> {
    let mut renderer = HeadlessRenderer::new();
    let mut scene = build_scene(&mut renderer, args.iterations)?;
    let view = orrery::camera::Camera::default().calc_matrix();
    let projection = orrery::camera::Projection::default().calc_matrix();

    // fixed 60 Hz steps without a GPU to pace frames
    let dt = Duration::from_micros(16_667);
    for frame in 0..args.frames {
        let stats = scene.render_frame(&mut renderer, dt, &view, &projection);
        log::debug!("frame {}: {:?}", frame, stats);
        renderer.clear_calls();
    }
    log_positions(&scene)
}

fn log_positions(scene: &SceneGraph) -> anyhow::Result<()> {
    for name in ["sun", "jupiter", "europa", "pluto"] {
        if let Some(node) = scene.find_by_name(name) {
            let world = scene.world_matrix(node)?;
            log::info!("{:>8} at {:?}", name, world.w.truncate());
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let _ = env_logger::try_init();
    let args = Args::parse();

    match futures::executor::block_on(Context::new_headless(800, 600)) {
        Ok(ctx) => run_gpu(ctx, &args),
        Err(e) => {
            log::warn!("no GPU available ({:#}), rendering without one", e);
            run_headless(&args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_arguments_fall_back_to_defaults() {
        let args = Args::try_parse_from(["solar-system"]).unwrap();
        assert_eq!(args.frames, DEFAULT_FRAMES);
        assert_eq!(args.iterations, DEFAULT_SPHERE_ITERATIONS);

        let args = Args::try_parse_from(["solar-system", "10", "2"]).unwrap();
        assert_eq!((args.frames, args.iterations), (10, 2));

        assert!(Args::try_parse_from(["solar-system", "-3"]).is_err());
    }

    #[test]
    fn scene_builds_without_a_gpu() {
        let mut renderer = HeadlessRenderer::new();
        let scene = build_scene(&mut renderer, 1).unwrap();
        assert_eq!(renderer.uploaded(), 1);
        assert_eq!(scene.len(), 4);
    }
}
