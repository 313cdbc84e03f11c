//! View and projection matrices.
//!
//! [`Camera`] is a simple orbit camera: it sits `distance` units in front of
//! the origin and is pitched about the X axis. [`Projection`] is a standard
//! perspective projection. Both produce `cgmath` matrices that are handed to
//! [`SceneGraph::render_frame`](crate::data_structures::scene_graph::SceneGraph::render_frame).

use cgmath::{Deg, Matrix4, Rad, Vector3, perspective};

/// cgmath produces OpenGL clip space (z in -1..1); wgpu expects z in 0..1.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub distance: f32,
    pub pitch: Rad<f32>,
}

impl Camera {
    pub fn new<P: Into<Rad<f32>>>(distance: f32, pitch: P) -> Self {
        Self {
            distance,
            pitch: pitch.into(),
        }
    }

    /// Move the world `distance` units away, then tilt it by `pitch`.
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(Vector3::new(0.0, 0.0, -self.distance))
            * Matrix4::from_angle_x(self.pitch)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(3.0, Rad(0.05 * std::f32::consts::PI))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::new(1, 1, Deg(45.0), 0.1, 10_000.0)
    }
}
