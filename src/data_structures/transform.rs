//! Local node transforms and their GPU-side representation.
//!
//! A [`Transform`] is the authoritative position/rotation/scale of a scene
//! node relative to its parent. Matrices are derived from it every frame and
//! never written back.

use cgmath::{Deg, Euler, Matrix4, One, Quaternion, Vector3};

use crate::data_structures::Vertex;

/// Position, rotation (as quaternion), and per-axis scale.
///
/// Composes as translate, then rotate, then scale applied to the vertex:
/// `T * R * S`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    /// Identity transform (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn with_position(mut self, position: impl Into<Vector3<f32>>) -> Self {
        self.position = position.into();
        self
    }

    pub fn with_rotation(mut self, rotation: Quaternion<f32>) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: impl Into<Vector3<f32>>) -> Self {
        self.scale = scale.into();
        self
    }

    pub fn with_uniform_scale(self, scale: f32) -> Self {
        self.with_scale([scale; 3])
    }

    /// Set the rotation from Euler angles in degrees (X, then Y, then Z).
    pub fn set_euler(&mut self, x: f32, y: f32, z: f32) {
        self.rotation = Quaternion::from(Euler::new(Deg(x), Deg(y), Deg(z)));
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

impl From<Vector3<f32>> for Transform {
    fn from(position: Vector3<f32>) -> Self {
        Transform {
            position,
            ..Default::default()
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

/**
 * What the GPU sees per draw: the model-view matrix of one node.
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TransformRaw {
    pub model_view: [[f32; 4]; 4],
}

impl TransformRaw {
    pub fn new(view: &Matrix4<f32>, world: &Matrix4<f32>) -> Self {
        Self {
            model_view: (view * world).into(),
        }
    }
}

/**
 * A mat4 spans four vertex slots, one vec4 each. The shader reads them at
 * locations 5..=8 with instance step mode so every draw gets its own matrix.
 */
impl Vertex for TransformRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<TransformRaw>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Rotation3, SquareMatrix, Vector4};

    use super::*;

    #[test]
    fn identity_by_default() {
        assert_eq!(Transform::default().to_matrix(), Matrix4::identity());
    }

    #[test]
    fn scale_applies_before_rotation_and_translation() {
        let t = Transform::new()
            .with_position([1.0, 0.0, 0.0])
            .with_rotation(Quaternion::from_angle_z(Deg(90.0)))
            .with_scale([2.0, 1.0, 1.0]);
        // (1,0,0) -> scale (2,0,0) -> rotate (0,2,0) -> translate (1,2,0)
        let p = t.to_matrix() * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert!((p.x - 1.0).abs() < 1e-6);
        assert!((p.y - 2.0).abs() < 1e-6);
        assert!(p.z.abs() < 1e-6);
    }

    #[test]
    fn raw_is_view_times_world() {
        let view = Matrix4::from_translation(Vector3::new(0.0, 0.0, -3.0));
        let world = Transform::from(Vector3::new(1.0, 2.0, 3.0)).to_matrix();
        let raw = TransformRaw::new(&view, &world);
        let expected: [[f32; 4]; 4] = (view * world).into();
        assert_eq!(raw.model_view, expected);
        assert_eq!(std::mem::size_of::<TransformRaw>(), 64);
    }
}
