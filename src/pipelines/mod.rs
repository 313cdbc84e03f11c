//! Render pipelines and the wgpu-backed renderer.

pub mod basic;
