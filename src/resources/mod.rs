/**
 * GPU resources built from CPU-side meshes.
 */
pub mod mesh;
