//! Midpoint subdivision: one triangle becomes four.
//!
//! Each pass owns its vertex list as a growable arena. New midpoints are
//! appended to it through [`midpoint_index`], which looks the edge up in an
//! [`EdgeMidpointCache`] first so that two triangles sharing an edge also
//! share its midpoint. Without that, seams would get duplicated vertices and
//! the sphere would crack once normalised.

use std::collections::HashMap;

use log::{debug, warn};

use super::{Mesh, VertexAttribute};

/// Midpoints created during one subdivision pass, keyed by undirected edge.
#[derive(Debug, Default)]
pub struct EdgeMidpointCache {
    midpoints: HashMap<(u32, u32), u32>,
    // creation order, parallel to the appended vertices
    edges: Vec<(u32, u32)>,
}

impl EdgeMidpointCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size for a mesh with roughly `edges` unique edges.
    pub fn with_capacity(edges: usize) -> Self {
        Self {
            midpoints: HashMap::with_capacity(edges),
            edges: Vec::with_capacity(edges),
        }
    }

    fn key(i0: u32, i1: u32) -> (u32, u32) {
        (i0.min(i1), i0.max(i1))
    }

    pub fn get(&self, i0: u32, i1: u32) -> Option<u32> {
        self.midpoints.get(&Self::key(i0, i1)).copied()
    }

    /// Number of midpoints created so far.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Canonical edges in the order their midpoints were created.
    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }
}

/// Index of the midpoint between `i0` and `i1`, creating it on first use.
///
/// `(i0, i1)` and `(i1, i0)` resolve to the same vertex. A second lookup of
/// the same edge returns the cached index and leaves `vertices` untouched.
pub fn midpoint_index(
    cache: &mut EdgeMidpointCache,
    vertices: &mut Vec<[f32; 3]>,
    i0: u32,
    i1: u32,
) -> u32 {
    let key = EdgeMidpointCache::key(i0, i1);
    if let Some(&index) = cache.midpoints.get(&key) {
        return index;
    }

    let v0 = vertices[i0 as usize];
    let v1 = vertices[i1 as usize];
    let midpoint = [
        (v0[0] + v1[0]) / 2.0,
        (v0[1] + v1[1]) / 2.0,
        (v0[2] + v1[2]) / 2.0,
    ];

    let index = vertices.len() as u32;
    vertices.push(midpoint);
    cache.midpoints.insert(key, index);
    cache.edges.push(key);
    index
}

/// Split every triangle of `mesh` into four.
///
/// The output keeps the input vertices in place and appends one midpoint
/// per unique edge. Attributes follow: each midpoint gets the mean of its
/// two endpoints.
pub fn subdivide(mesh: &Mesh) -> Mesh {
    let mut vertices = mesh.vertices().to_vec();
    let mut indices = Vec::with_capacity(mesh.indices().len() * 4);
    let mut cache = EdgeMidpointCache::with_capacity(mesh.indices().len() / 2);

    for [i0, i1, i2] in mesh.triangles() {
        let m01 = midpoint_index(&mut cache, &mut vertices, i0, i1);
        let m12 = midpoint_index(&mut cache, &mut vertices, i1, i2);
        let m02 = midpoint_index(&mut cache, &mut vertices, i2, i0);

        indices.extend_from_slice(&[
            i0, m01, m02, //
            i1, m12, m01, //
            i2, m02, m12, //
            m02, m01, m12,
        ]);
    }

    let attributes = mesh
        .attributes()
        .iter()
        .map(|attribute| interpolate_midpoints(attribute, cache.edges()))
        .collect();

    debug!(
        "subdivide: {} -> {} vertices, {} -> {} triangles",
        mesh.vertex_count(),
        vertices.len(),
        mesh.triangle_count(),
        indices.len() / 3
    );

    Mesh::from_parts(vertices, indices, attributes)
}

fn interpolate_midpoints(attribute: &VertexAttribute, edges: &[(u32, u32)]) -> VertexAttribute {
    let mut data = attribute.data.clone();
    data.reserve(edges.len() * attribute.components);
    for &(a, b) in edges {
        let (a, b) = (attribute.get(a as usize), attribute.get(b as usize));
        data.extend(a.iter().zip(b).map(|(x, y)| (x + y) / 2.0));
    }
    VertexAttribute::new(attribute.kind.clone(), attribute.components, data)
}

/// Rescale every vertex to unit length, keeping its direction.
///
/// A vertex at the origin has no direction and is left as is.
pub fn normalize(vertices: &mut [[f32; 3]]) {
    for (i, v) in vertices.iter_mut().enumerate() {
        let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        if len == 0.0 {
            warn!("vertex {} is at the origin and can't be normalized", i);
            continue;
        }
        v.iter_mut().for_each(|c| *c /= len);
    }
}
