//! Procedural geometry: mesh data, base polyhedra and icospheres.
//!
//! Every generator returns a plain [`Mesh`]. Meshes are CPU-side and
//! immutable once built; wrap them in an `Arc` to share one mesh between
//! several scene nodes.
//!
//! - [`quad`], [`octahedron`] and [`icosahedron`] are hand-authored constants
//! - [`sphere`] refines the icosahedron into a unit icosphere
//! - [`sphere_from`] does the same for any closed base mesh
//! - [`subdivide`] holds the midpoint subdivision pass itself

use std::collections::HashSet;

use log::debug;

pub mod subdivide;

pub use subdivide::{EdgeMidpointCache, midpoint_index, normalize, subdivide};

/// Iteration count used by callers that don't pick one.
pub const DEFAULT_SPHERE_ITERATIONS: u32 = 3;

/// Upper bound for [`sphere`] and [`sphere_from`].
///
/// Ten passes over an icosahedron already produce 10_485_762 vertices.
pub const MAX_SPHERE_ITERATIONS: u32 = 10;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("index {index} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        position: usize,
        index: u32,
        vertex_count: usize,
    },

    #[error("index count {0} is not a multiple of three")]
    IncompleteTriangle(usize),

    #[error(
        "attribute {kind:?} has {len} values, expected {expected} ({components} per vertex)"
    )]
    AttributeLength {
        kind: AttributeKind,
        len: usize,
        components: usize,
        expected: usize,
    },

    #[error("attribute {0:?} declares zero components per vertex")]
    EmptyAttribute(AttributeKind),

    #[error("{requested} subdivision passes requested, at most {max} are supported")]
    TooManyIterations { requested: u32, max: u32 },
}

/// What a per-vertex attribute stream holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Uv,
    Color,
    Height,
    Custom(String),
}

impl AttributeKind {
    /// Component count conventionally used for this kind, if it has one.
    pub fn default_components(&self) -> Option<usize> {
        match self {
            AttributeKind::Uv => Some(2),
            AttributeKind::Color => Some(3),
            AttributeKind::Height => Some(1),
            AttributeKind::Custom(_) => None,
        }
    }
}

/// A flat per-vertex stream, `components` floats per vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttribute {
    pub kind: AttributeKind,
    pub components: usize,
    pub data: Vec<f32>,
}

impl VertexAttribute {
    pub fn new(kind: AttributeKind, components: usize, data: Vec<f32>) -> Self {
        Self {
            kind,
            components,
            data,
        }
    }

    pub fn uv(data: Vec<f32>) -> Self {
        Self::new(AttributeKind::Uv, 2, data)
    }

    pub fn color(data: Vec<f32>) -> Self {
        Self::new(AttributeKind::Color, 3, data)
    }

    pub fn height(data: Vec<f32>) -> Self {
        Self::new(AttributeKind::Height, 1, data)
    }

    /// Values belonging to vertex `i`.
    pub fn get(&self, i: usize) -> &[f32] {
        &self.data[i * self.components..(i + 1) * self.components]
    }

    pub fn len(&self) -> usize {
        if self.components == 0 {
            0
        } else {
            self.data.len() / self.components
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self, vertex_count: usize) -> Result<(), GeometryError> {
        if self.components == 0 {
            return Err(GeometryError::EmptyAttribute(self.kind.clone()));
        }
        let expected = self.components * vertex_count;
        if self.data.len() != expected {
            return Err(GeometryError::AttributeLength {
                kind: self.kind.clone(),
                len: self.data.len(),
                components: self.components,
                expected,
            });
        }
        Ok(())
    }
}

/// Indexed triangle mesh.
///
/// `indices` is read in triples, one triangle each. Every attribute is
/// indexed exactly like `vertices`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    vertices: Vec<[f32; 3]>,
    indices: Vec<u32>,
    attributes: Vec<VertexAttribute>,
}

impl Mesh {
    /// Build a mesh, checking that every index names an existing vertex and
    /// that the index list splits into whole triangles.
    pub fn new(vertices: Vec<[f32; 3]>, indices: Vec<u32>) -> Result<Self, GeometryError> {
        let mesh = Self {
            vertices,
            indices,
            attributes: Vec::new(),
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Generators that own their invariants build through here.
    pub(crate) fn from_parts(
        vertices: Vec<[f32; 3]>,
        indices: Vec<u32>,
        attributes: Vec<VertexAttribute>,
    ) -> Self {
        Self {
            vertices,
            indices,
            attributes,
        }
    }

    /// Attach a per-vertex attribute, replacing any existing one of the same kind.
    pub fn with_attribute(mut self, attribute: VertexAttribute) -> Result<Self, GeometryError> {
        attribute.check(self.vertices.len())?;
        self.attributes.retain(|a| a.kind != attribute.kind);
        self.attributes.push(attribute);
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.indices.len() % 3 != 0 {
            return Err(GeometryError::IncompleteTriangle(self.indices.len()));
        }
        let vertex_count = self.vertices.len();
        if let Some((position, &index)) = self
            .indices
            .iter()
            .enumerate()
            .find(|(_, i)| **i as usize >= vertex_count)
        {
            return Err(GeometryError::IndexOutOfRange {
                position,
                index,
                vertex_count,
            });
        }
        self.attributes
            .iter()
            .try_for_each(|attribute| attribute.check(vertex_count))
    }

    pub fn vertices(&self) -> &[[f32; 3]] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, kind: &AttributeKind) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| &a.kind == kind)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Number of distinct undirected edges over all triangles.
    pub fn unique_edge_count(&self) -> usize {
        self.triangles()
            .flat_map(|[a, b, c]| [(a, b), (b, c), (c, a)])
            .map(|(a, b)| (a.min(b), a.max(b)))
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn into_parts(self) -> (Vec<[f32; 3]>, Vec<u32>, Vec<VertexAttribute>) {
        (self.vertices, self.indices, self.attributes)
    }
}

/// Unit quad in the XZ plane, facing +Y.
pub fn quad() -> Mesh {
    Mesh::from_parts(
        vec![
            [1.0, 0.0, 1.0],
            [-1.0, 0.0, 1.0],
            [-1.0, 0.0, -1.0],
            [1.0, 0.0, -1.0],
        ],
        vec![0, 1, 2, 0, 2, 3],
        vec![VertexAttribute::uv(vec![
            1.0, 1.0, //
            0.0, 1.0, //
            0.0, 0.0, //
            1.0, 0.0,
        ])],
    )
}

/// Regular octahedron with its vertices on the unit axes.
pub fn octahedron() -> Mesh {
    Mesh::from_parts(
        vec![
            [1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, -1.0],
        ],
        vec![
            4, 0, 2, //
            4, 2, 1, //
            4, 1, 3, //
            4, 3, 0, //
            5, 2, 0, //
            5, 1, 2, //
            5, 3, 1, //
            5, 0, 3,
        ],
        vec![VertexAttribute::uv(vec![
            0.0, 0.0, //
            1.0, 0.0, //
            0.0, 1.0, //
            1.0, 1.0, //
            0.0, 0.0, //
            1.0, 0.0,
        ])],
    )
}

// (X, Z) on the unit sphere for an icosahedron with edge-aligned axes.
const ICO_X: f32 = 0.525_731_1;
const ICO_Z: f32 = 0.850_650_8;

/// Regular icosahedron inscribed in the unit sphere.
pub fn icosahedron() -> Mesh {
    Mesh::from_parts(
        vec![
            [-ICO_X, 0.0, ICO_Z],
            [ICO_X, 0.0, ICO_Z],
            [-ICO_X, 0.0, -ICO_Z],
            [ICO_X, 0.0, -ICO_Z],
            [0.0, ICO_Z, ICO_X],
            [0.0, ICO_Z, -ICO_X],
            [0.0, -ICO_Z, ICO_X],
            [0.0, -ICO_Z, -ICO_X],
            [ICO_Z, ICO_X, 0.0],
            [-ICO_Z, ICO_X, 0.0],
            [ICO_Z, -ICO_X, 0.0],
            [-ICO_Z, -ICO_X, 0.0],
        ],
        vec![
            1, 4, 0, //
            4, 9, 0, //
            4, 5, 9, //
            8, 5, 4, //
            1, 8, 4, //
            1, 10, 8, //
            10, 3, 8, //
            8, 3, 5, //
            3, 2, 5, //
            3, 7, 2, //
            3, 10, 7, //
            10, 6, 7, //
            6, 11, 7, //
            6, 0, 11, //
            6, 1, 0, //
            10, 1, 6, //
            11, 0, 9, //
            2, 11, 9, //
            5, 2, 9, //
            11, 2, 7,
        ],
        Vec::new(),
    )
}

/// Unit icosphere: the icosahedron subdivided `iterations` times, then
/// projected onto the unit sphere.
///
/// `sphere(0)` is exactly [`icosahedron`].
pub fn sphere(iterations: u32) -> Result<Mesh, GeometryError> {
    sphere_from(icosahedron(), iterations)
}

/// Like [`sphere`] but starting from an arbitrary closed base mesh.
pub fn sphere_from(base: Mesh, iterations: u32) -> Result<Mesh, GeometryError> {
    if iterations > MAX_SPHERE_ITERATIONS {
        return Err(GeometryError::TooManyIterations {
            requested: iterations,
            max: MAX_SPHERE_ITERATIONS,
        });
    }
    if iterations == 0 {
        return Ok(base);
    }

    let mut mesh = base;
    for _ in 0..iterations {
        mesh = subdivide(&mesh);
    }
    let (mut vertices, indices, attributes) = mesh.into_parts();
    normalize(&mut vertices);
    debug!(
        "sphere: {} passes, {} vertices, {} triangles",
        iterations,
        vertices.len(),
        indices.len() / 3
    );

    Ok(Mesh::from_parts(vertices, indices, attributes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_shapes_are_valid() {
        for mesh in [quad(), octahedron(), icosahedron()] {
            assert_eq!(mesh.validate(), Ok(()));
        }
    }

    #[test]
    fn icosahedron_constants_lie_on_unit_sphere() {
        for v in icosahedron().vertices() {
            let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-6, "{:?} has length {}", v, len);
        }
    }

    #[test]
    fn closed_polyhedra_satisfy_euler() {
        for mesh in [octahedron(), icosahedron()] {
            let v = mesh.vertex_count() as i64;
            let e = mesh.unique_edge_count() as i64;
            let f = mesh.triangle_count() as i64;
            assert_eq!(v - e + f, 2);
            assert_eq!(2 * e, 3 * f);
        }
    }

    #[test]
    fn mesh_new_rejects_out_of_range_index() {
        let err = Mesh::new(vec![[0.0; 3]; 3], vec![0, 1, 3]).unwrap_err();
        assert_eq!(
            err,
            GeometryError::IndexOutOfRange {
                position: 2,
                index: 3,
                vertex_count: 3
            }
        );
    }

    #[test]
    fn mesh_new_rejects_partial_triangle() {
        let err = Mesh::new(vec![[0.0; 3]; 3], vec![0, 1]).unwrap_err();
        assert_eq!(err, GeometryError::IncompleteTriangle(2));
    }

    #[test]
    fn with_attribute_checks_length() {
        let err = icosahedron()
            .with_attribute(VertexAttribute::uv(vec![0.0; 10]))
            .unwrap_err();
        assert!(matches!(err, GeometryError::AttributeLength { expected: 24, .. }));

        let err = icosahedron()
            .with_attribute(VertexAttribute::new(
                AttributeKind::Custom("empty".into()),
                0,
                Vec::new(),
            ))
            .unwrap_err();
        assert!(matches!(err, GeometryError::EmptyAttribute(_)));
    }

    #[test]
    fn with_attribute_replaces_same_kind() {
        let mesh = quad()
            .with_attribute(VertexAttribute::uv(vec![0.5; 8]))
            .unwrap();
        assert_eq!(mesh.attributes().len(), 1);
        assert_eq!(mesh.attribute(&AttributeKind::Uv).unwrap().get(3), &[0.5, 0.5]);
    }

    #[test]
    fn too_many_iterations_is_rejected() {
        let err = sphere(MAX_SPHERE_ITERATIONS + 1).unwrap_err();
        assert_eq!(
            err,
            GeometryError::TooManyIterations {
                requested: MAX_SPHERE_ITERATIONS + 1,
                max: MAX_SPHERE_ITERATIONS
            }
        );
    }
}
