//! Opaque mesh geometry payload attached to mesh-typed shapes.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Triangle-mesh geometry produced by a mesh codec.
///
/// The canonical model treats this as an opaque handle: the core never
/// inspects the geometry, it only hands it back to a codec for re-encoding.
/// Normals and UVs are per-vertex and optional (empty when absent).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeshData {
    /// Vertex positions.
    pub vertices: Vec<Point3<f64>>,
    /// Per-vertex normals; empty if the source carried none.
    pub normals: Vec<Vector3<f64>>,
    /// Per-vertex texture coordinates; empty if the source carried none.
    pub uvs: Vec<[f64; 2]>,
    /// Triangle faces as vertex indices.
    pub faces: Vec<[u32; 3]>,
    /// Raw texture image bytes fetched through the asset handler, if any.
    pub texture: Option<Vec<u8>>,
}

impl MeshData {
    /// A mesh with no geometry.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of triangles.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// True if the mesh carries no triangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}
