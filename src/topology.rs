//! Shared global data types for the extracted surface network (spec §3 /
//! §4.4 / §4.5): `IsoVertex`, `PolygonFace`, `IsoEdge`, and the headers that
//! tie each back to the tet it came from.

use smallvec::SmallVec;

/// Sentinel meaning "no implicit function", matching the field layout of
/// the original `vertex_header_t`/`IsoVertex` structures.
pub const NO_FUNCTION: u16 = u16::MAX;

/// Which sub-simplex of its containing tet an iso-vertex is pinned to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum MinimalSimplex {
    Corner = 1,
    Edge = 2,
    Face = 3,
    Interior = 4,
}

/// `(tet index, local vertex index within that tet's kernel result)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexHeader {
    pub tet_index: u32,
    pub local_vertex_index: u32,
}

/// `(tet index, local face index within that tet's kernel result)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceHeader {
    pub tet_index: u32,
    pub local_face_index: u32,
}

/// `(face index, local edge index within that face's vertex ring)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeHeader {
    pub face_index: u32,
    pub local_edge_index: u32,
}

/// The global identity key of an iso-vertex (spec §4.4): canonicalised
/// simplex vertex indices plus canonicalised function indices. Two kernel
/// vertices across different tets with the same key are the same
/// `IsoVertex`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IsoVertexKey {
    pub simplex_vertices: SmallVec<[u32; 4]>,
    pub functions: SmallVec<[u16; 3]>,
}

/// One globally deduplicated iso-vertex.
#[derive(Clone, Debug)]
pub struct IsoVertex {
    pub header: VertexHeader,
    pub minimal_simplex: MinimalSimplex,
    /// Up to 4 tet-corner indices delimiting the containing simplex,
    /// sorted ascending.
    pub simplex_vertex_indices: SmallVec<[u32; 4]>,
    /// Up to 3 implicit function indices, `NO_FUNCTION` padded, sorted
    /// ascending among the real entries.
    pub implicit_function_indices: [u16; 3],
    /// Real-space position, reconstructed once from the owning tet's
    /// corner positions (spec §4.4's barycentric reconstruction).
    pub position: nalgebra::Point3<f64>,
}

/// One globally deduplicated polygon face of the iso-surface.
#[derive(Clone, Debug)]
pub struct PolygonFace {
    pub vertex_indices: Vec<u32>,
    pub headers: SmallVec<[FaceHeader; 2]>,
    pub implicit_function_index: u16,
}

/// One globally deduplicated iso-edge.
#[derive(Clone, Debug)]
pub struct IsoEdge {
    pub v1: u32,
    pub v2: u32,
    pub headers: SmallVec<[EdgeHeader; 4]>,
}

impl IsoEdge {
    pub fn is_manifold(&self) -> bool {
        self.headers.len() == 2
    }
}

/// A maximal set of iso-faces sharing manifold edge-connectivity and a
/// common generating function.
#[derive(Clone, Debug)]
pub struct Patch {
    pub faces: Vec<u32>,
    pub function_index: u16,
}

/// A maximal path of non-manifold iso-edges (spec §4.5/§4.6).
#[derive(Clone, Debug)]
pub struct Chain {
    pub edges: Vec<u32>,
    pub is_loop: bool,
}

/// `HalfPatch = 2*patch + (side == - ? 1 : 0)` (spec §4.6).
pub fn half_patch_id(patch: u32, negative_side: bool) -> u32 {
    2 * patch + negative_side as u32
}

pub fn half_patch_patch(hp: u32) -> u32 {
    hp / 2
}

pub fn half_patch_is_negative(hp: u32) -> bool {
    hp % 2 == 1
}

/// A maximal set of half-patches connected through chain adjacency,
/// forming one oriented closed surface.
#[derive(Clone, Debug, Default)]
pub struct Shell {
    pub half_patches: Vec<u32>,
}

/// A maximal set of patches connected by any shared edge (manifold or not).
#[derive(Clone, Debug, Default)]
pub struct Component {
    pub patches: Vec<u32>,
}

/// A maximal connected open 3-region of space not crossed by any iso-surface.
#[derive(Clone, Debug, Default)]
pub struct ArrangementCell {
    pub bounding_shells: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_patch_encoding_round_trips() {
        for patch in 0..5u32 {
            for side in [false, true] {
                let hp = half_patch_id(patch, side);
                assert_eq!(half_patch_patch(hp), patch);
                assert_eq!(half_patch_is_negative(hp), side);
            }
        }
    }

    #[test]
    fn iso_edge_manifoldness() {
        let manifold = IsoEdge {
            v1: 0,
            v2: 1,
            headers: SmallVec::from_vec(vec![
                EdgeHeader {
                    face_index: 0,
                    local_edge_index: 0,
                },
                EdgeHeader {
                    face_index: 1,
                    local_edge_index: 2,
                },
            ]),
        };
        assert!(manifold.is_manifold());

        let boundary = IsoEdge {
            v1: 0,
            v2: 1,
            headers: SmallVec::from_vec(vec![EdgeHeader {
                face_index: 0,
                local_edge_index: 0,
            }]),
        };
        assert!(!boundary.is_manifold());
    }
}
