//! Iso-edge and patch computation (spec §4.5).

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::error::{PipelineError, Result};
use crate::mesh_extraction::ExtractedMesh;
use crate::topology::{EdgeHeader, IsoEdge, Patch};

/// Disjoint-set forest used for both patch connectivity here and the shell
/// / component union-finds in `cells.rs`.
pub struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    pub fn new(size: usize) -> Self {
        UnionFind {
            parent: (0..size as u32).collect(),
        }
    }

    pub fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            self.parent[x as usize] = self.parent[self.parent[x as usize] as usize];
            x = self.parent[x as usize];
        }
        x
    }

    pub fn union(&mut self, a: u32, b: u32) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra as usize] = rb;
        }
    }
}

/// Walks every face's vertex ring, canonicalising and deduplicating
/// unordered vertex pairs into global iso-edges (spec §4.5).
pub fn compute_edges(mesh: &ExtractedMesh) -> Vec<IsoEdge> {
    let mut edge_by_pair: HashMap<(u32, u32), usize> = HashMap::new();
    let mut edges: Vec<IsoEdge> = Vec::new();

    for (face_index, face) in mesh.faces.iter().enumerate() {
        let n = face.vertex_indices.len();
        for local_edge_index in 0..n {
            let v1 = face.vertex_indices[local_edge_index];
            let v2 = face.vertex_indices[(local_edge_index + 1) % n];
            let pair = (v1.min(v2), v1.max(v2));
            let header = EdgeHeader {
                face_index: face_index as u32,
                local_edge_index: local_edge_index as u32,
            };
            match edge_by_pair.get(&pair) {
                Some(&existing) => edges[existing].headers.push(header),
                None => {
                    edge_by_pair.insert(pair, edges.len());
                    edges.push(IsoEdge {
                        v1: pair.0,
                        v2: pair.1,
                        headers: SmallVec::from_slice(&[header]),
                    });
                }
            }
        }
    }

    edges
}

/// Groups faces into patches: maximal sets connected through manifold
/// (exactly-two-header) edges, with a single generating function index
/// each (spec §4.5).
pub fn compute_patches(mesh: &ExtractedMesh, edges: &[IsoEdge]) -> Result<Vec<Patch>> {
    let mut uf = UnionFind::new(mesh.faces.len());
    for edge in edges {
        if edge.headers.len() == 2 {
            let a = edge.headers[0].face_index;
            let b = edge.headers[1].face_index;
            uf.union(a, b);
        }
    }

    let mut faces_by_root: HashMap<u32, Vec<u32>> = HashMap::new();
    for face_index in 0..mesh.faces.len() as u32 {
        let root = uf.find(face_index);
        faces_by_root.entry(root).or_default().push(face_index);
    }

    let mut patches = Vec::with_capacity(faces_by_root.len());
    for faces in faces_by_root.into_values() {
        let function_index = mesh.faces[faces[0] as usize].implicit_function_index;
        if faces
            .iter()
            .any(|&f| mesh.faces[f as usize].implicit_function_index != function_index)
        {
            return Err(PipelineError::InvariantViolation(
                "a patch contains faces from more than one implicit function".to_string(),
            ));
        }
        patches.push(Patch { faces, function_index });
    }

    Ok(patches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{FaceHeader, MinimalSimplex, VertexHeader, NO_FUNCTION};
    use nalgebra::Point3;

    fn dummy_vertex() -> crate::topology::IsoVertex {
        crate::topology::IsoVertex {
            header: VertexHeader {
                tet_index: 0,
                local_vertex_index: 0,
            },
            minimal_simplex: MinimalSimplex::Corner,
            simplex_vertex_indices: SmallVec::from_slice(&[0]),
            implicit_function_indices: [NO_FUNCTION; 3],
            position: Point3::origin(),
        }
    }

    fn square_face(function: u16, verts: [u32; 4]) -> crate::topology::PolygonFace {
        crate::topology::PolygonFace {
            vertex_indices: verts.to_vec(),
            headers: SmallVec::from_slice(&[FaceHeader {
                tet_index: 0,
                local_face_index: 0,
            }]),
            implicit_function_index: function,
        }
    }

    #[test]
    fn two_faces_sharing_an_edge_become_one_patch() {
        let mesh = ExtractedMesh {
            vertices: vec![dummy_vertex(); 4],
            faces: vec![square_face(0, [0, 1, 2, 3]), square_face(0, [1, 0, 3, 2])],
            global_face_of_header: HashMap::new(),
        };
        let edges = compute_edges(&mesh);
        assert!(edges.iter().any(|e| e.headers.len() == 2));
        let patches = compute_patches(&mesh, &edges).unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].faces.len(), 2);
    }

    #[test]
    fn disjoint_faces_form_separate_patches() {
        let mesh = ExtractedMesh {
            vertices: vec![dummy_vertex(); 8],
            faces: vec![square_face(0, [0, 1, 2, 3]), square_face(1, [4, 5, 6, 7])],
            global_face_of_header: HashMap::new(),
        };
        let edges = compute_edges(&mesh);
        let patches = compute_patches(&mesh, &edges).unwrap();
        assert_eq!(patches.len(), 2);
    }
}
