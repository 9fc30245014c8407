//! Global mesh extraction (spec §4.4): translates every active-function
//! kernel face into a globally deduplicated `IsoVertex`/`PolygonFace`.

use std::collections::HashMap;

use nalgebra::Point3;
use smallvec::SmallVec;

use crate::background_mesh::BackgroundMesh;
use crate::error::{PipelineError, Result};
use crate::kernel::{KernelVertex, LocalPlane, TetSimplex};
use crate::tet_arrangement::TetArrangementResults;
use crate::topology::{
    FaceHeader, IsoVertex, IsoVertexKey, MinimalSimplex, PolygonFace, VertexHeader, NO_FUNCTION,
};

const FACE_OPPOSITE_CORNER: [[u8; 3]; 4] = [[1, 2, 3], [0, 2, 3], [0, 1, 3], [0, 1, 2]];

/// The globally deduplicated output of the extraction stage.
pub struct ExtractedMesh {
    pub vertices: Vec<IsoVertex>,
    pub faces: Vec<PolygonFace>,
    /// `(tet index, local face index) -> global face index`, the inverse of
    /// each `PolygonFace`'s `headers` list. Used by `chains.rs` to look up
    /// which patch a kernel face belongs to without re-scanning headers.
    pub global_face_of_header: HashMap<(u32, u32), u32>,
}

/// Classifies a kernel vertex into its global identity key, independent of
/// whether it has been interned yet. Shared by extraction (§4.4) and patch
/// ordering (§4.6), which both need to translate a tet-local kernel vertex
/// into the same global identity.
pub fn kernel_vertex_key(mesh: &BackgroundMesh, tet_index: u32, kernel_vertex: &KernelVertex) -> Result<IsoVertexKey> {
    let corners = &mesh.tets[tet_index as usize];
    let (mut simplex_vertex_indices, functions): (SmallVec<[u32; 4]>, SmallVec<[u16; 3]>) = match kernel_vertex.tet_simplex() {
        TetSimplex::Corner(c) => (SmallVec::from_slice(&[corners[c as usize]]), SmallVec::new()),
        TetSimplex::Edge(a, b) => (
            SmallVec::from_slice(&[corners[a as usize], corners[b as usize]]),
            kernel_vertex.functions.clone(),
        ),
        TetSimplex::Face(f) => {
            let tri = FACE_OPPOSITE_CORNER[f as usize];
            (
                SmallVec::from_slice(&[corners[tri[0] as usize], corners[tri[1] as usize], corners[tri[2] as usize]]),
                kernel_vertex.functions.clone(),
            )
        }
        TetSimplex::Interior => (
            SmallVec::from_slice(&[corners[0], corners[1], corners[2], corners[3]]),
            kernel_vertex.functions.clone(),
        ),
    };
    if functions.len() > 3 {
        return Err(PipelineError::InvariantViolation(format!(
            "iso-vertex in tet {tet_index} has {} coincident functions, exceeding the 3-function limit",
            functions.len()
        )));
    }
    simplex_vertex_indices.sort_unstable();
    let mut sorted_functions = functions;
    sorted_functions.sort_unstable();
    Ok(IsoVertexKey {
        simplex_vertices: simplex_vertex_indices,
        functions: sorted_functions,
    })
}

/// An unordered face identity key (spec §4.4): smallest, second-smallest,
/// and largest global vertex index. Distinguishing in practice because
/// every face here has at least 3 vertices with distinct global identities.
fn face_key(vertex_indices: &[u32]) -> (u32, u32, u32) {
    let mut sorted: Vec<u32> = vertex_indices.to_vec();
    sorted.sort_unstable();
    (sorted[0], sorted[1], *sorted.last().unwrap())
}

struct VertexInterner<'a> {
    mesh: &'a BackgroundMesh,
    by_key: HashMap<IsoVertexKey, u32>,
    vertices: Vec<IsoVertex>,
}

impl<'a> VertexInterner<'a> {
    fn new(mesh: &'a BackgroundMesh) -> Self {
        VertexInterner {
            mesh,
            by_key: HashMap::new(),
            vertices: Vec::new(),
        }
    }

    fn intern(&mut self, tet_index: u32, local_vertex_index: u32, kernel_vertex: &KernelVertex) -> Result<u32> {
        let key = kernel_vertex_key(self.mesh, tet_index, kernel_vertex)?;
        if let Some(&existing) = self.by_key.get(&key) {
            return Ok(existing);
        }

        let minimal_simplex = match key.simplex_vertices.len() {
            1 => MinimalSimplex::Corner,
            2 => MinimalSimplex::Edge,
            3 => MinimalSimplex::Face,
            _ => MinimalSimplex::Interior,
        };

        let position = reconstruct_position(self.mesh, tet_index, kernel_vertex);
        let mut implicit_function_indices = [NO_FUNCTION; 3];
        for (slot, &f) in implicit_function_indices.iter_mut().zip(key.functions.iter()) {
            *slot = f;
        }

        let global_index = self.vertices.len() as u32;
        self.vertices.push(IsoVertex {
            header: VertexHeader {
                tet_index,
                local_vertex_index,
            },
            minimal_simplex,
            simplex_vertex_indices: key.simplex_vertices.clone(),
            implicit_function_indices,
            position,
        });
        self.by_key.insert(key, global_index);
        Ok(global_index)
    }
}

/// Reconstructs a real-space position from a kernel vertex's barycentric
/// coordinates and the tet's real corner positions. This is mathematically
/// equivalent to the original's per-case (1/2/3-plane) barycentric solve,
/// since the kernel already carries the full 4-component barycentric
/// vector through every clip.
fn reconstruct_position(mesh: &BackgroundMesh, tet_index: u32, kernel_vertex: &KernelVertex) -> Point3<f64> {
    let corners = &mesh.tets[tet_index as usize];
    let mut position = Point3::origin();
    for c in 0..4 {
        let weight = kernel_vertex.bary[c];
        let corner = mesh.vertices[corners[c] as usize];
        position.x += weight * corner.x;
        position.y += weight * corner.y;
        position.z += weight * corner.z;
    }
    position
}

/// Translates every tet's kernel result into the global deduplicated
/// vertex/face lists (spec §4.4).
pub fn extract(mesh: &BackgroundMesh, driver: &TetArrangementResults) -> Result<ExtractedMesh> {
    let mut interner = VertexInterner::new(mesh);
    let mut face_by_key: HashMap<(u32, u32, u32), u32> = HashMap::new();
    let mut faces: Vec<PolygonFace> = Vec::new();
    let mut global_face_of_header: HashMap<(u32, u32), u32> = HashMap::new();

    for (tet_index, maybe_arrangement) in driver.cut_results.iter().enumerate() {
        let Some(arrangement) = maybe_arrangement else {
            continue;
        };
        for (local_face_index, face) in arrangement.faces.iter().enumerate() {
            let LocalPlane::Active(function) = face.supporting else {
                continue;
            };
            if face.ring.len() < 3 {
                return Err(PipelineError::InvariantViolation(format!(
                    "tet {tet_index} produced a degenerate face with fewer than 3 vertices"
                )));
            }

            let mut global_ring = Vec::with_capacity(face.ring.len());
            for &local_vertex_id in &face.ring {
                let kernel_vertex = &arrangement.vertices[local_vertex_id as usize];
                let global = interner.intern(tet_index as u32, local_vertex_id, kernel_vertex)?;
                global_ring.push(global);
            }

            let key = face_key(&global_ring);
            let header = FaceHeader {
                tet_index: tet_index as u32,
                local_face_index: local_face_index as u32,
            };

            let global_index = match face_by_key.get(&key) {
                Some(&existing) => {
                    faces[existing as usize].headers.push(header);
                    existing
                }
                None => {
                    let index = faces.len() as u32;
                    faces.push(PolygonFace {
                        vertex_indices: global_ring,
                        headers: SmallVec::from_slice(&[header]),
                        implicit_function_index: function,
                    });
                    face_by_key.insert(key, index);
                    index
                }
            };
            global_face_of_header.insert((tet_index as u32, local_face_index as u32), global_index);
        }
    }

    Ok(ExtractedMesh {
        vertices: interner.vertices,
        faces,
        global_face_of_header,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbox::BoundingBox;
    use nalgebra::Point3 as P3;

    use crate::primitives::Primitive;
    use crate::scalar_field::ScalarField;
    use crate::tet_arrangement;

    #[test]
    fn sphere_extraction_produces_faces_and_vertices() {
        let bounds = BoundingBox::new(&P3::new(-1.0, -1.0, -1.0), &P3::new(1.0, 1.0, 1.0));
        let mesh = BackgroundMesh::generate(6, &bounds).unwrap();
        let primitives = vec![Primitive::Sphere {
            center: [0.0, 0.0, 0.0],
            radius: 0.5,
        }];
        let field = ScalarField::evaluate(&mesh, &primitives);
        let driver = tet_arrangement::run(&mesh, &field).unwrap();
        let extracted = extract(&mesh, &driver).unwrap();
        assert!(!extracted.vertices.is_empty());
        assert!(!extracted.faces.is_empty());
        assert!(extracted.faces.iter().all(|f| f.vertex_indices.len() >= 3));
    }

    #[test]
    fn shared_faces_between_tets_collapse_to_one_entry_with_two_headers() {
        let bounds = BoundingBox::new(&P3::new(-1.0, -1.0, -1.0), &P3::new(1.0, 1.0, 1.0));
        let mesh = BackgroundMesh::generate(6, &bounds).unwrap();
        let primitives = vec![Primitive::Sphere {
            center: [0.0, 0.0, 0.0],
            radius: 0.5,
        }];
        let field = ScalarField::evaluate(&mesh, &primitives);
        let driver = tet_arrangement::run(&mesh, &field).unwrap();
        let extracted = extract(&mesh, &driver).unwrap();
        assert!(extracted.faces.iter().any(|f| f.headers.len() == 2));
    }
}
