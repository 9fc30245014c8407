//! The pipeline's boundary output type (spec §6): `polymesh { vertices[],
//! faces[], vertex_counts[], num_vertices, num_faces }` plus the aggregate
//! scalars callers requested.

#[cfg(feature = "obj")]
use std::{error::Error, fs::File, io::Write, path::Path};

use nalgebra::Point3;

use crate::integrator::PatchIntegral;
use crate::mesh_extraction::ExtractedMesh;
use crate::topology::Patch;

/// Flat polygon-soup surface: one arity per face in `vertex_counts`, indices
/// concatenated in `faces`. Mirrors the flat topology a caller across an FFI
/// or file boundary would want, rather than a `Vec<Vec<u32>>` of rings.
#[derive(Clone, Debug, PartialEq)]
pub struct PolyMesh {
    pub vertices: Vec<Point3<f64>>,
    pub faces: Vec<u32>,
    pub vertex_counts: Vec<u32>,
    pub num_vertices: usize,
    pub num_faces: usize,
}

impl PolyMesh {
    /// Builds the flat output mesh from every face of `mesh` whose patch is
    /// in `selected_patches` (or every face, if `None`).
    pub fn from_extracted(mesh: &ExtractedMesh, patches: &[Patch], selected_patches: Option<&[u32]>) -> Self {
        let face_set: Option<std::collections::HashSet<u32>> = selected_patches.map(|selection| {
            selection
                .iter()
                .flat_map(|&patch_index| patches[patch_index as usize].faces.iter().copied())
                .collect()
        });

        let mut vertex_counts = Vec::new();
        let mut faces = Vec::new();
        for (face_index, face) in mesh.faces.iter().enumerate() {
            if let Some(set) = &face_set {
                if !set.contains(&(face_index as u32)) {
                    continue;
                }
            }
            vertex_counts.push(face.vertex_indices.len() as u32);
            faces.extend(face.vertex_indices.iter().copied());
        }

        let vertices: Vec<Point3<f64>> = mesh.vertices.iter().map(|v| v.position).collect();
        let num_vertices = vertices.len();
        let num_faces = vertex_counts.len();

        PolyMesh {
            vertices,
            faces,
            vertex_counts,
            num_vertices,
            num_faces,
        }
    }

    /// Describes the mesh as a [Wavefront OBJ](https://en.wikipedia.org/wiki/Wavefront_.obj_file) buffer.
    #[cfg(feature = "obj")]
    pub fn to_obj(&self, reverse_face_winding: bool) -> Result<Vec<u8>, Box<dyn Error>> {
        let mut file = Vec::new();
        writeln!(file, "o ImplicitSurfaceArrangement")?;

        for vertex in &self.vertices {
            writeln!(file, "v {} {} {}", vertex.x, vertex.y, vertex.z)?;
        }

        let mut cursor = 0usize;
        for &count in &self.vertex_counts {
            let indices = &self.faces[cursor..cursor + count as usize];
            write!(file, "f")?;
            if reverse_face_winding {
                for &vertex_index in indices.iter().rev() {
                    write!(file, " {}", vertex_index + 1)?;
                }
            } else {
                for &vertex_index in indices {
                    write!(file, " {}", vertex_index + 1)?;
                }
            }
            writeln!(file)?;
            cursor += count as usize;
        }

        Ok(file)
    }

    #[cfg(feature = "obj")]
    pub fn export_as_obj(&self, destination: &Path, reverse_face_winding: bool) -> Result<(), Box<dyn Error>> {
        let mut file = File::create(destination)?;
        file.write_all(&self.to_obj(reverse_face_winding)?)?;
        file.flush()?;
        Ok(())
    }
}

/// Aggregate integrals over whichever patches the caller requested, plus the
/// output surface and a success flag (spec §6).
#[derive(Clone, Debug, PartialEq)]
pub struct SolveResult {
    pub mesh: PolyMesh,
    pub surf_int: f64,
    pub vol_int: f64,
    pub success: bool,
}

impl SolveResult {
    pub fn aggregate(mesh: PolyMesh, integrals: &[PatchIntegral], selected_patches: Option<&[u32]>) -> Self {
        let selected: Vec<usize> = match selected_patches {
            Some(indices) => indices.iter().map(|&i| i as usize).collect(),
            None => (0..integrals.len()).collect(),
        };
        let surf_int = selected.iter().map(|&i| integrals[i].surface_area).sum();
        let vol_int = selected.iter().map(|&i| integrals[i].signed_volume).sum();
        SolveResult {
            mesh,
            surf_int,
            vol_int,
            success: true,
        }
    }

    pub fn failure() -> Self {
        SolveResult {
            mesh: PolyMesh {
                vertices: Vec::new(),
                faces: Vec::new(),
                vertex_counts: Vec::new(),
                num_vertices: 0,
                num_faces: 0,
            },
            surf_int: 0.0,
            vol_int: 0.0,
            success: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{FaceHeader, IsoVertex, MinimalSimplex, VertexHeader, NO_FUNCTION};
    use smallvec::SmallVec;
    use std::collections::HashMap;

    fn vertex(position: Point3<f64>) -> IsoVertex {
        IsoVertex {
            header: VertexHeader {
                tet_index: 0,
                local_vertex_index: 0,
            },
            minimal_simplex: MinimalSimplex::Corner,
            simplex_vertex_indices: SmallVec::from_slice(&[0]),
            implicit_function_indices: [NO_FUNCTION; 3],
            position,
        }
    }

    #[test]
    fn flat_topology_matches_vertex_counts_and_face_indices() {
        let vertices = vec![
            vertex(Point3::new(0.0, 0.0, 0.0)),
            vertex(Point3::new(1.0, 0.0, 0.0)),
            vertex(Point3::new(1.0, 1.0, 0.0)),
        ];
        let faces = vec![crate::topology::PolygonFace {
            vertex_indices: vec![0, 1, 2],
            headers: SmallVec::from_slice(&[FaceHeader {
                tet_index: 0,
                local_face_index: 0,
            }]),
            implicit_function_index: 0,
        }];
        let mesh = ExtractedMesh {
            vertices,
            faces,
            global_face_of_header: HashMap::new(),
        };
        let poly = PolyMesh::from_extracted(&mesh, &[], None);
        assert_eq!(poly.num_vertices, 3);
        assert_eq!(poly.num_faces, 1);
        assert_eq!(poly.vertex_counts, vec![3]);
        assert_eq!(poly.faces, vec![0, 1, 2]);
    }

    #[test]
    fn selecting_a_patch_subset_filters_its_faces_out() {
        let vertices = vec![
            vertex(Point3::new(0.0, 0.0, 0.0)),
            vertex(Point3::new(1.0, 0.0, 0.0)),
            vertex(Point3::new(1.0, 1.0, 0.0)),
            vertex(Point3::new(0.0, 1.0, 0.0)),
        ];
        let header = |i| FaceHeader {
            tet_index: i,
            local_face_index: 0,
        };
        let faces = vec![
            crate::topology::PolygonFace {
                vertex_indices: vec![0, 1, 2],
                headers: SmallVec::from_slice(&[header(0)]),
                implicit_function_index: 0,
            },
            crate::topology::PolygonFace {
                vertex_indices: vec![0, 2, 3],
                headers: SmallVec::from_slice(&[header(1)]),
                implicit_function_index: 1,
            },
        ];
        let mesh = ExtractedMesh {
            vertices,
            faces,
            global_face_of_header: HashMap::new(),
        };
        let patches = vec![
            Patch {
                faces: vec![0],
                function_index: 0,
            },
            Patch {
                faces: vec![1],
                function_index: 1,
            },
        ];
        let poly = PolyMesh::from_extracted(&mesh, &patches, Some(&[0]));
        assert_eq!(poly.num_faces, 1);
    }
}
