//! Patch integration (spec §4.8): surface area and signed volume per patch,
//! via fan-triangulated divergence-theorem sums.

use crate::error::Result;
use crate::mesh_extraction::ExtractedMesh;
use crate::topology::Patch;

/// Surface area and signed volume of one patch.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PatchIntegral {
    pub surface_area: f64,
    pub signed_volume: f64,
}

/// Integrates every patch (spec §4.8). Arithmetic order is preserved
/// bit-for-bit as specified: within a face, every fan-triangle's cross
/// product is summed first, and only then dotted against the face's shared
/// fan origin `v0` — not dotted and accumulated triangle by triangle.
pub fn integrate_patches(mesh: &ExtractedMesh, patches: &[Patch]) -> Result<Vec<PatchIntegral>> {
    let mut results = Vec::with_capacity(patches.len());

    for patch in patches {
        let mut surface_area = 0.0;
        let mut volume_sum = 0.0;

        for &face_index in &patch.faces {
            let face = &mesh.faces[face_index as usize];
            if face.vertex_indices.len() < 3 {
                return Err(crate::error::PipelineError::InvariantViolation(format!(
                    "patch face {face_index} has fewer than 3 vertices"
                )));
            }
            let v0 = mesh.vertices[face.vertex_indices[0] as usize].position;

            let mut cross_sum = nalgebra::Vector3::zeros();
            for i in 1..face.vertex_indices.len() - 1 {
                let v1 = mesh.vertices[face.vertex_indices[i] as usize].position;
                let v2 = mesh.vertices[face.vertex_indices[i + 1] as usize].position;
                let a = (v1 - v0).cross(&(v2 - v0));
                surface_area += a.norm() / 2.0;
                cross_sum += a;
            }
            volume_sum += cross_sum.dot(&v0.coords) / 6.0;
        }

        results.push(PatchIntegral {
            surface_area,
            signed_volume: volume_sum,
        });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{FaceHeader, IsoVertex, MinimalSimplex, VertexHeader, NO_FUNCTION};
    use nalgebra::Point3;
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
    fn unit_square_in_the_xy_plane_has_area_one_and_zero_height_volume() {
        let vertices = vec![
            vertex(Point3::new(0.0, 0.0, 0.0)),
            vertex(Point3::new(1.0, 0.0, 0.0)),
            vertex(Point3::new(1.0, 1.0, 0.0)),
            vertex(Point3::new(0.0, 1.0, 0.0)),
        ];
        let faces = vec![crate::topology::PolygonFace {
            vertex_indices: vec![0, 1, 2, 3],
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
        let patches = vec![Patch {
            faces: vec![0],
            function_index: 0,
        }];
        let integrals = integrate_patches(&mesh, &patches).unwrap();
        assert_eq!(integrals.len(), 1);
        assert!((integrals[0].surface_area - 1.0).abs() < 1e-9);
        assert!(integrals[0].signed_volume.abs() < 1e-9);
    }

    #[test]
    fn a_unit_cube_face_above_the_origin_contributes_a_nonzero_volume() {
        let vertices = vec![
            vertex(Point3::new(0.0, 0.0, 1.0)),
            vertex(Point3::new(1.0, 0.0, 1.0)),
            vertex(Point3::new(1.0, 1.0, 1.0)),
            vertex(Point3::new(0.0, 1.0, 1.0)),
        ];
        let faces = vec![crate::topology::PolygonFace {
            vertex_indices: vec![0, 1, 2, 3],
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
        let patches = vec![Patch {
            faces: vec![0],
            function_index: 0,
        }];
        let integrals = integrate_patches(&mesh, &patches).unwrap();
        // cross_sum = (0,0,2) for the two fan triangles, dotted with v0.z=1, /6.
        assert!((integrals[0].signed_volume - (1.0 / 3.0)).abs() < 1e-9);
    }
}
