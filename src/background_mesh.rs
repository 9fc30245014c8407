//! Regular tetrahedral background mesh generation (spec §4.1).
//!
//! A resolution-`R` background mesh covers an axis-aligned box with
//! `(R+1)^3` vertices laid out on a regular grid and `5 R^3` tetrahedra, five
//! per grid cell, alternating between two parity-dependent corner
//! decompositions so that shared faces between neighbouring cells agree.

use bbox::BoundingBox;
use log::debug;
use nalgebra::Point3;
use std::time::Instant;

use crate::error::{PipelineError, Result};

/// The four vertex indices of one tetrahedron, local to a
/// [`BackgroundMesh`]'s `vertices` array.
pub type TetIndices = [u32; 4];

/// A regular tetrahedral mesh tiling an axis-aligned box.
#[derive(Clone, Debug)]
pub struct BackgroundMesh {
    /// Grid resolution along each axis; there are `resolution + 1` vertices
    /// and `resolution` cells per axis.
    pub resolution: u32,
    /// Vertex positions, indexed `i*N*N + j*N + k` with `N = resolution + 1`.
    pub vertices: Vec<Point3<f64>>,
    /// Five tets per grid cell, `resolution^3 * 5` entries total.
    pub tets: Vec<TetIndices>,
}

impl BackgroundMesh {
    /// Generates the background mesh for `resolution` over `bounds`.
    ///
    /// The grid is sampled by linear interpolation across `bounds` so the
    /// outermost layer of vertices lies exactly on the box boundary.
    pub fn generate(resolution: u32, bounds: &BoundingBox<f64>) -> Result<Self> {
        if resolution == 0 {
            return Err(PipelineError::ConfigurationInvalid(
                "resolution must be greater than zero".to_string(),
            ));
        }
        let min = bounds.min;
        let max = bounds.max;
        if (0..3).any(|axis| !(max[axis] > min[axis])) {
            return Err(PipelineError::ConfigurationInvalid(
                "background mesh bounds must have positive extent on every axis".to_string(),
            ));
        }

        let started = Instant::now();
        let n = resolution + 1;
        let mut vertices = vec![Point3::origin(); (n * n * n) as usize];
        let mut tets = Vec::with_capacity((resolution as usize).pow(3) * 5);

        let lerp = |lo: f64, hi: f64, i: u32, r: u32| (hi - lo) * (i as f64) / (r as f64) + lo;

        for i in 0..n {
            let x = lerp(min[0], max[0], i, resolution);
            for j in 0..n {
                let y = lerp(min[1], max[1], j, resolution);
                for k in 0..n {
                    let z = lerp(min[2], max[2], k, resolution);
                    let v0 = vertex_index(i, j, k, n);
                    vertices[v0 as usize] = Point3::new(x, y, z);

                    if i < resolution && j < resolution && k < resolution {
                        let v1 = vertex_index(i + 1, j, k, n);
                        let v2 = vertex_index(i + 1, j + 1, k, n);
                        let v3 = vertex_index(i, j + 1, k, n);
                        let v4 = vertex_index(i, j, k + 1, n);
                        let v5 = vertex_index(i + 1, j, k + 1, n);
                        let v6 = vertex_index(i + 1, j + 1, k + 1, n);
                        let v7 = vertex_index(i, j + 1, k + 1, n);

                        let cell_tets = if (i + j + k) % 2 == 0 {
                            [
                                [v4, v6, v1, v3],
                                [v6, v3, v4, v7],
                                [v1, v3, v0, v4],
                                [v3, v1, v2, v6],
                                [v4, v1, v6, v5],
                            ]
                        } else {
                            [
                                [v7, v0, v2, v5],
                                [v2, v3, v0, v7],
                                [v5, v7, v0, v4],
                                [v7, v2, v6, v5],
                                [v0, v1, v2, v5],
                            ]
                        };
                        tets.extend_from_slice(&cell_tets);
                    }
                }
            }
        }

        debug!(
            "background mesh generated: resolution={resolution} vertices={} tets={} in {:?}",
            vertices.len(),
            tets.len(),
            started.elapsed()
        );

        Ok(BackgroundMesh {
            resolution,
            vertices,
            tets,
        })
    }

    /// Number of tetrahedra, always `5 * resolution^3`.
    pub fn tet_count(&self) -> usize {
        self.tets.len()
    }
}

fn vertex_index(i: u32, j: u32, k: u32, n: u32) -> u32 {
    i * n * n + j * n + k
}
