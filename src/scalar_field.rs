//! Scalar field evaluation (spec §4.2): `S[j,i] = f_j(V[i])`, the derived
//! sign matrix, and the degenerate-vertex incident-tets index.

use log::debug;
use rayon::prelude::*;
use std::sync::Mutex;
use std::time::Instant;

use crate::background_mesh::BackgroundMesh;
use crate::primitives::Primitive;

/// Zero tolerance for scalar-field sign classification (spec §3: "`σ=0` iff
/// `|S|` underflows a documented tolerance").
pub const SIGN_ZERO_TOLERANCE: f64 = 1e-9;

/// Number of shards backing the incident-tets index (spec §9: "a fixed-N
/// sharded structure keyed by vertex index").
const INCIDENT_TETS_SHARDS: usize = 64;

fn sign(value: f64) -> i8 {
    if value.abs() <= SIGN_ZERO_TOLERANCE {
        0
    } else if value > 0.0 {
        1
    } else {
        -1
    }
}

/// `S[j,i]` and `σ[j,i]`, row-major by function then vertex.
pub struct ScalarField {
    pub num_functions: usize,
    pub num_vertices: usize,
    pub values: Vec<f64>,
    pub signs: Vec<i8>,
    /// `vertex_index -> tets containing it`, populated only for vertices
    /// where some function's sign is exactly zero.
    pub incident_tets: Vec<Vec<u32>>,
}

impl ScalarField {
    pub fn value(&self, function: usize, vertex: usize) -> f64 {
        self.values[function * self.num_vertices + vertex]
    }

    pub fn sign(&self, function: usize, vertex: usize) -> i8 {
        self.signs[function * self.num_vertices + vertex]
    }

    /// Evaluates every `(function, vertex)` pair in parallel and builds the
    /// incident-tets index for degenerate vertices (spec §4.2).
    ///
    /// Concurrency: each `(j,i)` cell of `values`/`signs` is written exactly
    /// once by the task that owns it, so no synchronisation is needed there
    /// (spec §5, ordering guarantee 2). The incident-tets index is mutated
    /// concurrently behind per-shard locks (ordering guarantee 3).
    pub fn evaluate(mesh: &BackgroundMesh, primitives: &[Primitive]) -> Self {
        let started = Instant::now();
        let num_functions = primitives.len();
        let num_vertices = mesh.vertices.len();

        let mut values = vec![0.0; num_functions * num_vertices];
        let mut signs = vec![0i8; num_functions * num_vertices];

        values
            .par_chunks_mut(num_vertices)
            .zip(signs.par_chunks_mut(num_vertices))
            .enumerate()
            .for_each(|(function, (value_row, sign_row))| {
                let evaluator = &primitives[function];
                for (vertex, slot) in value_row.iter_mut().enumerate() {
                    let value = evaluator.evaluate(&mesh.vertices[vertex]);
                    *slot = value;
                    sign_row[vertex] = sign(value);
                }
            });

        let shards: Vec<Mutex<Vec<(u32, Vec<u32>)>>> =
            (0..INCIDENT_TETS_SHARDS).map(|_| Mutex::new(Vec::new())).collect();

        mesh.tets.par_iter().enumerate().for_each(|(tet_index, corners)| {
            for &vertex in corners {
                let is_degenerate =
                    (0..num_functions).any(|function| signs[function * num_vertices + vertex as usize] == 0);
                if !is_degenerate {
                    continue;
                }
                let shard = vertex as usize % INCIDENT_TETS_SHARDS;
                let mut guard = shards[shard].lock().unwrap();
                match guard.iter_mut().find(|(v, _)| *v == vertex) {
                    Some((_, tets)) => tets.push(tet_index as u32),
                    None => guard.push((vertex, vec![tet_index as u32])),
                }
            }
        });

        let mut incident_tets = vec![Vec::new(); num_vertices];
        for shard in shards {
            for (vertex, mut tets) in shard.into_inner().unwrap() {
                tets.sort_unstable();
                incident_tets[vertex as usize] = tets;
            }
        }

        debug!(
            "scalar field evaluated: functions={num_functions} vertices={num_vertices} in {:?}",
            started.elapsed()
        );

        ScalarField {
            num_functions,
            num_vertices,
            values,
            signs,
            incident_tets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbox::BoundingBox;
    use nalgebra::Point3;

    #[test]
    fn sign_uses_strict_zero_tolerance() {
        assert_eq!(sign(0.0), 0);
        assert_eq!(sign(1e-12), 0);
        assert_eq!(sign(0.5), 1);
        assert_eq!(sign(-0.5), -1);
    }

    #[test]
    fn evaluate_fills_every_cell_exactly_once() {
        let bounds = BoundingBox::new(&Point3::new(-1.0, -1.0, -1.0), &Point3::new(1.0, 1.0, 1.0));
        let mesh = BackgroundMesh::generate(4, &bounds).unwrap();
        let primitives = vec![
            Primitive::Sphere {
                center: [0.0, 0.0, 0.0],
                radius: 0.5,
            },
            Primitive::Constant { value: 1.0 },
        ];
        let field = ScalarField::evaluate(&mesh, &primitives);
        assert_eq!(field.values.len(), 2 * mesh.vertices.len());
        assert!(field.signs.iter().all(|&s| s == -1 || s == 0 || s == 1));
        // The constant function is positive everywhere, so it contributes
        // no degenerate vertices on its own.
        assert!(field
            .incident_tets
            .iter()
            .enumerate()
            .all(|(v, tets)| tets.is_empty() || field.sign(0, v) == 0));
    }
}
