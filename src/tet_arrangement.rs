//! Per-tet arrangement driver (spec §4.3): active-function selection,
//! compressed-sparse active-function storage, and dispatch into the
//! single-tet kernel.

use log::debug;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::background_mesh::BackgroundMesh;
use crate::error::Result;
use crate::kernel::{self, TetArrangement};
use crate::scalar_field::ScalarField;

/// Results of the per-tet arrangement stage.
pub struct TetArrangementResults {
    /// All active function indices, concatenated per tet. Slot ranges are
    /// reserved via an atomic fetch-add (spec §4.3/§5) rather than a
    /// monotonic prefix sum, since tets claim space in whatever order their
    /// rayon task completes; `tet_active_range` records each tet's claimed
    /// `(start, count)` rather than relying on index-order subtraction.
    pub active_functions_in_tet: Vec<u16>,
    pub tet_active_range: Vec<(u32, u32)>,
    pub cut_results: Vec<Option<TetArrangement>>,
    pub num_1_func: usize,
    pub num_2_func: usize,
    pub num_more_func: usize,
}

impl TetArrangementResults {
    pub fn active_functions(&self, tet_index: usize) -> &[u16] {
        let (start, count) = self.tet_active_range[tet_index];
        &self.active_functions_in_tet[start as usize..(start + count) as usize]
    }
}

/// Determines whether function `j` is active in a tet, given the four
/// corner signs: not uniformly signed over the open interval `(-4, 4)`
/// (spec §4.3 step 1).
fn is_active(corner_signs: [i8; 4]) -> bool {
    let sum: i32 = corner_signs.iter().map(|&s| s as i32).sum();
    sum > -4 && sum < 4
}

/// Runs the per-tet driver over every tet in `mesh`, in parallel (spec §5:
/// per-tet arrangement is one of exactly two fan-out stages).
pub fn run(mesh: &BackgroundMesh, field: &ScalarField) -> Result<TetArrangementResults> {
    let started = Instant::now();
    let active_functions_in_tet = Mutex::new(Vec::new());
    let tet_active_range: Vec<Mutex<(u32, u32)>> = (0..mesh.tets.len()).map(|_| Mutex::new((0, 0))).collect();
    let num_1_func = AtomicUsize::new(0);
    let num_2_func = AtomicUsize::new(0);
    let num_more_func = AtomicUsize::new(0);

    let cut_results: Vec<Option<TetArrangement>> = mesh
        .tets
        .par_iter()
        .enumerate()
        .map(|(tet_index, corners)| -> Result<Option<TetArrangement>> {
            let active: Vec<u16> = (0..field.num_functions)
                .filter(|&function| {
                    let signs = [
                        field.sign(function, corners[0] as usize),
                        field.sign(function, corners[1] as usize),
                        field.sign(function, corners[2] as usize),
                        field.sign(function, corners[3] as usize),
                    ];
                    is_active(signs)
                })
                .map(|f| f as u16)
                .collect();

            match active.len() {
                0 => {}
                1 => {
                    num_1_func.fetch_add(1, Ordering::Relaxed);
                }
                2 => {
                    num_2_func.fetch_add(1, Ordering::Relaxed);
                }
                _ => {
                    num_more_func.fetch_add(1, Ordering::Relaxed);
                }
            }

            let start = {
                let mut buffer = active_functions_in_tet.lock().unwrap();
                let start = buffer.len() as u32;
                buffer.extend_from_slice(&active);
                start
            };
            *tet_active_range[tet_index].lock().unwrap() = (start, active.len() as u32);

            if active.is_empty() {
                return Ok(None);
            }

            let planes: Vec<(u16, [f64; 4])> = active
                .iter()
                .map(|&function| {
                    let coeffs = [
                        field.value(function as usize, corners[0] as usize),
                        field.value(function as usize, corners[1] as usize),
                        field.value(function as usize, corners[2] as usize),
                        field.value(function as usize, corners[3] as usize),
                    ];
                    (function, coeffs)
                })
                .collect();

            kernel::compute_arrangement(tet_index as u32, &planes).map(Some)
        })
        .collect::<Result<Vec<_>>>()?;

    let tet_active_range = tet_active_range.into_iter().map(|m| m.into_inner().unwrap()).collect();
    let active_functions_in_tet = active_functions_in_tet.into_inner().unwrap();

    debug!(
        "per-tet arrangement done: tets={} 1-func={} 2-func={} more-func={} in {:?}",
        mesh.tets.len(),
        num_1_func.load(Ordering::Relaxed),
        num_2_func.load(Ordering::Relaxed),
        num_more_func.load(Ordering::Relaxed),
        started.elapsed()
    );

    Ok(TetArrangementResults {
        active_functions_in_tet,
        tet_active_range,
        cut_results,
        num_1_func: num_1_func.load(Ordering::Relaxed),
        num_2_func: num_2_func.load(Ordering::Relaxed),
        num_more_func: num_more_func.load(Ordering::Relaxed),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbox::BoundingBox;
    use nalgebra::Point3;

    use crate::primitives::Primitive;

    #[test]
    fn active_requires_a_sign_change() {
        assert!(!is_active([1, 1, 1, 1]));
        assert!(!is_active([-1, -1, -1, -1]));
        assert!(is_active([1, -1, 1, 1]));
        assert!(is_active([0, 0, 0, 0]));
    }

    #[test]
    fn empty_scene_has_no_active_tets() {
        let bounds = BoundingBox::new(&Point3::new(-1.0, -1.0, -1.0), &Point3::new(1.0, 1.0, 1.0));
        let mesh = BackgroundMesh::generate(2, &bounds).unwrap();
        let primitives: Vec<Primitive> = vec![];
        let field = ScalarField::evaluate(&mesh, &primitives);
        let results = run(&mesh, &field).unwrap();
        assert!(results.cut_results.iter().all(Option::is_none));
        assert_eq!(results.num_1_func + results.num_2_func + results.num_more_func, 0);
    }

    #[test]
    fn sphere_produces_some_active_tets() {
        let bounds = BoundingBox::new(&Point3::new(-1.0, -1.0, -1.0), &Point3::new(1.0, 1.0, 1.0));
        let mesh = BackgroundMesh::generate(6, &bounds).unwrap();
        let primitives = vec![Primitive::Sphere {
            center: [0.0, 0.0, 0.0],
            radius: 0.5,
        }];
        let field = ScalarField::evaluate(&mesh, &primitives);
        let results = run(&mesh, &field).unwrap();
        assert!(results.num_1_func > 0);
        assert!(results.cut_results.iter().any(Option::is_some));
    }
}
