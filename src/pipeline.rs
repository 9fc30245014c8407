//! Top-level orchestrator: background mesh → scalar field → per-tet
//! arrangement → extraction → edges/patches → chains → cells → integration
//! (spec §2, §5). A single coordinator runs every stage sequentially; only
//! §4.2 and §4.3 fan out internally.

use std::collections::HashMap;
use std::time::Instant;

use bbox::BoundingBox;
use log::info;
use nalgebra::Point3;

use crate::background_mesh::BackgroundMesh;
use crate::cells::{compute_arrangement_cells, compute_components, compute_shells};
use crate::chains::{compute_chains, compute_patch_order};
use crate::error::{PipelineError, Result};
use crate::integrator::integrate_patches;
use crate::mesh_extraction::extract;
use crate::patches::{compute_edges, compute_patches};
use crate::polymesh::{PolyMesh, SolveResult};
use crate::primitives::Primitive;
use crate::scalar_field::ScalarField;
use crate::settings::Settings;
use crate::tet_arrangement;
use crate::topology::{ArrangementCell, Chain, Component, Patch, Shell};

/// Everything the core computed for one run, kept around so a caller can
/// request integrals over an arbitrary subset of patches without re-running
/// the pipeline (spec §6's "aggregates over all patches the caller
/// requested").
pub struct PipelineResult {
    pub extracted: crate::mesh_extraction::ExtractedMesh,
    pub patches: Vec<Patch>,
    pub chains: Vec<Chain>,
    pub shells: Vec<Shell>,
    pub components: Vec<Component>,
    pub cells: Vec<ArrangementCell>,
    pub integrals: Vec<crate::integrator::PatchIntegral>,
}

/// Parses a CSG scene description, failing at the boundary on an unknown
/// primitive type or malformed input (spec §7, `SceneLoadFailure`).
pub fn load_scene(json: &str) -> Result<Vec<Primitive>> {
    serde_json::from_str(json).map_err(|e| PipelineError::SceneLoadFailure(e.to_string()))
}

/// Runs the full pipeline over `primitives` within `bounds`. Returns
/// `ConfigurationInvalid` if `settings` fails validation before any work
/// begins (spec §7).
pub fn run(settings: &Settings, bounds: &BoundingBox<f64>, primitives: &[Primitive]) -> Result<PipelineResult> {
    settings.validate()?;
    let started = Instant::now();

    let mesh = BackgroundMesh::generate(settings.resolution, bounds)?;
    let field = ScalarField::evaluate(&mesh, primitives);
    let driver = tet_arrangement::run(&mesh, &field)?;
    let extracted = extract(&mesh, &driver)?;

    let edges = compute_edges(&extracted);
    let patches = compute_patches(&extracted, &edges)?;

    let mut face_to_patch: HashMap<u32, u32> = HashMap::new();
    for (patch_index, patch) in patches.iter().enumerate() {
        for &face in &patch.faces {
            face_to_patch.insert(face, patch_index as u32);
        }
    }

    let chains = compute_chains(&edges);
    let half_patch_adj_list = compute_patch_order(&mesh, &field, &driver, &extracted, &face_to_patch, &chains, &edges)?;

    let shells = compute_shells(&half_patch_adj_list, patches.len());
    let components = compute_components(&half_patch_adj_list, patches.len());
    let cells = compute_arrangement_cells(&extracted, &patches, &shells, &components)?;

    let integrals = integrate_patches(&extracted, &patches)?;

    info!(
        "pipeline run complete: resolution={} tets={} patches={} chains={} shells={} components={} cells={} in {:?}",
        settings.resolution,
        mesh.tet_count(),
        patches.len(),
        chains.len(),
        shells.len(),
        components.len(),
        cells.len(),
        started.elapsed()
    );

    Ok(PipelineResult {
        extracted,
        patches,
        chains,
        shells,
        components,
        cells,
        integrals,
    })
}

/// Assembles a boundary-facing `SolveResult` from a finished pipeline run,
/// aggregating integrals over `selected_patches` (or every patch, if
/// `None`). A selection naming a patch index the run never produced is
/// recoverable — there is nothing wrong with the run itself — so it comes
/// back as `SolveResult::failure()` rather than panicking on the
/// out-of-bounds index.
pub fn solve_result(result: &PipelineResult, selected_patches: Option<&[u32]>) -> SolveResult {
    if let Some(indices) = selected_patches {
        if indices.iter().any(|&i| i as usize >= result.patches.len()) {
            return SolveResult::failure();
        }
    }
    let mesh = PolyMesh::from_extracted(&result.extracted, &result.patches, selected_patches);
    SolveResult::aggregate(mesh, &result.integrals, selected_patches)
}

/// Computes a scene's bounding box expanded by `scene_aabb_margin`, the
/// boundary step before the core runs (spec §4.1 ties generation to
/// `resolution` and an axis-aligned box; the box itself comes from the
/// scene plus the configured margin).
pub fn scene_bounds(points: &[Point3<f64>], margin: f64) -> Result<BoundingBox<f64>> {
    if points.is_empty() {
        return Err(PipelineError::SceneLoadFailure("scene has no geometry to bound".to_string()));
    }
    let mut min = points[0];
    let mut max = points[0];
    for p in &points[1..] {
        min = Point3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
        max = Point3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
    }
    let margin_vec = nalgebra::Vector3::new(margin, margin, margin);
    Ok(BoundingBox::new(&(min - margin_vec), &(max + margin_vec)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scene_yields_one_cell_and_no_patches() {
        let bounds = BoundingBox::new(&Point3::new(-1.0, -1.0, -1.0), &Point3::new(1.0, 1.0, 1.0));
        let settings = Settings {
            resolution: 4,
            scene_aabb_margin: 0.0,
        };
        let result = run(&settings, &bounds, &[]).unwrap();
        assert!(result.patches.is_empty());
        assert_eq!(result.cells.len(), 1);
    }

    #[test]
    fn invalid_settings_fail_before_any_work() {
        let bounds = BoundingBox::new(&Point3::new(-1.0, -1.0, -1.0), &Point3::new(1.0, 1.0, 1.0));
        let settings = Settings {
            resolution: 0,
            scene_aabb_margin: 0.0,
        };
        assert!(run(&settings, &bounds, &[]).is_err());
    }

    #[test]
    fn a_sphere_produces_patches_and_a_nonzero_surface_integral() {
        let bounds = BoundingBox::new(&Point3::new(-1.0, -1.0, -1.0), &Point3::new(1.0, 1.0, 1.0));
        let settings = Settings {
            resolution: 8,
            scene_aabb_margin: 0.0,
        };
        let primitives = vec![Primitive::Sphere {
            center: [0.0, 0.0, 0.0],
            radius: 0.5,
        }];
        let result = run(&settings, &bounds, &primitives).unwrap();
        assert!(!result.patches.is_empty());
        let solved = solve_result(&result, None);
        assert!(solved.success);
        assert!(solved.surf_int > 0.0);
    }

    #[test]
    fn malformed_scene_json_is_a_scene_load_failure() {
        assert!(load_scene("{ not json").is_err());
    }

    #[test]
    fn solving_an_out_of_range_patch_selection_fails_gracefully() {
        let bounds = BoundingBox::new(&Point3::new(-1.0, -1.0, -1.0), &Point3::new(1.0, 1.0, 1.0));
        let settings = Settings {
            resolution: 8,
            scene_aabb_margin: 0.0,
        };
        let primitives = vec![Primitive::Sphere {
            center: [0.0, 0.0, 0.0],
            radius: 0.5,
        }];
        let result = run(&settings, &bounds, &primitives).unwrap();
        let out_of_range = result.patches.len() as u32;
        let solved = solve_result(&result, Some(&[out_of_range]));
        assert!(!solved.success);
        assert_eq!(solved.surf_int, 0.0);
        assert_eq!(solved.mesh.num_faces, 0);
    }
}
