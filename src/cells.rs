//! Shells, components, and arrangement cells (spec §4.7).

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};

use crate::error::Result;
use crate::mesh_extraction::ExtractedMesh;
use crate::patches::UnionFind;
use crate::topology::{half_patch_id, half_patch_is_negative, half_patch_patch, ArrangementCell, Component, Patch, Shell};

/// Ray-marching epsilon: hits closer than this to the ray origin are treated
/// as the surface we just launched from, not a genuine crossing.
const RAY_EPSILON: f64 = 1e-6;

/// Groups half-patches into shells: the connected components of the
/// half-patch adjacency graph built while ordering patches around chains
/// (spec §4.6/§4.7).
pub fn compute_shells(half_patch_adj_list: &[Vec<(u32, u32)>], num_patches: usize) -> Vec<Shell> {
    let num_half_patches = 2 * num_patches;
    let mut uf = UnionFind::new(num_half_patches);
    for adjacency in half_patch_adj_list {
        for &(a, b) in adjacency {
            uf.union(a, b);
        }
    }

    let mut by_root: HashMap<u32, Vec<u32>> = HashMap::new();
    for hp in 0..num_half_patches as u32 {
        by_root.entry(uf.find(hp)).or_default().push(hp);
    }
    by_root.into_values().map(|half_patches| Shell { half_patches }).collect()
}

/// Groups patches into components: patches connected through chain
/// adjacency, which subsumes sharing a non-manifold edge (spec §4.7).
pub fn compute_components(half_patch_adj_list: &[Vec<(u32, u32)>], num_patches: usize) -> Vec<Component> {
    let mut uf = UnionFind::new(num_patches);
    for adjacency in half_patch_adj_list {
        for &(a, b) in adjacency {
            uf.union(half_patch_patch(a), half_patch_patch(b));
        }
    }

    let mut by_root: HashMap<u32, Vec<u32>> = HashMap::new();
    for patch in 0..num_patches as u32 {
        by_root.entry(uf.find(patch)).or_default().push(patch);
    }
    by_root.into_values().map(|patches| Component { patches }).collect()
}

fn shell_of_half_patch(shells: &[Shell], half_patch: u32) -> u32 {
    shells
        .iter()
        .position(|s| s.half_patches.contains(&half_patch))
        .expect("every half-patch belongs to exactly one shell") as u32
}

fn fan_triangles(vertex_indices: &[u32]) -> Vec<(u32, u32, u32)> {
    let v0 = vertex_indices[0];
    (1..vertex_indices.len() - 1)
        .map(|i| (v0, vertex_indices[i], vertex_indices[i + 1]))
        .collect()
}

fn ray_triangle_intersect(origin: &Point3<f64>, direction: &Vector3<f64>, p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> Option<f64> {
    let edge1 = p1 - p0;
    let edge2 = p2 - p0;
    let h = direction.cross(&edge2);
    let a = edge1.dot(&h);
    if a.abs() < 1e-12 {
        return None;
    }
    let f = 1.0 / a;
    let s = origin - p0;
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(&edge1);
    let v = f * direction.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = f * edge2.dot(&q);
    if t > RAY_EPSILON {
        Some(t)
    } else {
        None
    }
}

/// Finds, for a ray leaving `origin` along `direction`, the nearest face hit
/// that does not belong to `excluded_shell`, returning the half-patch it
/// belongs to.
fn nearest_foreign_hit(
    extracted: &ExtractedMesh,
    patch_of_face: &HashMap<u32, u32>,
    shells: &[Shell],
    excluded_shell: u32,
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
) -> Option<u32> {
    let mut best: Option<(f64, u32)> = None;

    for (face_index, face) in extracted.faces.iter().enumerate() {
        if face.vertex_indices.len() < 3 {
            continue;
        }
        let patch_index = patch_of_face[&(face_index as u32)];
        for (a, b, c) in fan_triangles(&face.vertex_indices) {
            let p0 = extracted.vertices[a as usize].position;
            let p1 = extracted.vertices[b as usize].position;
            let p2 = extracted.vertices[c as usize].position;
            let Some(t) = ray_triangle_intersect(origin, direction, &p0, &p1, &p2) else {
                continue;
            };
            let edge1 = p1 - p0;
            let edge2 = p2 - p0;
            let normal = edge1.cross(&edge2);
            let negative_side = direction.dot(&normal) <= 0.0;
            let hp = half_patch_id(patch_index, negative_side);
            let shell = shell_of_half_patch(shells, hp);
            if shell == excluded_shell {
                continue;
            }
            if best.map_or(true, |(best_t, _)| t < best_t) {
                best = Some((t, shell));
            }
        }
    }

    best.map(|(_, shell)| shell)
}

/// A point just outside `shell`'s surface, pushed along the outward normal
/// of one of its faces by a fixed epsilon. Used both to seed the ray-shoot
/// in `compute_arrangement_cells` and, when the `sign-propagation` feature
/// is enabled, to sample each primitive's sign per cell.
fn shell_representative_point(extracted: &ExtractedMesh, patches: &[Patch], shell: &Shell) -> Result<Point3<f64>> {
    let &representative_hp = shell
        .half_patches
        .first()
        .ok_or_else(|| crate::error::PipelineError::InvariantViolation("shell has no half-patches".to_string()))?;
    let patch_index = half_patch_patch(representative_hp);
    let negative = half_patch_is_negative(representative_hp);
    let patch = &patches[patch_index as usize];
    let face_index = patch.faces[0];
    let face = &extracted.faces[face_index as usize];
    let (a, b, c) = fan_triangles(&face.vertex_indices)[0];
    let p0 = extracted.vertices[a as usize].position;
    let p1 = extracted.vertices[b as usize].position;
    let p2 = extracted.vertices[c as usize].position;
    let centroid = Point3::from((p0.coords + p1.coords + p2.coords) / 3.0);
    let mut normal = (p1 - p0).cross(&(p2 - p0)).normalize();
    if negative {
        normal = -normal;
    }
    Ok(centroid + normal * 1e-5)
}

/// Per-`(function, cell)` sign labels (spec §9 "Sign-propagation step"). The
/// original source declares this array but never wires up the stage that
/// would populate it; kept behind a feature flag rather than guessing its
/// intended output shape. Samples each primitive directly at a point just
/// inside one of the cell's bounding shells.
#[cfg(feature = "sign-propagation")]
pub fn compute_cell_function_labels(
    extracted: &ExtractedMesh,
    patches: &[Patch],
    shells: &[Shell],
    cells: &[ArrangementCell],
    primitives: &[crate::primitives::Primitive],
) -> Result<Vec<Vec<bool>>> {
    cells
        .iter()
        .map(|cell| {
            let Some(&shell_index) = cell.bounding_shells.first() else {
                // The whole-space cell of an empty scene: no surface to sample near.
                return Ok(vec![true; primitives.len()]);
            };
            let point = shell_representative_point(extracted, patches, &shells[shell_index as usize])?;
            Ok(primitives.iter().map(|p| p.evaluate(&point) >= 0.0).collect())
        })
        .collect()
}

/// Computes arrangement cells (spec §4.7). With a single component every
/// shell directly bounds its own cell; otherwise nesting is resolved by
/// topological ray shooting: from a point just outside each shell, cast an
/// axis-aligned ray to infinity and take the nearest other shell's surface
/// it crosses as its immediate enclosing shell.
pub fn compute_arrangement_cells(
    extracted: &ExtractedMesh,
    patches: &[Patch],
    shells: &[Shell],
    components: &[Component],
) -> Result<Vec<ArrangementCell>> {
    if shells.is_empty() {
        return Ok(vec![ArrangementCell { bounding_shells: Vec::new() }]);
    }

    if components.len() <= 1 {
        return Ok(shells
            .iter()
            .enumerate()
            .map(|(shell_index, _)| ArrangementCell {
                bounding_shells: vec![shell_index as u32],
            })
            .collect());
    }

    let mut patch_of_face: HashMap<u32, u32> = HashMap::new();
    for (patch_index, patch) in patches.iter().enumerate() {
        for &face in &patch.faces {
            patch_of_face.insert(face, patch_index as u32);
        }
    }

    let direction = Vector3::new(1.0, 0.0, 0.0);
    let mut parent_of_shell: Vec<Option<u32>> = vec![None; shells.len()];

    for (shell_index, shell) in shells.iter().enumerate() {
        let origin = shell_representative_point(extracted, patches, shell)?;
        parent_of_shell[shell_index] = nearest_foreign_hit(extracted, &patch_of_face, shells, shell_index as u32, &origin, &direction);
    }

    let mut cells: Vec<ArrangementCell> = (0..shells.len())
        .map(|shell_index| {
            let mut bounding_shells = vec![shell_index as u32];
            if let Some(parent) = parent_of_shell[shell_index] {
                bounding_shells.push(parent);
            }
            ArrangementCell { bounding_shells }
        })
        .collect();

    let outermost: Vec<u32> = (0..shells.len() as u32).filter(|&s| parent_of_shell[s as usize].is_none()).collect();
    if !outermost.is_empty() {
        cells.push(ArrangementCell { bounding_shells: outermost });
    }

    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_disjoint_chains_form_two_shells() {
        // hp 0<->1 in one shell, hp 2<->3 in another; patch indices 0 and 1.
        let adj = vec![vec![(0u32, 1u32)], vec![(2u32, 3u32)]];
        let shells = compute_shells(&adj, 2);
        assert_eq!(shells.len(), 2);
    }

    #[test]
    fn chain_adjacency_merges_patches_into_one_component() {
        let adj = vec![vec![(0u32, 2u32)]];
        let components = compute_components(&adj, 2);
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].patches.len(), 2);
    }

    #[test]
    fn single_component_gives_one_cell_per_shell() {
        let shells = vec![Shell { half_patches: vec![0, 1] }, Shell { half_patches: vec![2, 3] }];
        let components = vec![Component { patches: vec![0, 1] }];
        let extracted = ExtractedMesh {
            vertices: Vec::new(),
            faces: Vec::new(),
            global_face_of_header: HashMap::new(),
        };
        let patches: Vec<Patch> = Vec::new();
        let cells = compute_arrangement_cells(&extracted, &patches, &shells, &components).unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].bounding_shells, vec![0]);
    }
}
