//! The single-tet arrangement kernel (spec §6 "consumed" interface).
//!
//! Spec §1 names this kernel an external collaborator: given a handful of
//! cutting planes inside one tetrahedron, return a combinatorial cell
//! complex. This module is a concrete implementation of that interface,
//! operating entirely in barycentric coordinates — it never sees real 3D
//! positions, which are reconstructed downstream (`mesh_extraction.rs`) from
//! the barycentric identities this kernel produces.
//!
//! The tet is clipped by one plane per active function in turn (a binary
//! space partition): every existing 3-cell is split into its negative- and
//! positive-sign halves, and the cross-section becomes a new shared face
//! between the two children. Because each split operates on a convex
//! polyhedron, the cross-section is always a single convex polygon, and its
//! boundary can be assembled by chaining the cap edge each straddling face
//! contributes — no angular sort or real geometry is needed for the split
//! itself.
//!
//! Once the full per-tet arrangement is assembled, `edge_face_order` gives
//! the cyclic ordering of faces around every kernel edge (spec §4.6, "query
//! `cut_results[k]` to retrieve the cyclic ordering of faces around the
//! kernel edge"). Ordering uses a fixed canonical tetrahedron purely as a
//! combinatorial ruler: any non-degenerate affine embedding of the same
//! barycentric coordinates yields the same cyclic order of half-planes
//! around a shared line, so this never needs the real, possibly-skewed
//! shape of the background-mesh tet being arranged.

use smallvec::SmallVec;
use std::collections::HashMap;

use nalgebra::Vector3;

use crate::error::{PipelineError, Result};

/// Zero tolerance for barycentric plane evaluation, matching the scalar
/// field's strict-zero sign rule (spec §3, `ScalarField` invariants).
pub const ZERO_TOLERANCE: f64 = 1e-10;

/// Identifies the plane a kernel face lies on: one of the tet's own four
/// boundary facets, or one of the active cutting planes (by function index).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LocalPlane {
    TetBoundary(u8),
    Active(u16),
}

/// One vertex of the arrangement, positioned by barycentric coordinates in
/// the host tet and annotated with every active function whose plane it
/// lies exactly on.
#[derive(Clone, Debug)]
pub struct KernelVertex {
    pub bary: [f64; 4],
    pub functions: SmallVec<[u16; 3]>,
}

/// Which sub-simplex of the tet a kernel vertex's barycentric coordinates
/// pin it to, independent of any cutting planes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TetSimplex {
    /// Interior of the tet; no barycentric coordinate is zero.
    Interior,
    /// On one of the tet's four triangular faces.
    Face(u8),
    /// On one of the tet's six edges, given as the two corner indices.
    Edge(u8, u8),
    /// Exactly at one of the tet's four corners.
    Corner(u8),
}

impl KernelVertex {
    fn zero_coords(&self) -> SmallVec<[u8; 4]> {
        (0..4u8)
            .filter(|&c| self.bary[c as usize].abs() <= ZERO_TOLERANCE)
            .collect()
    }

    /// Classifies which sub-simplex of the tet this vertex's position is
    /// pinned to by its zero barycentric coordinates alone.
    pub fn tet_simplex(&self) -> TetSimplex {
        let zeros = self.zero_coords();
        match zeros.len() {
            0 => TetSimplex::Interior,
            1 => TetSimplex::Face(zeros[0]),
            2 => TetSimplex::Edge(zeros[0], zeros[1]),
            3 => {
                let corner = (0..4u8).find(|c| !zeros.contains(c)).unwrap();
                TetSimplex::Corner(corner)
            }
            _ => TetSimplex::Corner(0),
        }
    }
}

/// A face of the tet arrangement: an ordered vertex ring lying on one
/// supporting plane (a tet boundary facet or an active cutting plane).
#[derive(Clone, Debug)]
pub struct KernelFace {
    pub supporting: LocalPlane,
    pub ring: Vec<u32>,
}

/// One face touching a kernel edge, in the cyclic order computed around it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EdgeFaceEntry {
    /// Index into `TetArrangement::faces`.
    pub face: u32,
    /// Whether this face's ring traverses the edge from its smaller vertex
    /// index to its larger one (`true`), or the reverse (`false`).
    pub forward: bool,
}

/// The full combinatorial result of arranging one tetrahedron.
#[derive(Clone, Debug, Default)]
pub struct TetArrangement {
    pub vertices: Vec<KernelVertex>,
    pub faces: Vec<KernelFace>,
    /// One entry per 3-cell, each a list of face indices into `faces`.
    pub cells: Vec<Vec<u32>>,
    /// Cyclic ordering of the faces around every kernel edge touched by two
    /// or more faces, keyed by `(min(a, b), max(a, b))` vertex indices.
    pub edge_face_order: HashMap<(u32, u32), Vec<EdgeFaceEntry>>,
}

const FACE_OUTWARD: [[u8; 3]; 4] = [[1, 3, 2], [0, 2, 3], [0, 3, 1], [0, 1, 2]];

fn initial_tet() -> TetArrangement {
    let vertices = (0..4u8)
        .map(|c| {
            let mut bary = [0.0; 4];
            bary[c as usize] = 1.0;
            KernelVertex {
                bary,
                functions: SmallVec::new(),
            }
        })
        .collect();
    let faces = FACE_OUTWARD
        .iter()
        .enumerate()
        .map(|(opposite, ring)| KernelFace {
            supporting: LocalPlane::TetBoundary(opposite as u8),
            ring: ring.iter().map(|&c| c as u32).collect(),
        })
        .collect();
    TetArrangement {
        vertices,
        faces,
        cells: vec![vec![0, 1, 2, 3]],
        edge_face_order: HashMap::new(),
    }
}

/// Computes the arrangement of `planes` (one per active function, in
/// barycentric coefficient form) inside a single tetrahedron.
///
/// Returns `KernelDegeneracy` if a plane is uniformly zero across the whole
/// tet (every corner coordinate is zero), which the kernel cannot resolve
/// into a cut.
pub fn compute_arrangement(tet_index: u32, planes: &[(u16, [f64; 4])]) -> Result<TetArrangement> {
    let mut arrangement = initial_tet();

    for &(function, coeffs) in planes {
        if coeffs.iter().all(|c| c.abs() <= ZERO_TOLERANCE) {
            return Err(PipelineError::KernelDegeneracy {
                tet_index,
                detail: format!("function {function} plane vanishes identically on tet"),
            });
        }
        split_by_plane(&mut arrangement, function, coeffs)?;
    }

    arrangement.edge_face_order = build_edge_face_order(&arrangement);
    Ok(arrangement)
}

/// Canonical unit-tetrahedron corners (matching the corner order
/// `initial_tet` assigns), used only to rank faces cyclically around a
/// shared edge.
const CANONICAL_CORNERS: [[f64; 3]; 4] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

fn canonical_position(bary: &[f64; 4]) -> Vector3<f64> {
    let mut p = Vector3::zeros();
    for (c, corner) in CANONICAL_CORNERS.iter().enumerate() {
        p += Vector3::new(corner[0], corner[1], corner[2]) * bary[c];
    }
    p
}

fn perpendicular_basis(axis: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let arbitrary = if axis.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
    let u = axis.cross(&arbitrary).normalize();
    let w = axis.cross(&u);
    (u, w)
}

/// Builds `TetArrangement::edge_face_order`: for every edge touched by two
/// or more faces, the faces in cyclic order around it.
fn build_edge_face_order(arrangement: &TetArrangement) -> HashMap<(u32, u32), Vec<EdgeFaceEntry>> {
    let mut by_edge: HashMap<(u32, u32), Vec<EdgeFaceEntry>> = HashMap::new();
    for (face_index, face) in arrangement.faces.iter().enumerate() {
        let n = face.ring.len();
        for i in 0..n {
            let a = face.ring[i];
            let b = face.ring[(i + 1) % n];
            by_edge.entry((a.min(b), a.max(b))).or_default().push(EdgeFaceEntry {
                face: face_index as u32,
                forward: a < b,
            });
        }
    }

    for (&(a, b), entries) in by_edge.iter_mut() {
        if entries.len() < 3 {
            // A manifold (2-face) or boundary (1-face) edge has only one
            // possible cyclic arrangement; no ranking needed.
            continue;
        }
        let pa = canonical_position(&arrangement.vertices[a as usize].bary);
        let pb = canonical_position(&arrangement.vertices[b as usize].bary);
        let axis = (pb - pa).normalize();
        let (u, w) = perpendicular_basis(&axis);

        let mut ranked: Vec<(f64, EdgeFaceEntry)> = entries
            .iter()
            .filter_map(|&entry| {
                let face = &arrangement.faces[entry.face as usize];
                let reference = face.ring.iter().copied().find(|&v| v != a && v != b)?;
                let p = canonical_position(&arrangement.vertices[reference as usize].bary);
                let offset = p - pa;
                let planar = offset - axis * offset.dot(&axis);
                Some((planar.dot(&w).atan2(planar.dot(&u)), entry))
            })
            .collect();
        ranked.sort_by(|x, y| x.0.partial_cmp(&y.0).unwrap());
        *entries = ranked.into_iter().map(|(_, entry)| entry).collect();
    }

    by_edge
}

fn eval_plane(coeffs: [f64; 4], bary: [f64; 4]) -> f64 {
    coeffs[0] * bary[0] + coeffs[1] * bary[1] + coeffs[2] * bary[2] + coeffs[3] * bary[3]
}

fn split_by_plane(arrangement: &mut TetArrangement, function: u16, coeffs: [f64; 4]) -> Result<()> {
    let values: Vec<f64> = arrangement
        .vertices
        .iter()
        .map(|v| eval_plane(coeffs, v.bary))
        .collect();

    let mut new_cells = Vec::with_capacity(arrangement.cells.len());
    for cell in std::mem::take(&mut arrangement.cells) {
        let cell_values: Vec<f64> = cell
            .iter()
            .flat_map(|&fi| arrangement.faces[fi as usize].ring.iter())
            .map(|&v| values[v as usize])
            .collect();

        let all_nonpositive = cell_values.iter().all(|&v| v <= ZERO_TOLERANCE);
        let all_nonnegative = cell_values.iter().all(|&v| v >= -ZERO_TOLERANCE);

        if all_nonpositive && !all_nonnegative {
            new_cells.push(cell);
            continue;
        }
        if all_nonnegative && !all_nonpositive {
            new_cells.push(cell);
            continue;
        }
        if all_nonpositive && all_nonnegative {
            // The plane touches this cell only tangentially (every vertex
            // lies exactly on it); no interior cut. Leave the cell intact.
            new_cells.push(cell);
            continue;
        }

        let (neg_cell, pos_cell) = split_cell(arrangement, &cell, function, coeffs, &values)?;
        new_cells.push(neg_cell);
        new_cells.push(pos_cell);
    }
    arrangement.cells = new_cells;
    Ok(())
}

/// Splits one convex cell by the plane, returning (negative-side,
/// positive-side) face-index lists. Mutates `arrangement` to append any new
/// vertices/faces created by the cut.
fn split_cell(
    arrangement: &mut TetArrangement,
    cell: &[u32],
    function: u16,
    coeffs: [f64; 4],
    values: &[f64],
) -> Result<(Vec<u32>, Vec<u32>)> {
    let mut values = values.to_vec();
    let mut cut_vertex_of_edge: HashMap<(u32, u32), u32> = HashMap::new();
    let mut neg_faces = Vec::new();
    let mut pos_faces = Vec::new();
    // Directed cap edges contributed by each straddling face, read off the
    // negative-side ring: (from, to) meaning the cap boundary runs from the
    // exit point to the entry point on that face.
    let mut cap_edges: HashMap<u32, u32> = HashMap::new();

    for &face_idx in cell {
        let face = arrangement.faces[face_idx as usize].clone();
        let ring = &face.ring;
        let ring_values: Vec<f64> = ring.iter().map(|&v| values[v as usize]).collect();

        let any_pos = ring_values.iter().any(|&v| v > ZERO_TOLERANCE);
        let any_neg = ring_values.iter().any(|&v| v < -ZERO_TOLERANCE);

        if !any_pos {
            neg_faces.push(face_idx);
            continue;
        }
        if !any_neg {
            pos_faces.push(face_idx);
            continue;
        }

        let n = ring.len();
        let mut neg_ring = Vec::new();
        let mut neg_is_cut = Vec::new();
        let mut pos_ring = Vec::new();

        for i in 0..n {
            let a = ring[i];
            let b = ring[(i + 1) % n];
            let va = values[a as usize];
            let vb = values[b as usize];
            let a_neg = va <= ZERO_TOLERANCE;
            let b_neg = vb <= ZERO_TOLERANCE;

            if a_neg {
                neg_ring.push(a);
                neg_is_cut.push(false);
            } else {
                pos_ring.push(a);
            }

            if a_neg != b_neg {
                let edge_key = (a.min(b), a.max(b));
                let cut_id = *cut_vertex_of_edge.entry(edge_key).or_insert_with(|| {
                    let t = va / (va - vb);
                    let va_vertex = &arrangement.vertices[a as usize];
                    let vb_vertex = &arrangement.vertices[b as usize];
                    let mut bary = [0.0; 4];
                    for c in 0..4 {
                        bary[c] = va_vertex.bary[c] + t * (vb_vertex.bary[c] - va_vertex.bary[c]);
                    }
                    let mut functions: SmallVec<[u16; 3]> = va_vertex
                        .functions
                        .iter()
                        .filter(|f| vb_vertex.functions.contains(f))
                        .copied()
                        .collect();
                    functions.push(function);
                    arrangement.vertices.push(KernelVertex { bary, functions });
                    values.push(0.0);
                    (arrangement.vertices.len() - 1) as u32
                });
                neg_ring.push(cut_id);
                neg_is_cut.push(true);
                pos_ring.push(cut_id);
            }
        }

        // The two cut vertices are always cyclically adjacent within
        // `neg_ring`, since they bound the single contiguous arc of
        // negative-side vertices a convex ring crossed by one plane has.
        let cut_positions: Vec<usize> = (0..neg_is_cut.len()).filter(|&i| neg_is_cut[i]).collect();
        if cut_positions.len() == 2 {
            let (i0, i1) = (cut_positions[0], cut_positions[1]);
            let len = neg_ring.len();
            if i1 == i0 + 1 {
                cap_edges.insert(neg_ring[i0], neg_ring[i1]);
            } else if i0 == 0 && i1 == len - 1 {
                cap_edges.insert(neg_ring[i1], neg_ring[i0]);
            } else {
                return Err(PipelineError::InvariantViolation(
                    "plane crossed a face more than twice".to_string(),
                ));
            }
        }

        let neg_idx = arrangement.faces.len() as u32;
        arrangement.faces.push(KernelFace {
            supporting: face.supporting,
            ring: neg_ring,
        });
        neg_faces.push(neg_idx);

        let pos_idx = arrangement.faces.len() as u32;
        arrangement.faces.push(KernelFace {
            supporting: face.supporting,
            ring: pos_ring,
        });
        pos_faces.push(pos_idx);
    }

    let cap_ring = chain_cap_ring(&cap_edges)?;
    let cap_face_neg = arrangement.faces.len() as u32;
    arrangement.faces.push(KernelFace {
        supporting: LocalPlane::Active(function),
        ring: cap_ring.clone(),
    });
    neg_faces.push(cap_face_neg);

    let mut reversed = cap_ring;
    reversed.reverse();
    let cap_face_pos = arrangement.faces.len() as u32;
    arrangement.faces.push(KernelFace {
        supporting: LocalPlane::Active(function),
        ring: reversed,
    });
    pos_faces.push(cap_face_pos);

    Ok((neg_faces, pos_faces))
}

/// Chains the directed cap edges contributed by each straddling face into a
/// single cyclic ring. Convexity guarantees exactly one cycle.
fn chain_cap_ring(cap_edges: &HashMap<u32, u32>) -> Result<Vec<u32>> {
    if cap_edges.is_empty() {
        return Err(PipelineError::InvariantViolation(
            "plane split produced no cap boundary".to_string(),
        ));
    }
    let &start = cap_edges.keys().next().unwrap();
    let mut ring = vec![start];
    let mut current = start;
    loop {
        let next = *cap_edges.get(&current).ok_or_else(|| {
            PipelineError::InvariantViolation("cap boundary chain is broken".to_string())
        })?;
        if next == start {
            break;
        }
        ring.push(next);
        current = next;
        if ring.len() > cap_edges.len() + 1 {
            return Err(PipelineError::InvariantViolation(
                "cap boundary chain did not close".to_string(),
            ));
        }
    }
    Ok(ring)
}
