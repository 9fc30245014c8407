//! Non-manifold edge chains and patch ordering around them (spec §4.5 tail
//! / §4.6).

use std::collections::HashMap;

use crate::background_mesh::BackgroundMesh;
use crate::error::{PipelineError, Result};
use crate::kernel::LocalPlane;
use crate::mesh_extraction::{kernel_vertex_key, ExtractedMesh};
use crate::scalar_field::ScalarField;
use crate::tet_arrangement::TetArrangementResults;
use crate::topology::{half_patch_id, Chain, IsoEdge, IsoVertex, IsoVertexKey, MinimalSimplex};

/// Collects non-manifold edges (`|headers| ∉ {1,2}`, spec §4.5) into
/// maximal chains: open paths between junction/endpoint vertices, or closed
/// loops when every vertex along the way has exactly two incident
/// non-manifold edges.
pub fn compute_chains(edges: &[IsoEdge]) -> Vec<Chain> {
    let non_manifold: Vec<u32> = edges
        .iter()
        .enumerate()
        .filter(|(_, e)| e.headers.len() != 1 && e.headers.len() != 2)
        .map(|(i, _)| i as u32)
        .collect();
    if non_manifold.is_empty() {
        return Vec::new();
    }

    let mut adjacency: HashMap<u32, Vec<(u32, u32)>> = HashMap::new();
    for &edge_index in &non_manifold {
        let e = &edges[edge_index as usize];
        adjacency.entry(e.v1).or_default().push((e.v2, edge_index));
        adjacency.entry(e.v2).or_default().push((e.v1, edge_index));
    }

    let mut visited = vec![false; edges.len()];
    let mut chains = Vec::new();

    let junctions: Vec<u32> = adjacency
        .iter()
        .filter(|(_, neighbors)| neighbors.len() != 2)
        .map(|(&v, _)| v)
        .collect();

    for start_vertex in junctions {
        let starts: Vec<(u32, u32)> = adjacency[&start_vertex].clone();
        for (_, edge_index) in starts {
            if visited[edge_index as usize] {
                continue;
            }
            let mut chain_edges = vec![edge_index];
            visited[edge_index as usize] = true;
            let mut current_vertex = other_endpoint(edges, edge_index, start_vertex);
            let mut prev_edge = edge_index;
            while let Some(neighbors) = adjacency.get(&current_vertex) {
                if neighbors.len() != 2 {
                    break;
                }
                let next = neighbors.iter().find(|&&(_, e)| e != prev_edge && !visited[e as usize]);
                let Some(&(_, next_edge)) = next else { break };
                chain_edges.push(next_edge);
                visited[next_edge as usize] = true;
                prev_edge = next_edge;
                current_vertex = other_endpoint(edges, next_edge, current_vertex);
            }
            chains.push(Chain {
                edges: chain_edges,
                is_loop: false,
            });
        }
    }

    for &edge_index in &non_manifold {
        if visited[edge_index as usize] {
            continue;
        }
        let start_vertex = edges[edge_index as usize].v1;
        let mut current_vertex = edges[edge_index as usize].v2;
        let mut chain_edges = vec![edge_index];
        visited[edge_index as usize] = true;
        let mut prev_edge = edge_index;
        loop {
            if current_vertex == start_vertex {
                break;
            }
            let Some(neighbors) = adjacency.get(&current_vertex) else { break };
            let next = neighbors.iter().find(|&&(_, e)| e != prev_edge && !visited[e as usize]);
            let Some(&(_, next_edge)) = next else { break };
            chain_edges.push(next_edge);
            visited[next_edge as usize] = true;
            prev_edge = next_edge;
            current_vertex = other_endpoint(edges, next_edge, current_vertex);
        }
        chains.push(Chain {
            edges: chain_edges,
            is_loop: true,
        });
    }

    chains
}

fn other_endpoint(edges: &[IsoEdge], edge_index: u32, from: u32) -> u32 {
    let e = &edges[edge_index as usize];
    if e.v1 == from {
        e.v2
    } else {
        e.v1
    }
}

fn vertex_key(vertex: &IsoVertex) -> IsoVertexKey {
    IsoVertexKey {
        simplex_vertices: vertex.simplex_vertex_indices.clone(),
        functions: vertex
            .implicit_function_indices
            .iter()
            .copied()
            .filter(|&f| f != crate::topology::NO_FUNCTION)
            .collect(),
    }
}

/// The set of tets whose kernel arrangement might contain both endpoints of
/// a representative non-manifold edge (spec §4.6's three cases). The
/// corner/corner fast path uses the scalar field's incident-tets index;
/// every other case falls back to scanning every non-empty tet result,
/// since the original's specific edge-/face-degenerate tet-pairing
/// shortcuts are internal bookkeeping this crate does not need to
/// replicate for correctness.
fn candidate_tets(field: &ScalarField, driver: &TetArrangementResults, v1: &IsoVertex, v2: &IsoVertex) -> Vec<u32> {
    if v1.minimal_simplex == MinimalSimplex::Corner && v2.minimal_simplex == MinimalSimplex::Corner {
        let a = v1.simplex_vertex_indices[0] as usize;
        let b = v2.simplex_vertex_indices[0] as usize;
        let set_b: std::collections::HashSet<u32> = field.incident_tets[b].iter().copied().collect();
        return field.incident_tets[a]
            .iter()
            .copied()
            .filter(|t| set_b.contains(t))
            .collect();
    }
    (0..driver.cut_results.len() as u32)
        .filter(|&t| driver.cut_results[t as usize].is_some())
        .collect()
}

/// Computes the cyclic half-patch ordering around every chain and returns
/// the adjacency pairs to feed into shell union-find (spec §4.6).
///
/// Walks *every* edge of a chain rather than trusting a single
/// representative: for a chain that spans several background-mesh tets
/// (e.g. two surfaces meeting along a line that crosses many cells), a
/// patch may only be reachable from some of the chain's edges, not
/// necessarily its first one, so every edge's candidate tets are queried
/// and their contributions are all folded into the chain's adjacency list.
/// Each tet's own cyclic order comes directly from its kernel arrangement's
/// `edge_face_order` (spec §4.6: "query `cut_results[k]` to retrieve the
/// cyclic ordering of faces around the kernel edge"); this function only
/// translates that local order into global patches and half-patch sides.
pub fn compute_patch_order(
    mesh: &BackgroundMesh,
    field: &ScalarField,
    driver: &TetArrangementResults,
    extracted: &ExtractedMesh,
    face_to_patch: &HashMap<u32, u32>,
    chains: &[Chain],
    edges: &[IsoEdge],
) -> Result<Vec<Vec<(u32, u32)>>> {
    let mut half_patch_adj_list = Vec::with_capacity(chains.len());

    for chain in chains {
        let mut adjacency = Vec::new();

        for &edge_index in &chain.edges {
            let edge = &edges[edge_index as usize];
            let v1 = &extracted.vertices[edge.v1 as usize];
            let v2 = &extracted.vertices[edge.v2 as usize];
            let key1 = vertex_key(v1);
            let key2 = vertex_key(v2);

            for tet_index in candidate_tets(field, driver, v1, v2) {
                let arrangement = driver.cut_results[tet_index as usize].as_ref().unwrap();
                let mut local1 = None;
                let mut local2 = None;
                for (local_id, kv) in arrangement.vertices.iter().enumerate() {
                    let key = kernel_vertex_key(mesh, tet_index, kv)?;
                    if key == key1 {
                        local1 = Some(local_id as u32);
                    }
                    if key == key2 {
                        local2 = Some(local_id as u32);
                    }
                }
                let (Some(la), Some(lb)) = (local1, local2) else {
                    continue;
                };

                let Some(entries) = arrangement.edge_face_order.get(&(la.min(lb), la.max(lb))) else {
                    continue;
                };

                let mut cyclic_half_patches = Vec::with_capacity(entries.len());
                for entry in entries {
                    let face = &arrangement.faces[entry.face as usize];
                    let LocalPlane::Active(_) = face.supporting else {
                        continue;
                    };
                    // `entry.forward` records the ring direction relative to
                    // `(min(la, lb), max(la, lb))`; reinterpret it relative
                    // to this edge's actual `(la, lb)` order.
                    let negative_side = entry.forward != (la < lb);

                    let global_face = *extracted
                        .global_face_of_header
                        .get(&(tet_index, entry.face))
                        .ok_or_else(|| PipelineError::InvariantViolation("face header missing from extraction map".to_string()))?;
                    let patch_index = *face_to_patch
                        .get(&global_face)
                        .ok_or_else(|| PipelineError::InvariantViolation("face missing from any patch".to_string()))?;

                    cyclic_half_patches.push(half_patch_id(patch_index, negative_side));
                }

                let n = cyclic_half_patches.len();
                if n >= 2 {
                    for i in 0..n {
                        adjacency.push((cyclic_half_patches[i], cyclic_half_patches[(i + 1) % n]));
                    }
                }
            }
        }

        half_patch_adj_list.push(adjacency);
    }

    Ok(half_patch_adj_list)
}
