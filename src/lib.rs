//! Implicit surface arrangement: turns a CSG scene of implicit primitives
//! into a combinatorially exact polygon mesh, patch/shell/cell topology, and
//! per-patch surface/volume integrals over a regular tetrahedral background
//! mesh.

pub mod background_mesh;
pub mod cells;
pub mod chains;
pub mod error;
pub mod integrator;
pub mod kernel;
pub mod mesh_extraction;
pub mod patches;
pub mod pipeline;
pub mod polymesh;
pub mod primitives;
pub mod scalar_field;
pub mod settings;
pub mod tet_arrangement;
pub mod topology;

pub use error::{PipelineError, Result};
pub use pipeline::{load_scene, run, scene_bounds, solve_result, PipelineResult};
pub use polymesh::{PolyMesh, SolveResult};
pub use primitives::Primitive;
pub use settings::Settings;
