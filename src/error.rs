//! Error kinds for the arrangement pipeline (spec-level policy, see spec §7).

use thiserror::Error;

/// Errors the pipeline can report. The core never retries; a run either
/// succeeds completely or the caller observes one of these.
///
/// Spec §7 also lists an uninitialised-pipeline error for "run before
/// mesh/scene set." `run()` here takes the mesh bounds and scene as direct
/// arguments rather than mutating stored state across separate calls, so
/// there is no uninitialised state to be run from; that variant is a
/// Non-goal of this crate's stateless pipeline shape.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Resolution is zero, or the AABB is degenerate (`min >= max`
    /// componentwise).
    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// The scene failed to load (unknown primitive type, malformed input).
    #[error("failed to load scene: {0}")]
    SceneLoadFailure(String),

    /// An internal consistency check failed (e.g. an iso-edge with zero
    /// headers, or an orphan half-patch). Always a bug, never user error.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    /// The single-tet kernel reported a case it cannot resolve.
    #[error("kernel degeneracy in tet {tet_index}: {detail}")]
    KernelDegeneracy {
        /// Index of the offending tet in the background mesh.
        tet_index: u32,
        /// Human-readable detail, e.g. the planes involved.
        detail: String,
    },
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, PipelineError>;
