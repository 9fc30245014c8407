//! Pipeline-wide settings (spec §6 "Settings").

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Settings accepted at the CLI/ABI boundary.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Background mesh resolution along each axis; must be `> 0`.
    pub resolution: u32,
    /// Extra margin (world units) added around the scene's own bounding box
    /// before it is handed to the background mesh generator.
    pub scene_aabb_margin: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            resolution: 16,
            scene_aabb_margin: 0.0,
        }
    }
}

impl Settings {
    /// Validates the settings, surfacing `ConfigurationInvalid` at the
    /// entry point rather than letting a zero resolution propagate.
    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 {
            return Err(PipelineError::ConfigurationInvalid(
                "resolution must be greater than zero".to_string(),
            ));
        }
        if !self.scene_aabb_margin.is_finite() || self.scene_aabb_margin < 0.0 {
            return Err(PipelineError::ConfigurationInvalid(
                "scene_aabb_margin must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
