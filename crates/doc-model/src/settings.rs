use serde::{Deserialize, Serialize};
use viewer_core::{Size, ZoomLimits};

use crate::ModelError;

/// Engine-wide preferences. Missing fields fall back to defaults when loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Undo entries kept before the oldest are evicted; 0 keeps everything.
    pub history_capacity: usize,
    /// Hit-test slack in page units.
    pub hit_tolerance: f64,
    pub default_page_size: Size,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub zoom_step: f64,
    pub default_author: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            hit_tolerance: 4.0,
            default_page_size: Size::A4,
            min_zoom: 0.1,
            max_zoom: 16.0,
            zoom_step: 1.25,
            default_author: None,
        }
    }
}

impl EngineSettings {
    pub fn zoom_limits(&self) -> ZoomLimits {
        ZoomLimits { min: self.min_zoom, max: self.max_zoom, step: self.zoom_step }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.hit_tolerance.is_finite() || self.hit_tolerance < 0.0 {
            return Err(ModelError::InvalidParameter(format!(
                "hit tolerance must be finite and >= 0, got {}",
                self.hit_tolerance
            )));
        }
        if !(self.min_zoom > 0.0 && self.min_zoom <= self.max_zoom && self.max_zoom.is_finite()) {
            return Err(ModelError::InvalidParameter(format!(
                "zoom range {}..{} is invalid",
                self.min_zoom, self.max_zoom
            )));
        }
        if !(self.zoom_step > 1.0 && self.zoom_step.is_finite()) {
            return Err(ModelError::InvalidParameter(format!(
                "zoom step must be greater than 1, got {}",
                self.zoom_step
            )));
        }
        self.default_page_size.validate()?;
        Ok(())
    }
}
