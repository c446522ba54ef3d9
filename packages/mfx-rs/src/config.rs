//! Group analysis configuration.
//!
//! Values come from a JSON file (explicit path, or `mfx/config.json` in the
//! user config directory) with `FSLDIR` supplying the standard-space
//! resources when they are not set explicitly.

use crate::error::{MfxError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const TEMPLATE_MASK: &str = "data/standard/MNI152_T1_2mm_brain_mask.nii.gz";
pub const TEMPLATE_ANATOMY: &str = "data/standard/MNI152_T1_2mm_brain.nii.gz";
pub const FSLDIR_ENV: &str = "FSLDIR";

/// Probabilistic atlas for region lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtlasConfig {
    /// 4-D volume, one 0-100 probability map per region
    pub volume: PathBuf,
    /// Region names, one per line, in volume order
    pub labels: PathBuf,
}

/// Rendering parameters for the report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportOptions {
    /// Radius of the in-plane disk drawn at each peak
    pub disk_radius: usize,
    /// Radius of the sphere averaged for the box plot
    pub sphere_radius: usize,
    /// Values below this are not colored in the thresholded map
    pub thresh_floor: f64,
    pub overlay_alpha: f64,
    /// Show every n-th axial slice
    pub mosaic_step: usize,
    pub mosaic_columns: usize,
    /// Pixels per voxel
    pub pixel_scale: u32,
    /// TrueType font for plot text
    pub font: Option<PathBuf>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            disk_radius: 4,
            sphere_radius: 4,
            thresh_floor: 3.3,
            overlay_alpha: 0.9,
            mosaic_step: 2,
            mosaic_columns: 10,
            pixel_scale: 2,
            font: None,
        }
    }
}

impl ReportOptions {
    pub fn validate(&self) -> Result<()> {
        if self.mosaic_step == 0 || self.mosaic_columns == 0 || self.pixel_scale == 0 {
            return Err(MfxError::Config(
                "mosaic_step, mosaic_columns and pixel_scale must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.overlay_alpha) {
            return Err(MfxError::Config(format!(
                "overlay_alpha must be within [0, 1], got {}",
                self.overlay_alpha
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    pub fsl_dir: Option<PathBuf>,
    pub template_mask: Option<PathBuf>,
    pub anatomy: Option<PathBuf>,
    pub atlas: Option<AtlasConfig>,
    pub report: ReportOptions,
}

impl GroupConfig {
    /// Parse a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MfxError::FileNotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        let config: GroupConfig = serde_json::from_str(&text)
            .map_err(|e| MfxError::Config(format!("{}: {}", path.display(), e)))?;
        config.report.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Explicit file if given, else the user default if present, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    fn fsl_dir(&self) -> Option<PathBuf> {
        self.fsl_dir
            .clone()
            .or_else(|| std::env::var_os(FSLDIR_ENV).map(PathBuf::from))
    }

    /// Standard-space brain mask the group mask is intersected with
    pub fn template_mask_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.template_mask {
            return Ok(path.clone());
        }
        self.fsl_dir()
            .map(|dir| dir.join(TEMPLATE_MASK))
            .ok_or_else(|| {
                MfxError::Config(format!(
                    "No template mask configured and ${} is not set",
                    FSLDIR_ENV
                ))
            })
    }

    /// Background anatomy for mosaics, if one can be found
    pub fn anatomy_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.anatomy {
            return Some(path.clone());
        }
        self.fsl_dir()
            .map(|dir| dir.join(TEMPLATE_ANATOMY))
            .filter(|p| p.exists())
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mfx").join("config.json"))
}
