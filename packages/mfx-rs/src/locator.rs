//! Anatomical lookup of peak coordinates.
//!
//! The peak table formatter only needs two services: a region label for a
//! voxel and a voxel-to-millimetre transform. `PeakLocator` is that seam;
//! `StandardSpaceLocator` answers both from the standard-space template's
//! affine and an optional probabilistic atlas.

use crate::config::AtlasConfig;
use crate::error::{MfxError, Result};
use crate::types::PeakRegion;
use crate::volume::{read_volume3, read_volume4, VolumeGeometry};
use ndarray::Array4;
use std::path::Path;

pub trait PeakLocator {
    /// Most likely region for each voxel coordinate
    fn locate(&self, voxels: &[[usize; 3]]) -> Result<Vec<PeakRegion>>;

    /// World (mm) coordinates for each voxel coordinate
    fn vox_to_world(&self, voxels: &[[usize; 3]]) -> Result<Vec<[f64; 3]>>;
}

/// Probabilistic atlas: one 0-100 probability map per region on the last axis
#[derive(Debug, Clone)]
pub struct RegionAtlas {
    pub probabilities: Array4<f64>,
    pub names: Vec<String>,
}

impl RegionAtlas {
    pub fn new(probabilities: Array4<f64>, names: Vec<String>) -> Result<Self> {
        let regions = probabilities.shape()[3];
        if regions != names.len() {
            return Err(MfxError::shape(
                "atlas region names",
                regions,
                names.len(),
            ));
        }
        Ok(Self {
            probabilities,
            names,
        })
    }

    /// Load the atlas volume and its names file (one region per line)
    pub fn load(volume: &Path, labels: &Path) -> Result<Self> {
        let stack = read_volume4(volume)?;
        if !labels.exists() {
            return Err(MfxError::FileNotFound(labels.display().to_string()));
        }
        let names: Vec<String> = std::fs::read_to_string(labels)?
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        log::info!(
            "Loaded atlas {} with {} regions",
            volume.display(),
            names.len()
        );
        Self::new(stack.data, names)
    }

    fn region_at(&self, voxel: [usize; 3]) -> Result<PeakRegion> {
        let shape = self.probabilities.shape();
        if voxel[0] >= shape[0] || voxel[1] >= shape[1] || voxel[2] >= shape[2] {
            return Err(MfxError::InvalidParameter(format!(
                "Peak voxel {:?} outside atlas grid {:?}",
                voxel,
                &shape[..3]
            )));
        }

        let mut best: Option<(usize, f64)> = None;
        for r in 0..shape[3] {
            let p = self.probabilities[[voxel[0], voxel[1], voxel[2], r]];
            if p > 0.0 && best.map_or(true, |(_, bp)| p > bp) {
                best = Some((r, p));
            }
        }

        Ok(match best {
            Some((r, p)) => PeakRegion {
                region: self.names[r].clone(),
                prob: p,
            },
            None => PeakRegion::unknown(),
        })
    }
}

pub struct StandardSpaceLocator {
    geometry: VolumeGeometry,
    atlas: Option<RegionAtlas>,
}

impl StandardSpaceLocator {
    pub fn new(geometry: VolumeGeometry) -> Self {
        Self {
            geometry,
            atlas: None,
        }
    }

    pub fn with_atlas(mut self, atlas: RegionAtlas) -> Self {
        self.atlas = Some(atlas);
        self
    }

    /// Geometry from the template volume, regions from `atlas` if configured
    pub fn load(template: &Path, atlas: Option<&AtlasConfig>) -> Result<Self> {
        let locator = Self::new(read_volume3(template)?.geometry);
        match atlas {
            Some(cfg) => Ok(locator.with_atlas(RegionAtlas::load(&cfg.volume, &cfg.labels)?)),
            None => {
                log::debug!("No atlas configured; regions will be Unknown");
                Ok(locator)
            }
        }
    }
}

impl PeakLocator for StandardSpaceLocator {
    fn locate(&self, voxels: &[[usize; 3]]) -> Result<Vec<PeakRegion>> {
        match &self.atlas {
            Some(atlas) => voxels.iter().map(|&v| atlas.region_at(v)).collect(),
            None => Ok(voxels.iter().map(|_| PeakRegion::unknown()).collect()),
        }
    }

    fn vox_to_world(&self, voxels: &[[usize; 3]]) -> Result<Vec<[f64; 3]>> {
        Ok(voxels
            .iter()
            .map(|v| {
                self.geometry
                    .vox_to_world([v[0] as f64, v[1] as f64, v[2] as f64])
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix4;

    #[rustfmt::skip]
    fn mni_2mm() -> VolumeGeometry {
        VolumeGeometry {
            affine: Matrix4::new(
                -2.0, 0.0, 0.0, 90.0,
                0.0, 2.0, 0.0, -126.0,
                0.0, 0.0, 2.0, -72.0,
                0.0, 0.0, 0.0, 1.0,
            ),
            pixdim: [2.0, 2.0, 2.0],
            sform_code: 4,
        }
    }

    #[test]
    fn test_vox_to_mni() {
        let locator = StandardSpaceLocator::new(mni_2mm());
        let mm = locator.vox_to_world(&[[45, 63, 36], [30, 40, 50]]).unwrap();
        assert_eq!(mm[0], [0.0, 0.0, 0.0]);
        assert_eq!(mm[1], [30.0, -46.0, 28.0]);
    }

    #[test]
    fn test_without_atlas_regions_are_unknown() {
        let locator = StandardSpaceLocator::new(mni_2mm());
        let regions = locator.locate(&[[1, 2, 3]]).unwrap();
        assert_eq!(regions, vec![PeakRegion::unknown()]);
    }

    #[test]
    fn test_atlas_picks_max_probability() {
        let mut probs = Array4::<f64>::zeros((4, 4, 4, 2));
        probs[[1, 1, 1, 0]] = 20.0;
        probs[[1, 1, 1, 1]] = 65.0;
        let atlas = RegionAtlas::new(
            probs,
            vec!["Frontal Pole".to_string(), "Insular Cortex".to_string()],
        )
        .unwrap();
        let locator = StandardSpaceLocator::new(mni_2mm()).with_atlas(atlas);

        let regions = locator.locate(&[[1, 1, 1], [0, 0, 0]]).unwrap();
        assert_eq!(regions[0].region, "Insular Cortex");
        assert_eq!(regions[0].prob, 65.0);
        assert_eq!(regions[1], PeakRegion::unknown());
    }

    #[test]
    fn test_atlas_name_count_must_match() {
        let probs = Array4::<f64>::zeros((2, 2, 2, 3));
        assert!(RegionAtlas::new(probs, vec!["a".to_string()]).is_err());
    }
}
