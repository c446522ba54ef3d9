use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A local maximum reported by the cluster thresholding stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// Voxel coordinates in the statistic grid
    pub voxel: [usize; 3],
    pub cluster: i64,
    pub value: f64,
}

/// Ordered peaks, as emitted upstream (descending statistic value).
///
/// The row order is authoritative: peak `i` (0-based) owns segmentation
/// label `i + 1`. An empty table is a valid state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeakTable {
    pub rows: Vec<Peak>,
}

impl PeakTable {
    pub fn new(rows: Vec<Peak>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn voxels(&self) -> Vec<[usize; 3]> {
        self.rows.iter().map(|p| p.voxel).collect()
    }

    pub fn state(&self) -> PeakState {
        PeakState::from_count(self.rows.len())
    }
}

/// Whether a thresholded map produced any suprathreshold peaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeakState {
    HasPeaks(usize),
    NoPeaks,
}

impl PeakState {
    pub fn from_count(n: usize) -> Self {
        if n == 0 {
            PeakState::NoPeaks
        } else {
            PeakState::HasPeaks(n)
        }
    }

    pub fn count(&self) -> usize {
        match self {
            PeakState::HasPeaks(n) => *n,
            PeakState::NoPeaks => 0,
        }
    }
}

/// One row of a Freesurfer-style color lookup table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LutEntry {
    pub id: usize,
    pub name: String,
    pub rgba: [u8; 4],
}

/// Anatomical region assigned to a peak by the locator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakRegion {
    pub region: String,
    pub prob: f64,
}

impl PeakRegion {
    pub fn unknown() -> Self {
        Self {
            region: "Unknown".to_string(),
            prob: 0.0,
        }
    }
}

/// Row of the canonical peak table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPeak {
    pub peak: usize,
    pub cluster: i64,
    pub value: f64,
    /// Voxel coordinates for an empty locator pass, millimetres otherwise
    pub coords: [f64; 3],
    pub region: Option<PeakRegion>,
}

/// Files written by the watershed segmenter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationOutputs {
    pub seg_file: PathBuf,
    pub peak_file: PathBuf,
    pub lut_file: PathBuf,
    pub state: PeakState,
}

/// Ordered report manifest. The set of names does not depend on whether
/// peaks were found; only the emptiness of the peak artifacts does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportManifest {
    pub files: Vec<PathBuf>,
    pub state: PeakState,
}
