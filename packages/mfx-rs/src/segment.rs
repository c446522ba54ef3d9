//! Watershed segmentation of a thresholded statistic map around its peaks.

use crate::error::{MfxError, Result};
use crate::naming;
use crate::palette::{lookup_table, write_lookup_table};
use crate::peaks::read_peak_table;
use crate::types::{LutEntry, PeakState, PeakTable, SegmentationOutputs};
use crate::volume::{read_volume3, write_volume_i16, Volume3};
use crate::watershed::watershed;
use ndarray::Array3;
use std::path::Path;

/// In-memory result of segmenting one statistic map
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Label `i` is the basin of table row `i - 1`; 0 is background
    pub labels: Volume3,
    /// Peak voxels only, labelled like `labels`
    pub markers: Volume3,
    pub lut: Vec<LutEntry>,
    pub state: PeakState,
}

/// Reject peaks that fall outside `grid`
pub(crate) fn check_in_bounds(table: &PeakTable, grid: [usize; 3]) -> Result<()> {
    for (i, peak) in table.rows.iter().enumerate() {
        if (0..3).any(|a| peak.voxel[a] >= grid[a]) {
            return Err(MfxError::InvalidParameter(format!(
                "Peak {} at voxel {:?} lies outside the statistic grid {:?}",
                i + 1,
                peak.voxel,
                grid
            )));
        }
    }
    Ok(())
}

/// Segment `zstat` into one region per peak.
///
/// Markers are placed at the peaks with the table's row order as labels,
/// and the negated map is flooded inside `zstat > 0`. With no peaks the
/// segmentation is all zero and only the `Unknown` LUT row is produced.
pub fn segment(zstat: &Volume3, peaks: &PeakTable) -> Result<Segmentation> {
    check_in_bounds(peaks, zstat.grid())?;
    let state = peaks.state();

    let mut markers = Array3::<i32>::zeros(zstat.data.dim());
    let labels = match state {
        PeakState::HasPeaks(n) => {
            for (i, peak) in peaks.rows.iter().enumerate() {
                markers[peak.voxel] = (i + 1) as i32;
            }
            let flood = zstat.data.mapv(|v| v > 0.0);
            let seg = watershed(&zstat.data.mapv(|v| -v), &markers, &flood);
            log::info!(
                "Watershed produced {} labelled voxels from {} peaks",
                seg.iter().filter(|&&l| l != 0).count(),
                n
            );
            seg
        }
        PeakState::NoPeaks => {
            log::info!("No peaks; segmentation is empty");
            Array3::<i32>::zeros(zstat.data.dim())
        }
    };

    Ok(Segmentation {
        labels: Volume3::new(labels.mapv(|l| l as f64), zstat.geometry.clone()),
        markers: Volume3::new(markers.mapv(|l| l as f64), zstat.geometry.clone()),
        lut: lookup_table(state.count()),
        state,
    })
}

/// Segment a thresholded map on disk and write the label volume, the
/// marker volume and the Freeview lookup table into `out_dir`
pub fn watershed_segment(
    zstat_file: &Path,
    localmax_file: &Path,
    out_dir: &Path,
) -> Result<SegmentationOutputs> {
    crate::profile_scope!("watershed");
    let zstat = read_volume3(zstat_file)?;
    let peaks = read_peak_table(localmax_file)?;
    let seg = segment(&zstat, &peaks)?;

    let seg_file = naming::volume_name(out_dir, zstat_file, "_seg")?;
    let peak_file = naming::volume_name(out_dir, zstat_file, "_peaks")?;
    let lut_file = out_dir.join(format!("{}_seg.txt", naming::strip_volume_ext(zstat_file)?));

    write_volume_i16(&seg_file, &seg.labels.data, &seg.labels.geometry)?;
    write_volume_i16(&peak_file, &seg.markers.data, &seg.markers.geometry)?;
    write_lookup_table(&lut_file, &seg.lut)?;

    Ok(SegmentationOutputs {
        seg_file,
        peak_file,
        lut_file,
        state: seg.state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Peak;
    use crate::volume::VolumeGeometry;

    fn blobs() -> Volume3 {
        let data = Array3::from_shape_fn((26, 26, 26), |(x, y, z)| {
            let d = |c: f64| {
                ((x as f64 - c).powi(2) + (y as f64 - c).powi(2) + (z as f64 - c).powi(2)).sqrt()
            };
            let a = (8.1 - d(5.0)).max(0.0);
            let b = (5.3 - d(20.0)).max(0.0);
            a.max(b)
        });
        Volume3::new(data, VolumeGeometry::default())
    }

    fn table() -> PeakTable {
        PeakTable::new(vec![
            Peak {
                voxel: [5, 5, 5],
                cluster: 2,
                value: 8.1,
            },
            Peak {
                voxel: [20, 20, 20],
                cluster: 1,
                value: 5.3,
            },
        ])
    }

    #[test]
    fn test_two_disjoint_basins() {
        let seg = segment(&blobs(), &table()).unwrap();
        let labels = &seg.labels.data;
        assert_eq!(labels[[5, 5, 5]], 1.0);
        assert_eq!(labels[[20, 20, 20]], 2.0);
        assert_eq!(labels.fold(0.0f64, |m, &v| m.max(v)), 2.0);
        assert_eq!(labels[[0, 25, 0]], 0.0);
        assert_eq!(seg.lut.len(), 3);
        assert_eq!(seg.state, PeakState::HasPeaks(2));
        // every suprathreshold voxel is labelled
        for (l, z) in labels.iter().zip(blobs().data.iter()) {
            assert_eq!(*l > 0.0, *z > 0.0);
        }
    }

    #[test]
    fn test_labels_follow_table_order_not_value() {
        let mut reversed = table();
        reversed.rows.reverse();
        let seg = segment(&blobs(), &reversed).unwrap();
        assert_eq!(seg.labels.data[[20, 20, 20]], 1.0);
        assert_eq!(seg.labels.data[[5, 5, 5]], 2.0);
        assert_eq!(seg.markers.data[[20, 20, 20]], 1.0);
    }

    #[test]
    fn test_no_peaks_is_all_zero() {
        let seg = segment(&blobs(), &PeakTable::default()).unwrap();
        assert!(seg.labels.data.iter().all(|&v| v == 0.0));
        assert!(seg.markers.data.iter().all(|&v| v == 0.0));
        assert_eq!(seg.lut.len(), 1);
        assert_eq!(seg.lut[0].name, "Unknown");
        assert_eq!(seg.state, PeakState::NoPeaks);
    }

    #[test]
    fn test_out_of_bounds_peak_is_rejected() {
        let bad = PeakTable::new(vec![Peak {
            voxel: [26, 0, 0],
            cluster: 1,
            value: 4.0,
        }]);
        assert!(matches!(segment(&blobs(), &bad), Err(MfxError::InvalidParameter(_))));
    }
}
