//! Peak dilation with flat disks and spheres.

use ndarray::Array3;

/// Boolean 3-D structuring element centred at `center`
#[derive(Debug, Clone)]
pub struct Kernel {
    pub mask: Array3<bool>,
    pub center: [usize; 3],
}

impl Kernel {
    /// In-plane disk of radius `r`, stacked as `[disk, disk, empty]` along z.
    ///
    /// With the centre on the middle slice the disk covers the peak's own
    /// slice and the one below it.
    pub fn disk(r: usize) -> Self {
        let size = 2 * r + 1;
        let ri = r as i64;
        let mask = Array3::from_shape_fn((size, size, 3), |(i, j, k)| {
            let x = i as i64 - ri;
            let y = j as i64 - ri;
            k < 2 && x * x + y * y <= ri * ri
        });
        Self {
            mask,
            center: [r, r, 1],
        }
    }

    /// Solid sphere of radius `r`
    pub fn sphere(r: usize) -> Self {
        let size = 2 * r + 1;
        let ri = r as i64;
        let mask = Array3::from_shape_fn((size, size, size), |(i, j, k)| {
            let x = i as i64 - ri;
            let y = j as i64 - ri;
            let z = k as i64 - ri;
            x * x + y * y + z * z <= ri * ri
        });
        Self {
            mask,
            center: [r, r, r],
        }
    }

    /// Offsets relative to the centre of every set element
    pub fn offsets(&self) -> Vec<[i64; 3]> {
        self.mask
            .indexed_iter()
            .filter(|(_, &on)| on)
            .map(|((i, j, k), _)| {
                [
                    i as i64 - self.center[0] as i64,
                    j as i64 - self.center[1] as i64,
                    k as i64 - self.center[2] as i64,
                ]
            })
            .collect()
    }
}

/// Dilate each peak by `kernel` into a label volume.
///
/// Peak `i` (0-based) is written as label `i + 1`; where neighbourhoods
/// overlap the later peak wins. Voxels falling off the grid are dropped.
pub fn dilate_peaks(shape: [usize; 3], peaks: &[[usize; 3]], kernel: &Kernel) -> Array3<f64> {
    let mut labels = Array3::<f64>::zeros((shape[0], shape[1], shape[2]));
    let offsets = kernel.offsets();

    for (i, peak) in peaks.iter().enumerate() {
        let label = (i + 1) as f64;
        for off in &offsets {
            let x = peak[0] as i64 + off[0];
            let y = peak[1] as i64 + off[1];
            let z = peak[2] as i64 + off[2];
            if x < 0 || y < 0 || z < 0 {
                continue;
            }
            let (x, y, z) = (x as usize, y as usize, z as usize);
            if x < shape[0] && y < shape[1] && z < shape[2] {
                labels[[x, y, z]] = label;
            }
        }
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_voxel_count() {
        // r=1 is the 6-neighbourhood plus centre
        assert_eq!(Kernel::sphere(1).offsets().len(), 7);
        assert_eq!(Kernel::sphere(4).offsets().len(), 257);
    }

    #[test]
    fn test_disk_is_flat_and_covers_two_slices() {
        let offsets = Kernel::disk(4).offsets();
        assert!(offsets.iter().all(|o| o[2] == -1 || o[2] == 0));
        let per_slice = offsets.iter().filter(|o| o[2] == 0).count();
        assert_eq!(per_slice, 49);
        assert_eq!(offsets.len(), 98);
    }

    #[test]
    fn test_dilate_later_peak_wins() {
        let labels = dilate_peaks([10, 10, 10], &[[4, 4, 4], [5, 4, 4]], &Kernel::sphere(1));
        assert_eq!(labels[[4, 4, 4]], 2.0);
        assert_eq!(labels[[3, 4, 4]], 1.0);
        assert_eq!(labels[[6, 4, 4]], 2.0);
    }

    #[test]
    fn test_dilate_clips_at_edges() {
        let labels = dilate_peaks([3, 3, 3], &[[0, 0, 0]], &Kernel::sphere(1));
        assert_eq!(labels.iter().filter(|&&v| v == 1.0).count(), 4);
    }
}
