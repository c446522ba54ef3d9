//! Report Generator: the fixed sequence of images and text summarising one
//! group analysis.
//!
//! The manifest is the same ordered list of files whether or not peaks were
//! found. Without peaks the three peak artifacts are written as empty files.

use crate::boxplot::{peak_distributions, render_boxplot};
use crate::config::{GroupConfig, ReportOptions};
use crate::error::Result;
use crate::morphology::{dilate_peaks, Kernel};
use crate::mosaic::{slice_counts, Mosaic, Overlay};
use crate::naming;
use crate::palette::husl_palette_u8;
use crate::peaks::read_peak_table;
use crate::segment::check_in_bounds;
use crate::types::{PeakState, PeakTable, ReportManifest};
use crate::volume::{ensure_same_grid, read_volume3, read_volume4, to_mask, Volume3};
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Inputs of one report, all on the group mask's grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInputs {
    pub mask_file: PathBuf,
    /// Unthresholded statistic map
    pub zstat_file: PathBuf,
    pub zstat_thresh_file: PathBuf,
    /// 4-D per-subject contrast estimates
    pub cope_file: PathBuf,
    /// Watershed label volume
    pub seg_file: PathBuf,
    /// Raw peak table from the thresholding stage
    pub localmax_file: PathBuf,
    pub subjects: Vec<String>,
}

fn write_subjects(path: &Path, subjects: &[String]) -> Result<()> {
    let mut file = File::create(path)?;
    for subject in subjects {
        writeln!(file, "{}", subject)?;
    }
    Ok(())
}

fn load_on_grid(path: &Path, name: &str, mask: &Volume3, mask_name: &str) -> Result<Volume3> {
    let vol = read_volume3(path)?;
    ensure_same_grid(mask_name, (mask.grid(), &mask.geometry), name, (vol.grid(), &vol.geometry))?;
    Ok(vol)
}

struct Canvas<'a> {
    background: Array3<f64>,
    mask: Array3<bool>,
    options: &'a ReportOptions,
}

impl<'a> Canvas<'a> {
    fn draw(&self, path: &Path, overlay: Option<(&Array3<f64>, &Overlay)>) -> Result<()> {
        Mosaic::new(&self.background, &self.mask, self.options)?.save(path, overlay)
    }
}

/// Write the report for one statistic map into `out_dir`.
///
/// Order of the returned files: subject list, mask mosaic, full statistic
/// mosaic, thresholded statistic mosaic, segmentation mosaic, peak mosaic,
/// peak box plot.
pub fn generate_report(
    inputs: &ReportInputs,
    out_dir: &Path,
    config: &GroupConfig,
) -> Result<ReportManifest> {
    crate::profile_scope!("report");
    let options = &config.report;
    options.validate()?;

    let mask_vol = read_volume3(&inputs.mask_file)?;
    let zstat = load_on_grid(&inputs.zstat_file, "statistic map", &mask_vol, "group mask")?;
    let zstat_thresh = load_on_grid(
        &inputs.zstat_thresh_file,
        "thresholded statistic map",
        &mask_vol,
        "group mask",
    )?;
    let peaks = read_peak_table(&inputs.localmax_file)?;
    let state = peaks.state();

    let mask = to_mask(&mask_vol.data);
    log::info!(
        "Report over {} mask voxels in {} axial slices, {} peaks",
        mask.iter().filter(|&&m| m).count(),
        slice_counts(&mask).iter().filter(|&&c| c > 0).count(),
        state.count()
    );

    let background = match config.anatomy_path() {
        Some(path) => load_on_grid(&path, "anatomy", &mask_vol, "group mask")?.data,
        None => {
            log::debug!("No anatomy available; drawing on the mask");
            mask_vol.data.clone()
        }
    };
    let canvas = Canvas {
        background,
        mask,
        options,
    };

    let mut files = Vec::with_capacity(7);

    let subjects_file = out_dir.join(naming::SUBJECTS_FILE);
    write_subjects(&subjects_file, &inputs.subjects)?;
    files.push(subjects_file);

    let mask_png = naming::png_name(out_dir, &inputs.mask_file, "")?;
    canvas.draw(&mask_png, Some((&mask_vol.data, &Overlay::Mask)))?;
    files.push(mask_png);

    let zstat_png = naming::png_name(out_dir, &inputs.zstat_file, "")?;
    canvas.draw(&zstat_png, Some((&zstat.data, &Overlay::Diverging)))?;
    files.push(zstat_png);

    let thresh_png = naming::png_name(out_dir, &inputs.zstat_thresh_file, "")?;
    let activation = Overlay::Activation {
        floor: options.thresh_floor,
    };
    canvas.draw(&thresh_png, Some((&zstat_thresh.data, &activation)))?;
    files.push(thresh_png);

    let seg_png = naming::png_name(out_dir, &inputs.seg_file, "")?;
    let peaks_png = naming::png_name(out_dir, &inputs.zstat_thresh_file, "_peaks")?;
    let boxplot_png = out_dir.join(naming::BOXPLOT_FILE);

    match state {
        PeakState::HasPeaks(n) => {
            check_in_bounds(&peaks, mask_vol.grid())?;
            plot_peak_artifacts(
                inputs,
                &canvas,
                &mask_vol,
                &peaks,
                n,
                [seg_png.as_path(), peaks_png.as_path(), boxplot_png.as_path()],
            )?;
        }
        PeakState::NoPeaks => {
            log::info!("No peaks; writing empty placeholders for the peak artifacts");
            for path in [&seg_png, &peaks_png, &boxplot_png] {
                File::create(path)?;
            }
        }
    }
    files.extend([seg_png, peaks_png, boxplot_png]);

    Ok(ReportManifest { files, state })
}

fn plot_peak_artifacts(
    inputs: &ReportInputs,
    canvas: &Canvas,
    mask_vol: &Volume3,
    peaks: &PeakTable,
    n: usize,
    [seg_png, peaks_png, boxplot_png]: [&Path; 3],
) -> Result<()> {
    let options = canvas.options;
    let palette = husl_palette_u8(n);
    let labels = Overlay::Labels(palette);

    let seg = load_on_grid(&inputs.seg_file, "segmentation", mask_vol, "group mask")?;
    canvas.draw(seg_png, Some((&seg.data, &labels)))?;

    let grid = mask_vol.grid();
    let voxels = peaks.voxels();
    let disks = dilate_peaks(grid, &voxels, &Kernel::disk(options.disk_radius));
    canvas.draw(peaks_png, Some((&disks, &labels)))?;

    let copes = read_volume4(&inputs.cope_file)?;
    ensure_same_grid(
        "group mask",
        (grid, &mask_vol.geometry),
        "contrast stack",
        (copes.grid(), &copes.geometry),
    )?;
    let spheres = dilate_peaks(grid, &voxels, &Kernel::sphere(options.sphere_radius));
    let distributions = peak_distributions(&copes.data, &spheres, n)?;
    render_boxplot(boxplot_png, &distributions, options)
}
