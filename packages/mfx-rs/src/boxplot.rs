//! Per-peak distributions of subject contrast estimates and their box plot.

use crate::config::ReportOptions;
use crate::error::{MfxError, Result};
use crate::palette::husl_palette_u8;
use ndarray::{Array3, Array4, Axis};
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

const WIDTH: u32 = 900;
const WHISKER: f64 = 1.5;
const BOX_HALF_HEIGHT: f64 = 0.3;

static BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

// registered font bytes must be 'static; each path is read once
static LOADED_FONTS: OnceLock<Mutex<HashMap<PathBuf, &'static [u8]>>> = OnceLock::new();

/// Five-number summary with Tukey whiskers
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
}

impl BoxStats {
    /// NaN entries are ignored; `None` when nothing finite remains
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let q1 = percentile(&sorted, 0.25);
        let median = percentile(&sorted, 0.5);
        let q3 = percentile(&sorted, 0.75);
        let iqr = q3 - q1;
        let (lo_fence, hi_fence) = (q1 - WHISKER * iqr, q3 + WHISKER * iqr);

        let inside = || sorted.iter().copied().filter(|v| (lo_fence..=hi_fence).contains(v));
        let lower_whisker = inside().fold(q1, f64::min);
        let upper_whisker = inside().fold(q3, f64::max);
        let outliers = sorted
            .iter()
            .copied()
            .filter(|v| !(lo_fence..=hi_fence).contains(v))
            .collect();

        Some(Self {
            q1,
            median,
            q3,
            lower_whisker,
            upper_whisker,
            outliers,
        })
    }
}

/// Mean of each subject's contrast estimate within each labelled sphere.
///
/// Row `i` holds the per-subject means for label `i + 1`; a label with no
/// voxels yields NaN for every subject.
pub fn peak_distributions(
    copes: &Array4<f64>,
    spheres: &Array3<f64>,
    n_peaks: usize,
) -> Result<Vec<Vec<f64>>> {
    let grid = &copes.shape()[..3];
    if grid != spheres.shape() {
        return Err(MfxError::shape("contrast stack vs peak spheres", spheres.shape(), grid));
    }
    let n_subjects = copes.len_of(Axis(3));
    let mut sums = vec![vec![0.0; n_subjects]; n_peaks];
    let mut counts = vec![0usize; n_peaks];

    for ((x, y, z), &label) in spheres.indexed_iter() {
        let l = label.round() as usize;
        if l == 0 || l > n_peaks {
            continue;
        }
        counts[l - 1] += 1;
        for (s, sum) in sums[l - 1].iter_mut().enumerate() {
            *sum += copes[[x, y, z, s]];
        }
    }

    Ok(sums
        .into_iter()
        .zip(counts)
        .map(|(row, count)| {
            row.into_iter()
                .map(|sum| if count == 0 { f64::NAN } else { sum / count as f64 })
                .collect()
        })
        .collect())
}

/// Vertical position of peak `rank` (1-based) among `n`; peak 1 is highest
pub fn peak_row(rank: usize, n: usize) -> f64 {
    (n + 1 - rank) as f64
}

/// Tick label for position `y` on the rank axis: the rank drawn in that row,
/// or empty between rows
pub fn rank_label(y: f64, n: usize) -> String {
    let r = y.round();
    if (y - r).abs() < 1e-6 && r >= 1.0 && r <= n as f64 {
        (n + 1 - r as usize).to_string()
    } else {
        String::new()
    }
}

fn load_font(path: &Path) -> Option<&'static [u8]> {
    let mut cache = LOADED_FONTS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(bytes) = cache.get(path) {
        return Some(*bytes);
    }
    match std::fs::read(path) {
        Ok(bytes) => {
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            cache.insert(path.to_path_buf(), bytes);
            Some(bytes)
        }
        Err(e) => {
            log::warn!("Cannot read plot font {}: {}", path.display(), e);
            None
        }
    }
}

/// Font bytes for plot text: `explicit` when readable, else the bundled DejaVu Sans
fn plot_font(explicit: Option<&Path>) -> &'static [u8] {
    explicit.and_then(load_font).unwrap_or(BUNDLED_FONT)
}

/// Register the plot font under "sans-serif" for this render
fn register_plot_font(explicit: Option<&Path>) -> Result<()> {
    if register_font("sans-serif", FontStyle::Normal, plot_font(explicit)).is_ok() {
        return Ok(());
    }
    if let Some(path) = explicit {
        log::warn!("{} is not a usable font; using DejaVu Sans", path.display());
    }
    register_font("sans-serif", FontStyle::Normal, BUNDLED_FONT)
        .map_err(|_| MfxError::Render("bundled plot font failed to load".to_string()))
}

fn render_err<E: std::fmt::Display>(e: E) -> MfxError {
    MfxError::Render(e.to_string())
}

/// Horizontal box plot with peak 1 in the top row
pub fn render_boxplot(
    path: &Path,
    distributions: &[Vec<f64>],
    options: &ReportOptions,
) -> Result<()> {
    let n = distributions.len();
    if n == 0 {
        return Err(MfxError::InvalidParameter(
            "Box plot needs at least one peak".to_string(),
        ));
    }
    let stats: Vec<Option<BoxStats>> = distributions
        .iter()
        .map(|d| BoxStats::from_values(d))
        .collect();
    let colors = husl_palette_u8(n);

    let (mut lo, mut hi) = (0.0f64, 0.0f64);
    for v in distributions.iter().flatten().filter(|v| v.is_finite()) {
        lo = lo.min(*v);
        hi = hi.max(*v);
    }
    if hi - lo < f64::EPSILON {
        hi += 1.0;
        lo -= 1.0;
    }
    let pad = 0.05 * (hi - lo);
    let x_range = (lo - pad)..(hi + pad);
    let top = n as f64 + 0.6;

    register_plot_font(options.font.as_deref())?;
    let height = (n as f64 / 3.0 * 100.0).ceil() as u32 + 120;
    let root = BitMapBackend::new(path, (WIDTH, height)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, 0.4..top)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n + 1)
        .y_label_formatter(&|y| rank_label(*y, n))
        .x_desc("COPE Value")
        .y_desc("Local Maximum")
        .draw()
        .map_err(render_err)?;

    // dashed reference line at zero
    let dash = (top - 0.4) / 60.0;
    chart
        .draw_series((0..30).map(|k| {
            let y0 = 0.4 + 2.0 * k as f64 * dash;
            PathElement::new(vec![(0.0, y0), (0.0, y0 + dash)], BLACK.mix(0.5).stroke_width(1))
        }))
        .map_err(render_err)?;

    for (i, (stat, color)) in stats.iter().zip(&colors).enumerate() {
        let Some(stat) = stat else {
            log::debug!("Peak {} has no finite values; row left empty", i + 1);
            continue;
        };
        let yc = peak_row(i + 1, n);
        let (ylo, yhi) = (yc - BOX_HALF_HEIGHT, yc + BOX_HALF_HEIGHT);
        let fill = RGBColor(color[0], color[1], color[2]);

        chart
            .draw_series([
                Rectangle::new([(stat.q1, ylo), (stat.q3, yhi)], fill.filled()),
                Rectangle::new([(stat.q1, ylo), (stat.q3, yhi)], BLACK.stroke_width(1)),
            ])
            .map_err(render_err)?;

        let cap = BOX_HALF_HEIGHT / 2.0;
        chart
            .draw_series(
                [
                    vec![(stat.median, ylo), (stat.median, yhi)],
                    vec![(stat.lower_whisker, yc), (stat.q1, yc)],
                    vec![(stat.q3, yc), (stat.upper_whisker, yc)],
                    vec![(stat.lower_whisker, yc - cap), (stat.lower_whisker, yc + cap)],
                    vec![(stat.upper_whisker, yc - cap), (stat.upper_whisker, yc + cap)],
                ]
                .into_iter()
                .map(|points| PathElement::new(points, BLACK.stroke_width(2))),
            )
            .map_err(render_err)?;

        chart
            .draw_series(
                stat.outliers
                    .iter()
                    .map(|&v| Circle::new((v, yc), 3, BLACK.stroke_width(1))),
            )
            .map_err(render_err)?;
    }

    root.present().map_err(render_err)?;
    log::debug!("Wrote box plot {} ({} peaks)", path.display(), n);
    Ok(())
}
