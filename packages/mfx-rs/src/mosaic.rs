//! Axial slice mosaics rendered to RGB PNGs.

use crate::colormap::{blend, Colormap};
use crate::config::ReportOptions;
use crate::error::{MfxError, Result};
use image::{Rgb, RgbImage};
use ndarray::{Array3, Axis};
use std::path::Path;

const MASK_COLOR: [u8; 3] = [0xdd, 0x22, 0x22];
const MASK_ALPHA: f64 = 0.66;
const LABEL_THRESH: f64 = 0.5;

/// How an overlay volume is colored on top of the background
#[derive(Debug, Clone)]
pub enum Overlay {
    /// Fill nonzero voxels with a flat color
    Mask,
    /// Signed values on a diverging map, symmetric around zero
    Diverging,
    /// Positive values from `floor` up to the overlay maximum
    Activation { floor: f64 },
    /// Integer labels, one color each
    Labels(Vec<[u8; 3]>),
}

/// Inclusive voxel bounds of the mask along each axis
fn extent(mask: &Array3<bool>) -> [(usize, usize); 3] {
    let (nx, ny, nz) = mask.dim();
    let mut lo = [nx, ny, nz];
    let mut hi = [0usize; 3];
    for ((x, y, z), &m) in mask.indexed_iter() {
        if m {
            for (a, v) in [x, y, z].into_iter().enumerate() {
                lo[a] = lo[a].min(v);
                hi[a] = hi[a].max(v);
            }
        }
    }
    if lo[0] > hi[0] {
        return [(0, nx - 1), (0, ny - 1), (0, nz - 1)];
    }
    [(lo[0], hi[0]), (lo[1], hi[1]), (lo[2], hi[2])]
}

pub struct Mosaic<'a> {
    background: &'a Array3<f64>,
    mask: &'a Array3<bool>,
    options: &'a ReportOptions,
    background_max: f64,
    bounds: [(usize, usize); 3],
    slices: Vec<usize>,
}

impl<'a> Mosaic<'a> {
    pub fn new(
        background: &'a Array3<f64>,
        mask: &'a Array3<bool>,
        options: &'a ReportOptions,
    ) -> Result<Self> {
        if background.dim() != mask.dim() {
            return Err(MfxError::shape("mosaic background vs mask", mask.dim(), background.dim()));
        }
        if background.is_empty() {
            return Err(MfxError::InvalidParameter("Cannot draw an empty volume".to_string()));
        }
        let bounds = extent(mask);
        let slices = (bounds[2].0..=bounds[2].1).step_by(options.mosaic_step.max(1)).collect();
        let background_max = background.iter().fold(0.0f64, |m, &v| m.max(v));

        Ok(Self {
            background,
            mask,
            options,
            background_max,
            bounds,
            slices,
        })
    }

    pub fn slices(&self) -> &[usize] {
        &self.slices
    }

    fn tile_size(&self) -> (u32, u32) {
        let s = self.options.pixel_scale;
        let w = (self.bounds[0].1 - self.bounds[0].0 + 1) as u32;
        let h = (self.bounds[1].1 - self.bounds[1].0 + 1) as u32;
        (w * s, h * s)
    }

    fn grid(&self) -> (u32, u32) {
        let n = self.slices.len().max(1) as u32;
        let cols = (self.options.mosaic_columns as u32).min(n);
        (cols, n.div_ceil(cols))
    }

    /// Render the background, then `overlay` inside the mask
    pub fn render(&self, overlay: Option<(&Array3<f64>, &Overlay)>) -> Result<RgbImage> {
        if let Some((values, _)) = overlay {
            if values.dim() != self.mask.dim() {
                return Err(MfxError::shape(
                    "mosaic overlay vs mask",
                    self.mask.dim(),
                    values.dim(),
                ));
            }
        }
        let painter = overlay.map(|(values, mode)| Painter::new(values, self.mask, mode));

        let (tw, th) = self.tile_size();
        let (cols, rows) = self.grid();
        let mut img = RgbImage::new(tw * cols, th * rows);
        let scale = self.options.pixel_scale;
        let (x0, _) = self.bounds[0];
        let (_, y1) = self.bounds[1];
        let alpha = self.options.overlay_alpha;

        for (i, &z) in self.slices.iter().enumerate() {
            let ox = (i as u32 % cols) * tw;
            let oy = (i as u32 / cols) * th;
            for py in 0..th {
                // anterior at the top
                let y = y1 - (py / scale) as usize;
                for px in 0..tw {
                    let x = x0 + (px / scale) as usize;
                    let bg = self.background[[x, y, z]];
                    let mut rgb = Colormap::Gray.color(if self.background_max > 0.0 {
                        bg / self.background_max
                    } else {
                        0.0
                    });
                    if let Some(p) = &painter {
                        if let Some((color, a)) = p.color_at([x, y, z], alpha) {
                            rgb = blend(rgb, color, a);
                        }
                    }
                    img.put_pixel(ox + px, oy + py, Rgb(rgb));
                }
            }
        }
        Ok(img)
    }

    pub fn save(&self, path: &Path, overlay: Option<(&Array3<f64>, &Overlay)>) -> Result<()> {
        let img = self.render(overlay)?;
        img.save(path)
            .map_err(|e| MfxError::Render(format!("Failed to save {}: {e}", path.display())))?;
        log::debug!("Wrote mosaic {} ({} slices)", path.display(), self.slices.len());
        Ok(())
    }
}

struct Painter<'v> {
    values: &'v Array3<f64>,
    mask: &'v Array3<bool>,
    mode: &'v Overlay,
    cmap: Colormap,
    vmax: f64,
}

impl<'v> Painter<'v> {
    fn new(values: &'v Array3<f64>, mask: &'v Array3<bool>, mode: &'v Overlay) -> Self {
        let in_mask = || values.iter().zip(mask.iter()).filter(|(_, m)| **m).map(|(v, _)| *v);
        let (cmap, vmax) = match mode {
            Overlay::Mask => (Colormap::Gray, 1.0),
            Overlay::Diverging => (
                Colormap::CoolWarm,
                in_mask().fold(0.0f64, |m, v| m.max(v.abs())),
            ),
            Overlay::Activation { .. } => (Colormap::OrRdR, in_mask().fold(0.0f64, f64::max)),
            Overlay::Labels(colors) => (Colormap::Listed(colors.clone()), colors.len() as f64),
        };
        Self {
            values,
            mask,
            mode,
            cmap,
            vmax,
        }
    }

    fn color_at(&self, idx: [usize; 3], alpha: f64) -> Option<([u8; 3], f64)> {
        if !self.mask[idx] {
            return None;
        }
        let v = self.values[idx];
        match self.mode {
            Overlay::Mask => (v != 0.0).then_some((MASK_COLOR, MASK_ALPHA)),
            Overlay::Diverging => {
                if v == 0.0 || self.vmax <= 0.0 {
                    return None;
                }
                Some((self.cmap.color(0.5 + 0.5 * v / self.vmax), alpha))
            }
            Overlay::Activation { floor } => {
                if v < *floor {
                    return None;
                }
                let span = self.vmax - floor;
                let t = if span > 0.0 { (v - floor) / span } else { 0.0 };
                Some((self.cmap.color(t), alpha))
            }
            Overlay::Labels(_) => {
                if v < LABEL_THRESH {
                    return None;
                }
                Some((self.cmap.color(v.clamp(1.0, self.vmax.max(1.0))), alpha))
            }
        }
    }
}

/// Number of mask voxels in each axial slice
pub fn slice_counts(mask: &Array3<bool>) -> Vec<usize> {
    mask.axis_iter(Axis(2))
        .map(|s| s.iter().filter(|&&m| m).count())
        .collect()
}
