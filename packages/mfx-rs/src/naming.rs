//! Output filenames derived from input filenames.

use crate::error::{MfxError, Result};
use std::path::{Path, PathBuf};

const VOLUME_EXTENSIONS: [&str; 4] = [".nii.gz", ".nii", ".img", ".hdr"];

pub const GROUP_MASK: &str = "group_mask.nii.gz";
pub const SUBJECTS_FILE: &str = "subjects.txt";
pub const BOXPLOT_FILE: &str = "peak_boxplot.png";

fn invalid_name(source: &Path) -> MfxError {
    MfxError::InvalidParameter(format!("Invalid file name: {}", source.display()))
}

fn file_name(source: &Path) -> Result<&str> {
    source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| invalid_name(source))
}

/// File name without its volume extension (`zstat1.nii.gz` -> `zstat1`)
pub fn strip_volume_ext(source: &Path) -> Result<String> {
    let name = file_name(source)?;
    for ext in VOLUME_EXTENSIONS {
        if let Some(stem) = name.strip_suffix(ext) {
            return Ok(stem.to_string());
        }
    }
    Ok(match name.rfind('.') {
        Some(i) if i > 0 => name[..i].to_string(),
        _ => name.to_string(),
    })
}

/// `<out_dir>/<stem><suffix>.png`
pub fn png_name(out_dir: &Path, source: &Path, suffix: &str) -> Result<PathBuf> {
    Ok(out_dir.join(format!("{}{}.png", strip_volume_ext(source)?, suffix)))
}

/// `<out_dir>/<stem><suffix>.nii.gz`
pub fn volume_name(out_dir: &Path, source: &Path, suffix: &str) -> Result<PathBuf> {
    Ok(out_dir.join(format!("{}{}.nii.gz", strip_volume_ext(source)?, suffix)))
}

/// Replace the last extension and move into `out_dir`
pub fn swap_ext(out_dir: &Path, source: &Path, ext: &str) -> Result<PathBuf> {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| invalid_name(source))?;
    Ok(out_dir.join(format!("{}.{}", stem, ext)))
}
