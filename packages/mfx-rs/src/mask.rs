//! Group analysis mask: the standard-space brain restricted to voxels with
//! nonzero variance in every subject.

use crate::error::{MfxError, Result};
use crate::naming;
use crate::volume::{
    ensure_same_grid, read_volume3, read_volume4, subject_count, write_volume_i16, Volume3, Volume4,
};
use ndarray::{Axis, Zip};
use std::path::{Path, PathBuf};

/// Intersect `template` with the voxels where all subjects have nonzero
/// variance. The result is 0/1 on the template's grid.
///
/// Any nonzero value counts, negative included; a voxel with zero variance
/// in a single subject is dropped.
pub fn build_group_mask(template: &Volume3, varcopes: &Volume4) -> Result<Volume3> {
    let subjects = subject_count(&varcopes.data);
    if subjects == 0 {
        return Err(MfxError::shape(
            "variance stack",
            "at least one subject",
            varcopes.data.shape().to_vec(),
        ));
    }
    ensure_same_grid(
        "template mask",
        (template.grid(), &template.geometry),
        "variance stack",
        (varcopes.grid(), &varcopes.geometry),
    )?;

    let good_var = varcopes
        .data
        .map_axis(Axis(3), |values| values.iter().all(|&v| v != 0.0));

    let mut mask = template.data.mapv(|v| if v != 0.0 { 1.0 } else { 0.0 });
    Zip::from(&mut mask).and(&good_var).for_each(|m, &good| {
        if !good {
            *m = 0.0;
        }
    });

    let kept = mask.iter().filter(|&&v| v != 0.0).count();
    log::info!(
        "Group mask keeps {} voxels across {} subjects",
        kept,
        subjects
    );

    Ok(Volume3::new(mask, template.geometry.clone()))
}

/// Build the group mask from files and write `<out_dir>/group_mask.nii.gz`
pub fn make_group_mask(
    varcope_file: &Path,
    template_file: &Path,
    out_dir: &Path,
) -> Result<PathBuf> {
    crate::profile_scope!("group mask");
    let template = read_volume3(template_file)?;
    let varcopes = read_volume4(varcope_file)?;
    let mask = build_group_mask(&template, &varcopes)?;

    let mask_file = out_dir.join(naming::GROUP_MASK);
    write_volume_i16(&mask_file, &mask.data, &mask.geometry)?;
    Ok(mask_file)
}
