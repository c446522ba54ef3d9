use crate::cli::AllArgs;
use crate::output;
use crate::params;
use mfx_rs::{
    cluster_table, generate_report, make_group_mask, watershed_segment, GroupConfig, MfxError,
    ReportInputs, ReportManifest, SegmentationOutputs, StandardSpaceLocator,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct AllOutput {
    mask_file: PathBuf,
    segmentation: SegmentationOutputs,
    peak_table: PathBuf,
    report: ReportManifest,
}

fn run(args: &AllArgs, config: &GroupConfig) -> Result<AllOutput, MfxError> {
    let out_dir = &args.common.out_dir;
    let template = params::template_path(&args.template, config)?;
    let subjects = params::read_subjects(&args.subjects)?;

    let mask_file = make_group_mask(&args.varcopes, &template, out_dir)?;
    let segmentation = watershed_segment(&args.zstat_thresh, &args.localmax, out_dir)?;

    let locator = StandardSpaceLocator::load(&template, config.atlas.as_ref())?;
    let peak_table = cluster_table(&args.localmax, out_dir, &locator)?;

    let inputs = ReportInputs {
        mask_file: mask_file.clone(),
        zstat_file: args.zstat.clone(),
        zstat_thresh_file: args.zstat_thresh.clone(),
        cope_file: args.copes.clone(),
        seg_file: segmentation.seg_file.clone(),
        localmax_file: args.localmax.clone(),
        subjects,
    };
    let report = generate_report(&inputs, out_dir, config)?;

    Ok(AllOutput {
        mask_file,
        segmentation,
        peak_table,
        report,
    })
}

pub fn execute(args: AllArgs) -> i32 {
    let config = match params::prepare(&args.common) {
        Ok(c) => c,
        Err(e) => return params::fail(e),
    };

    match run(&args, &config) {
        Ok(result) => output::emit("all", result, &args.common),
        Err(e) => params::fail(e),
    }
}
