use crate::cli::ReportArgs;
use crate::output;
use crate::params;
use mfx_rs::{generate_report, ReportInputs};

pub fn execute(args: ReportArgs) -> i32 {
    let config = match params::prepare(&args.common) {
        Ok(c) => c,
        Err(e) => return params::fail(e),
    };
    let subjects = match params::read_subjects(&args.subjects) {
        Ok(s) => s,
        Err(e) => return params::fail(e),
    };

    let inputs = ReportInputs {
        mask_file: args.mask,
        zstat_file: args.zstat,
        zstat_thresh_file: args.zstat_thresh,
        cope_file: args.copes,
        seg_file: args.seg,
        localmax_file: args.localmax,
        subjects,
    };

    match generate_report(&inputs, &args.common.out_dir, &config) {
        Ok(manifest) => output::emit("report", manifest, &args.common),
        Err(e) => params::fail(e),
    }
}
