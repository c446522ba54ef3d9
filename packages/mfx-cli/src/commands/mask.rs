use crate::cli::MaskArgs;
use crate::output;
use crate::params;
use mfx_rs::make_group_mask;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct MaskOutput {
    template: PathBuf,
    mask_file: PathBuf,
}

pub fn execute(args: MaskArgs) -> i32 {
    let config = match params::prepare(&args.common) {
        Ok(c) => c,
        Err(e) => return params::fail(e),
    };
    let template = match params::template_path(&args.template, &config) {
        Ok(t) => t,
        Err(e) => return params::fail(e),
    };

    match make_group_mask(&args.varcopes, &template, &args.common.out_dir) {
        Ok(mask_file) => output::emit(
            "mask",
            MaskOutput {
                template,
                mask_file,
            },
            &args.common,
        ),
        Err(e) => params::fail(e),
    }
}
