use crate::cli::PeaksArgs;
use crate::output;
use crate::params;
use mfx_rs::{cluster_table, StandardSpaceLocator};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct PeaksOutput {
    peak_table: PathBuf,
    atlas: bool,
}

pub fn execute(args: PeaksArgs) -> i32 {
    let config = match params::prepare(&args.common) {
        Ok(c) => c,
        Err(e) => return params::fail(e),
    };
    let locator = match params::template_path(&args.template, &config)
        .and_then(|template| StandardSpaceLocator::load(&template, config.atlas.as_ref()))
    {
        Ok(l) => l,
        Err(e) => return params::fail(e),
    };

    match cluster_table(&args.localmax, &args.common.out_dir, &locator) {
        Ok(peak_table) => output::emit(
            "peaks",
            PeaksOutput {
                peak_table,
                atlas: config.atlas.is_some(),
            },
            &args.common,
        ),
        Err(e) => params::fail(e),
    }
}
