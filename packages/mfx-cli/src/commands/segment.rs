use crate::cli::SegmentArgs;
use crate::output;
use crate::params;
use mfx_rs::watershed_segment;

pub fn execute(args: SegmentArgs) -> i32 {
    if let Err(e) = params::prepare(&args.common) {
        return params::fail(e);
    }

    match watershed_segment(&args.zstat, &args.localmax, &args.common.out_dir) {
        Ok(outputs) => output::emit("segment", outputs, &args.common),
        Err(e) => params::fail(e),
    }
}
