use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "mfx",
    version,
    about = "Group-level mixed-effects fMRI masking, segmentation and reporting",
    long_about = "Build the group analysis mask, segment thresholded statistic maps around\n\
                  their local maxima, format peak tables and render the summary report.\n\
                  Standard-space resources come from --template, the config file or $FSLDIR."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build the group mask from a 4-D variance stack
    Mask(MaskArgs),
    /// Watershed-segment a thresholded statistic map around its peaks
    Segment(SegmentArgs),
    /// Format a local-maximum table with coordinates and regions
    Peaks(PeaksArgs),
    /// Render the report images for one contrast
    Report(ReportArgs),
    /// Run mask, segment, peaks and report in sequence
    All(AllArgs),
}

/// Options shared by every subcommand
#[derive(Args, Clone)]
pub struct CommonArgs {
    /// Directory that receives the outputs
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// JSON configuration file (default: <config dir>/mfx/config.json)
    #[arg(long, env = "MFX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the JSON summary to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Args)]
pub struct MaskArgs {
    /// 4-D variance stack, one volume per subject
    #[arg(long)]
    pub varcopes: PathBuf,

    /// Standard-space brain mask (overrides the config)
    #[arg(long)]
    pub template: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args)]
pub struct SegmentArgs {
    /// Thresholded statistic map
    #[arg(long)]
    pub zstat: PathBuf,

    /// Local-maximum table from the cluster tool
    #[arg(long)]
    pub localmax: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args)]
pub struct PeaksArgs {
    /// Local-maximum table from the cluster tool
    #[arg(long)]
    pub localmax: PathBuf,

    /// Standard-space template supplying the voxel-to-mm affine
    #[arg(long)]
    pub template: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args)]
pub struct ReportArgs {
    /// Group mask
    #[arg(long)]
    pub mask: PathBuf,

    /// Unthresholded statistic map
    #[arg(long)]
    pub zstat: PathBuf,

    /// Thresholded statistic map
    #[arg(long)]
    pub zstat_thresh: PathBuf,

    /// 4-D contrast estimate stack, one volume per subject
    #[arg(long)]
    pub copes: PathBuf,

    /// Watershed segmentation of the thresholded map
    #[arg(long)]
    pub seg: PathBuf,

    /// Local-maximum table from the cluster tool
    #[arg(long)]
    pub localmax: PathBuf,

    /// Subject ids, or a single file with one id per line
    #[arg(long, num_args = 1.., required = true)]
    pub subjects: Vec<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args)]
pub struct AllArgs {
    /// 4-D variance stack, one volume per subject
    #[arg(long)]
    pub varcopes: PathBuf,

    /// 4-D contrast estimate stack, one volume per subject
    #[arg(long)]
    pub copes: PathBuf,

    /// Unthresholded statistic map
    #[arg(long)]
    pub zstat: PathBuf,

    /// Thresholded statistic map
    #[arg(long)]
    pub zstat_thresh: PathBuf,

    /// Local-maximum table from the cluster tool
    #[arg(long)]
    pub localmax: PathBuf,

    /// Subject ids, or a single file with one id per line
    #[arg(long, num_args = 1.., required = true)]
    pub subjects: Vec<String>,

    /// Standard-space brain mask (overrides the config)
    #[arg(long)]
    pub template: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}
