pub mod boxplot;
pub mod colormap;
pub mod config;
pub mod error;
pub mod locator;
pub mod mask;
pub mod morphology;
pub mod mosaic;
pub mod naming;
pub mod palette;
pub mod peaks;
pub mod profiling;
pub mod report;
pub mod segment;
pub mod types;
pub mod volume;
pub mod watershed;

pub use config::{GroupConfig, ReportOptions};
pub use error::{MfxError, Result};
pub use locator::{PeakLocator, RegionAtlas, StandardSpaceLocator};
pub use mask::{build_group_mask, make_group_mask};
pub use peaks::{cluster_table, format_peak_table, read_peak_table};
pub use report::{generate_report, ReportInputs};
pub use segment::{segment, watershed_segment, Segmentation};
pub use types::*;
pub use volume::{read_volume3, read_volume4, Volume3, Volume4, VolumeGeometry};
