use crate::cli::CommonArgs;
use crate::exit_codes;
use mfx_rs::{GroupConfig, MfxError};
use std::path::{Path, PathBuf};

/// Report an error on stderr and pick the exit code for it
pub fn fail(err: MfxError) -> i32 {
    eprintln!("Error: {}", err);
    exit_codes::for_error(&err)
}

/// Load the configuration and make sure the output directory exists
pub fn prepare(common: &CommonArgs) -> Result<GroupConfig, MfxError> {
    let config = GroupConfig::load(common.config.as_deref())?;
    std::fs::create_dir_all(&common.out_dir)?;
    log::debug!("Writing outputs to {}", common.out_dir.display());
    Ok(config)
}

/// `--template` if given, else the configured standard-space mask
pub fn template_path(
    explicit: &Option<PathBuf>,
    config: &GroupConfig,
) -> Result<PathBuf, MfxError> {
    match explicit {
        Some(path) => Ok(path.clone()),
        None => config.template_mask_path(),
    }
}

/// Subject ids from the command line. A single argument naming an existing
/// file is read as one id per line.
pub fn read_subjects(values: &[String]) -> Result<Vec<String>, MfxError> {
    if let [single] = values {
        let path = Path::new(single);
        if path.is_file() {
            let ids: Vec<String> = std::fs::read_to_string(path)?
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            if ids.is_empty() {
                return Err(MfxError::InvalidParameter(format!(
                    "Subject file {} is empty",
                    path.display()
                )));
            }
            return Ok(ids);
        }
    }
    Ok(values.to_vec())
}
