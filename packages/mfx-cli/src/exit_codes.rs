use mfx_rs::MfxError;

pub const SUCCESS: i32 = 0;
pub const INPUT_ERROR: i32 = 2;
pub const EXECUTION_ERROR: i32 = 3;
pub const CONFIG_ERROR: i32 = 4;

/// Exit code for a failed stage
pub fn for_error(err: &MfxError) -> i32 {
    match err {
        MfxError::Config(_) => CONFIG_ERROR,
        MfxError::Io(_) | MfxError::Render(_) => EXECUTION_ERROR,
        MfxError::FileNotFound(_)
        | MfxError::Nifti { .. }
        | MfxError::Shape { .. }
        | MfxError::MissingColumn { .. }
        | MfxError::Parse(_)
        | MfxError::Csv(_)
        | MfxError::InvalidParameter(_) => INPUT_ERROR,
    }
}
