use thiserror::Error;

#[derive(Error, Debug)]
pub enum MfxError {
    #[error("Input file not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("NIfTI error in {path}: {message}")]
    Nifti { path: String, message: String },

    #[error("Shape mismatch in {what}: expected {expected}, found {found}")]
    Shape {
        what: String,
        expected: String,
        found: String,
    },

    #[error("Peak table {file} is missing column '{column}'")]
    MissingColumn { file: String, column: String },

    #[error("Failed to parse {0}")]
    Parse(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MfxError {
    pub(crate) fn shape(
        what: impl Into<String>,
        expected: impl std::fmt::Debug,
        found: impl std::fmt::Debug,
    ) -> Self {
        MfxError::Shape {
            what: what.into(),
            expected: format!("{:?}", expected),
            found: format!("{:?}", found),
        }
    }
}

pub type Result<T> = std::result::Result<T, MfxError>;
