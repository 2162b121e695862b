use thiserror::Error;

pub use crate::fit::FitError;
pub use crate::trace::ParseError;

/// Every failure a filament command can report to the operator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilpalError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("no filament profile named '{0}'")]
    NotFound(String),
    #[error("test '{0}' not found as written, check spelling")]
    UnknownTest(String),
    #[error("cannot locate calibration file for test '{0}'")]
    TestNotFound(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Fit(#[from] FitError),
    #[error("the parameter '{0}' is not recognized, check spelling")]
    UnrecognizedParameter(String),
    #[error("no filament is loaded, run FILPAL_SWAP with LOAD or update the parameters file")]
    NoLoadedFilament,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid state: {0}")]
    State(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("host error: {0}")]
    Host(String),
}

pub type Result<T> = std::result::Result<T, FilpalError>;

/// Log an I/O failure with its context and map it to `FilpalError::Io`.
pub(crate) fn io_error(context: &str, path: &std::path::Path, err: &std::io::Error) -> FilpalError {
    tracing::error!(path = %path.display(), error = %err, "{context}");
    FilpalError::Io(format!("{context} {}: {err}", path.display()))
}
