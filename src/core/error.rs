use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline error taxonomy. Every variant names the offending path, node, or
/// line so the CLI can print an actionable message before exiting non-zero.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input file is missing or cannot be decoded
    #[error("failed to read \"{path}\": {reason}")]
    Read { path: PathBuf, reason: String },

    /// Output path is not writable
    #[error("failed to write \"{path}\": {reason}")]
    Write { path: PathBuf, reason: String },

    /// Images or composite targets disagree in size
    #[error("unmatched image size in \"{path}\": {detail}")]
    DimensionMismatch { path: PathBuf, detail: String },

    /// Malformed cost matrix, empty model, cyclic chain records
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The solution report assigns no arc to a destination node
    #[error("solution assigns no parent to node {0}")]
    UnresolvedParent(usize),
}

impl Error {
    pub fn read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Read {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
