use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide error type.
///
/// `Config` never escapes the UI/CLI boundary into the kernels, which only
/// ever receive validated doubles. Pipeline-state errors are recoverable by
/// falling back to a fresh [`crate::canvas::ImagePair`]. Persistence errors
/// are fatal for the individual load/save call but must leave any in-memory
/// pipeline untouched.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid value for {name}: {reason}")]
    Config { name: String, reason: String },

    #[error("pipeline is empty: no current layer")]
    EmptyPipeline,

    #[error("layer index {0} is not in the stack")]
    NotInStack(usize),

    #[error("unknown operation kind '{0}'")]
    UnknownKind(String),

    #[error("malformed pipeline document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
