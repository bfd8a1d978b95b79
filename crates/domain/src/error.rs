//! Errors surfaced by the face

use std::path::PathBuf;
use thiserror::Error;

use crate::model::{InvalidNativeId, Slot};
use crate::ports::{RemoteError, StrategyError};

/// Error type for face operations
#[derive(Debug, Error)]
pub enum FaceError {
    #[error("Unknown {slot} category: {category}")]
    UnknownCategory { slot: Slot, category: String },
    #[error("No {0} category configured and no default available")]
    MissingCategory(Slot),
    #[error("Invalid parameters for {slot} category {category}: {message}")]
    InvalidParameters {
        slot: Slot,
        category: String,
        message: String,
    },
    #[error("Unsupported content: {0}")]
    UnsupportedContent(String),
    #[error("Post is not allowed to be posted")]
    Rejected,
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Strategy(StrategyError),
    #[error("Failed to access {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt manifest at {}: {message}", .path.display())]
    CorruptManifest { path: PathBuf, message: String },
    #[error(transparent)]
    InvalidNativeId(#[from] InvalidNativeId),
    #[error("Face state is not available ({0})")]
    NotReady(&'static str),
    #[error("Slot {0} cannot be reconfigured")]
    NotConfigurable(Slot),
}

impl From<StrategyError> for FaceError {
    fn from(error: StrategyError) -> Self {
        match error {
            StrategyError::Remote(error) => FaceError::Remote(error),
            StrategyError::UnsupportedContent(message) => FaceError::UnsupportedContent(message),
            other => FaceError::Strategy(other),
        }
    }
}

impl FaceError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FaceError::Persistence {
            path: path.into(),
            source,
        }
    }
}
