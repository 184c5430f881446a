use std::path::PathBuf;
use thiserror::Error;

// A missing asset or checksum file is not an error; the platform is omitted.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("release version must not be empty")]
    EmptyVersion,

    #[error("invalid asset pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checksum file {} is empty", path.display())]
    EmptyChecksum { path: PathBuf },

    #[error("failed to serialize manifest")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to parse manifest {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid manifest: {reason}")]
    Invalid { reason: String },
}

impl ManifestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ManifestError>;
