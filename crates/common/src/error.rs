//! Error types shared across Steadyframe crates.

use std::path::PathBuf;

/// Top-level error type for Steadyframe operations.
#[derive(Debug, thiserror::Error)]
pub enum StabError {
    #[error("Input error: {message}")]
    Input { message: String },

    #[error("Invariant violated: {message}")]
    Invariant { message: String },

    #[error("Media I/O error: {message}")]
    Media { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using StabError.
pub type StabResult<T> = Result<T, StabError>;

/// Coarse attribution of a failure, used when reporting a run outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unusable input data (empty image directory, unsupported pixel data).
    Input,
    /// Caller/programmer error: a precondition of the pipeline did not hold.
    Invariant,
    /// Reading the source or writing the sink failed.
    Io,
    /// Invalid settings.
    Config,
    /// The run was cancelled between frames.
    Cancelled,
}

impl StabError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input {
            message: msg.into(),
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant {
            message: msg.into(),
        }
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Which of the error kinds this failure belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Input { .. } => ErrorKind::Input,
            Self::Invariant { .. } => ErrorKind::Invariant,
            Self::Config { .. } => ErrorKind::Config,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Media { .. } | Self::FileNotFound { .. } | Self::Io(_) => ErrorKind::Io,
            Self::Json(_) | Self::Other(_) => ErrorKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_attribution() {
        assert_eq!(StabError::invariant("x").kind(), ErrorKind::Invariant);
        assert_eq!(StabError::media("ffmpeg died").kind(), ErrorKind::Io);
        assert_eq!(
            StabError::FileNotFound {
                path: PathBuf::from("/nope.mp4")
            }
            .kind(),
            ErrorKind::Io
        );
        assert_eq!(StabError::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_error_display_includes_message() {
        let err = StabError::invariant("axis lengths differ: x=3, y=2, angle=3");
        assert_eq!(
            err.to_string(),
            "Invariant violated: axis lengths differ: x=3, y=2, angle=3"
        );
    }
}
