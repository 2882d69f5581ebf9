use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::format::CodecId;

/// Errors surfaced by the compression pipeline.
///
/// Codec failures inside a single orchestrator trial are recovered locally;
/// everything else reaches the caller unchanged.
#[derive(Debug, Error)]
pub enum Error {
    #[error("input not found: {}", .path.display())]
    InputNotFound { path: PathBuf },

    #[error("input is empty: {}", .path.display())]
    InputEmpty { path: PathBuf },

    #[error("unknown codec '{0}'")]
    UnknownCodec(String),

    #[error("codec {0} is already registered")]
    DuplicateCodec(CodecId),

    #[error("{codec} codec error: {source}")]
    Codec {
        codec: CodecId,
        #[source]
        source: io::Error,
    },

    #[error(
        "target ratio {target:.4} unattainable: smallest artifact is {best_size} bytes, \
         limit is {limit} bytes"
    )]
    RatioUnattainable { target: f64, best_size: u64, limit: u64 },

    #[error("round-trip verification failed for {codec}: {reason}")]
    VerificationFailed { codec: CodecId, reason: String },

    #[error("unrecognized format: {name}")]
    UnrecognizedFormat { name: String },

    #[error("invalid target ratio {0}; expected a value in [0, 1)")]
    InvalidTargetRatio(f64),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Wrap an underlying stream failure as a codec error for `codec`.
    pub fn codec(codec: CodecId, source: io::Error) -> Self {
        Error::Codec { codec, source }
    }

    /// Codec error carrying only a message (malformed header, size mismatch).
    pub fn corrupt(codec: CodecId, msg: impl Into<String>) -> Self {
        Error::Codec {
            codec,
            source: io::Error::new(io::ErrorKind::InvalidData, msg.into()),
        }
    }

    pub fn is_codec(&self) -> bool {
        matches!(self, Error::Codec { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
