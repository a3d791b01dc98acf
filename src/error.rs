use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// vttsync's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// vttsync's crate-wide error type.
///
/// The acquisition variants map one-to-one onto the pipeline's failure stages so callers can
/// report them without string matching. Parsing never produces an error: malformed cue blocks
/// are skipped inside the parser.
#[derive(Debug, Error)]
pub enum Error {
    /// Acquisition was called without a usable reference. Nothing was spawned.
    #[error("a video URL is required")]
    InvalidRequest,

    /// The extraction process failed to spawn, exited non-zero, overflowed its capture
    /// buffers, timed out, or was cancelled.
    #[error("download failed: {diagnostics}")]
    ExtractionFailed { diagnostics: String },

    /// The extraction process reported success but left no output file behind.
    #[error("output file was not created: {diagnostics}")]
    OutputMissing { diagnostics: String },

    /// The located output file could not be loaded into memory.
    #[error("failed to read '{}'", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The transcription boundary returned no usable text.
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

/// Coarse classification of an [`Error`], stable enough to serialize into API responses and
/// metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRequest,
    ExtractionFailed,
    OutputMissing,
    ReadFailed,
    TranscriptionFailed,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::ExtractionFailed => "extraction_failed",
            ErrorKind::OutputMissing => "output_missing",
            ErrorKind::ReadFailed => "read_failed",
            ErrorKind::TranscriptionFailed => "transcription_failed",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    pub(crate) fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub(crate) fn extraction(diagnostics: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            diagnostics: diagnostics.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidRequest => ErrorKind::InvalidRequest,
            Error::ExtractionFailed { .. } => ErrorKind::ExtractionFailed,
            Error::OutputMissing { .. } => ErrorKind::OutputMissing,
            Error::ReadFailed { .. } => ErrorKind::ReadFailed,
            Error::TranscriptionFailed(_) => ErrorKind::TranscriptionFailed,
            Error::Message(_) | Error::Other(_) => ErrorKind::Internal,
        }
    }

    /// Diagnostic text captured from the extraction process, when there is any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Error::ExtractionFailed { diagnostics } | Error::OutputMissing { diagnostics } => {
                Some(diagnostics)
            }
            _ => None,
        }
    }

    /// Whether the failure happened while reaching or extracting the source media.
    pub fn is_source_failure(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidRequest
                | ErrorKind::ExtractionFailed
                | ErrorKind::OutputMissing
                | ErrorKind::ReadFailed
        )
    }

    /// A message suitable for showing to an end user.
    ///
    /// Source failures and transcript failures read differently so the user knows which half
    /// of the flow to retry.
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidRequest => "Please provide a video URL.".to_owned(),
            Error::ExtractionFailed { .. } | Error::OutputMissing { .. } => {
                "Could not download audio from the video source. Check the URL and try again."
                    .to_owned()
            }
            Error::ReadFailed { .. } => {
                "Could not read the downloaded audio file. Please try again.".to_owned()
            }
            Error::TranscriptionFailed(_) => {
                "Failed to transcribe audio. Please check the file format and try again."
                    .to_owned()
            }
            Error::Message(_) | Error::Other(_) => "An unexpected error occurred.".to_owned(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Message(format!("{err:#}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(Box::new(err))
    }
}
