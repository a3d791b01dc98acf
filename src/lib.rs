//! `vttsync` — caption acquisition and WebVTT playback sync.
//!
//! This crate provides:
//! - A media acquisition pipeline that turns a remote video URL into an in-memory audio
//!   artifact via an external extractor (`yt-dlp`), with strict temp-file cleanup
//! - A lenient WebVTT parser, timestamp codec, and cleanup for generated caption text
//! - Active-cue lookup for driving captions from a playback clock
//! - Cue encoders (WebVTT, JSON) for exporting a parsed track
//!
//! Transcription itself is out of scope; plug an engine in through [`Transcriber`].

// Timed-text engine.
pub mod cue;
pub mod locator;
pub mod sanitize;
pub mod timestamp;
pub mod vtt_parser;

// Export formats and encoder interfaces.
pub mod cue_encoder;
pub mod json_array_encoder;
pub mod output_type;
pub mod vtt_encoder;

// Media acquisition.
pub mod acquisition;
pub mod extractor;
pub mod media;
pub mod opts;
pub mod request_key;

// Transcription boundary and client-side session state.
pub mod session;
pub mod transcriber;

mod error;

// Shared helpers for binaries.
#[cfg(feature = "cli")]
pub mod cli;

// Logging configuration and control.
#[cfg(feature = "logging")]
pub mod logging;

pub use acquisition::{Acquirer, Stage};
pub use cue::Cue;
pub use error::{Error, ErrorKind, Result};
pub use extractor::{CapturedOutput, ExtractionRequest, Extractor, YtDlpExtractor};
pub use media::MediaArtifact;
pub use opts::AcquisitionOpts;
pub use output_type::OutputType;
pub use request_key::RequestKey;
pub use session::{CaptionSession, SessionStatus};
pub use transcriber::{Captions, Transcriber, captions_from_artifact};

#[cfg(feature = "logging")]
pub use logging::init as init_logging;
