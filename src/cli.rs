//! Command-line arguments shared by the binaries.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::opts::{AcquisitionOpts, DEFAULT_MAX_CAPTURE_BYTES, env_flag};

/// Flags that configure the media acquisition pipeline.
#[derive(Args, Debug, Clone)]
pub struct AcquisitionArgs {
    /// Extraction program to run.
    #[arg(long = "extractor", env = "VTTSYNC_EXTRACTOR", default_value = "yt-dlp")]
    pub program: PathBuf,

    /// Directory for temporary extraction output (defaults to `<system temp>/vttsync/<pid>`).
    /// Must not be shared with another running process.
    #[arg(long = "temp-dir", env = "VTTSYNC_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Audio format requested from the extractor.
    #[arg(long = "audio-format", default_value = "mp3")]
    pub audio_format: String,

    /// Audio quality requested from the extractor.
    #[arg(long = "audio-quality", default_value = "64K")]
    pub audio_quality: String,

    /// Maximum bytes captured from each extractor output stream.
    #[arg(long = "max-capture-bytes", default_value_t = DEFAULT_MAX_CAPTURE_BYTES)]
    pub max_capture_bytes: usize,

    /// Kill the extractor after this many seconds (0 disables the limit).
    #[arg(long = "extract-timeout-secs", default_value_t = 0)]
    pub timeout_secs: u64,

    /// Keep extracted files on disk (also enabled by KEEP_TEMP_FILES=true|1).
    #[arg(long = "keep-temp-files", default_value_t = false)]
    pub keep_temp_files: bool,
}

impl AcquisitionArgs {
    /// Map flags (plus the `KEEP_TEMP_FILES` environment variable) into library options.
    pub fn to_opts(&self) -> AcquisitionOpts {
        let defaults = AcquisitionOpts::default();
        let keep_from_env = std::env::var("KEEP_TEMP_FILES")
            .map(|v| env_flag(&v))
            .unwrap_or(false);

        AcquisitionOpts {
            program: self.program.clone(),
            temp_dir: self.temp_dir.clone().unwrap_or(defaults.temp_dir),
            audio_format: self.audio_format.clone(),
            audio_quality: self.audio_quality.clone(),
            max_capture_bytes: self.max_capture_bytes,
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
            keep_temp_files: self.keep_temp_files || keep_from_env,
        }
    }
}
