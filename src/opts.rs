use std::path::PathBuf;
use std::time::Duration;

/// Default ceiling on captured extractor output, per stream.
pub const DEFAULT_MAX_CAPTURE_BYTES: usize = 10 * 1024 * 1024;

/// Options that control how remote media is acquired.
///
/// This struct represents *library-level configuration*, not CLI flags directly.
/// The binaries map user input (flags, environment) into this type so that the library stays
/// reusable from tests, servers, and batch jobs alike.
#[derive(Debug, Clone)]
pub struct AcquisitionOpts {
    /// The extraction program to run (`yt-dlp` by default, resolved through `PATH`).
    pub program: PathBuf,

    /// Directory the extractor writes into. Created on demand and shared between concurrent
    /// requests of one process; file names never collide because each request has its own key.
    ///
    /// Keys are only unique within a process, so two processes must not share this directory.
    /// The default is scoped by process id for that reason.
    pub temp_dir: PathBuf,

    /// Audio format the extractor is asked to produce (e.g. `mp3`).
    pub audio_format: String,

    /// Audio quality passed through to the extractor (e.g. `64K`, plenty for speech).
    pub audio_quality: String,

    /// Maximum bytes captured from each of the extractor's stdout and stderr. Exceeding it
    /// fails the extraction.
    pub max_capture_bytes: usize,

    /// Kill the extractor if it runs longer than this.
    pub timeout: Option<Duration>,

    /// Leave extracted files on disk instead of deleting them. Debugging aid.
    pub keep_temp_files: bool,
}

impl Default for AcquisitionOpts {
    fn default() -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
            temp_dir: default_temp_dir(),
            audio_format: "mp3".to_owned(),
            audio_quality: "64K".to_owned(),
            max_capture_bytes: DEFAULT_MAX_CAPTURE_BYTES,
            timeout: None,
            keep_temp_files: false,
        }
    }
}

impl AcquisitionOpts {
    /// The MIME type declared on artifacts produced with these options.
    pub fn mime_type(&self) -> String {
        format!("audio/{}", self.audio_format.trim().to_ascii_lowercase())
    }
}

/// `<system temp>/vttsync/<pid>`: a private workspace for this process.
pub fn default_temp_dir() -> PathBuf {
    std::env::temp_dir()
        .join("vttsync")
        .join(std::process::id().to_string())
}

/// Interpret a boolean-ish environment value (`true`/`1`/`yes`/`on`).
pub fn env_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
