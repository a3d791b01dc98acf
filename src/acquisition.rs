//! Turning a remote video reference into an in-memory audio artifact.
//!
//! One call to [`Acquirer::acquire`] walks these stages:
//!
//! `Requested -> Extracting -> Locating -> Loading -> CleaningUp -> Completed`
//!
//! and any failure lands in `Errored`. Each request owns the files in the temp directory whose
//! names start with its [`RequestKey`] prefix, and none of them survive the call unless
//! `keep_temp_files` is set. That holds on success, on every error, and when the caller drops
//! the future early (client disconnect): a guard removes the request's files on drop.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::extractor::{ExtractionRequest, Extractor, YtDlpExtractor};
use crate::media::MediaArtifact;
use crate::opts::AcquisitionOpts;
use crate::request_key::RequestKey;
use crate::{Error, Result};

/// Extensions we consider audio when picking among several candidate outputs.
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "opus", "ogg", "oga", "wav", "flac"];

/// Extensions the extractor uses for files it is still writing.
const PARTIAL_EXTENSIONS: &[&str] = &["part", "ytdl", "temp"];

const NO_OUTPUT_DIAGNOSTICS: &str = "No output file was produced.";

/// Where an acquisition is in its lifecycle. Used for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Requested,
    Extracting,
    Locating,
    Loading,
    CleaningUp,
    Completed,
    Errored,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Requested => "requested",
            Stage::Extracting => "extracting",
            Stage::Locating => "locating",
            Stage::Loading => "loading",
            Stage::CleaningUp => "cleaning_up",
            Stage::Completed => "completed",
            Stage::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// The media acquisition pipeline.
///
/// An `Acquirer` is cheap to share behind an `Arc`: it holds configuration and an extractor and
/// nothing per-request, so any number of acquisitions can run concurrently.
pub struct Acquirer<E: Extractor = YtDlpExtractor> {
    extractor: E,
    opts: AcquisitionOpts,
}

impl Acquirer<YtDlpExtractor> {
    /// Create an acquirer that runs `yt-dlp` (or whatever `opts.program` names).
    pub fn new(opts: AcquisitionOpts) -> Self {
        let extractor = YtDlpExtractor::new(opts.program.clone());
        Self::with_extractor(extractor, opts)
    }
}

impl<E: Extractor> Acquirer<E> {
    /// Create an acquirer using a custom extractor.
    pub fn with_extractor(extractor: E, opts: AcquisitionOpts) -> Self {
        Self { extractor, opts }
    }

    pub fn opts(&self) -> &AcquisitionOpts {
        &self.opts
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// Acquire audio for `reference` under a freshly generated request key.
    pub async fn acquire(
        &self,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<MediaArtifact> {
        if reference.trim().is_empty() {
            return Err(Error::InvalidRequest);
        }
        self.acquire_with_key(reference, RequestKey::next(), cancel)
            .await
    }

    /// Acquire audio for `reference` under a caller-chosen key.
    ///
    /// Callers must not run two acquisitions with the same key at the same time; their files
    /// would collide.
    pub async fn acquire_with_key(
        &self,
        reference: &str,
        key: RequestKey,
        cancel: &CancellationToken,
    ) -> Result<MediaArtifact> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(Error::InvalidRequest);
        }

        let span = info_span!("acquire", %key);
        async move {
            info!(stage = %Stage::Requested, %reference, "acquisition requested");
            match self.run(reference, key, cancel).await {
                Ok(artifact) => {
                    info!(
                        stage = %Stage::Completed,
                        size_bytes = artifact.size_bytes,
                        "acquisition completed"
                    );
                    Ok(artifact)
                }
                Err(err) => {
                    warn!(stage = %Stage::Errored, kind = %err.kind(), error = %err, "acquisition failed");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        reference: &str,
        key: RequestKey,
        cancel: &CancellationToken,
    ) -> Result<MediaArtifact> {
        let opts = &self.opts;
        let format = opts.audio_format.trim().to_ascii_lowercase();

        // Armed before anything can exist on disk; removes this request's files if we bail
        // out or get dropped before the success path disarms it.
        let mut guard = TempFileGuard::new(&opts.temp_dir, key, !opts.keep_temp_files);

        debug!(stage = %Stage::Extracting, "starting extractor");
        tokio::fs::create_dir_all(&opts.temp_dir)
            .await
            .map_err(|err| {
                Error::extraction(format!(
                    "failed to prepare temp directory '{}': {err}",
                    opts.temp_dir.display()
                ))
            })?;

        let template = opts
            .temp_dir
            .join(format!("{}.%(ext)s", key.file_stem()));
        let request = ExtractionRequest {
            reference,
            output_template: &template,
            audio_format: &format,
            audio_quality: &opts.audio_quality,
            max_capture_bytes: opts.max_capture_bytes,
            timeout: opts.timeout,
        };
        let captured = self.extractor.extract(&request, cancel).await?;
        if !captured.success {
            return Err(Error::extraction(captured.diagnostics()));
        }

        debug!(stage = %Stage::Locating, "locating output");
        let Some(path) = locate_output(&opts.temp_dir, key, &format).await else {
            let stderr = captured.stderr.trim();
            let diagnostics = if stderr.is_empty() {
                NO_OUTPUT_DIAGNOSTICS.to_owned()
            } else {
                stderr.to_owned()
            };
            return Err(Error::OutputMissing { diagnostics });
        };

        debug!(stage = %Stage::Loading, path = %path.display(), "loading output");
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| Error::ReadFailed {
                path: path.clone(),
                source,
            })?;
        let size_bytes = bytes.len() as u64;
        let base64_payload = STANDARD.encode(&bytes);
        drop(bytes);

        debug!(stage = %Stage::CleaningUp, keep = opts.keep_temp_files, "cleaning up");
        // The payload is in hand, so a failed delete is only worth a warning.
        guard.cleanup().await;

        Ok(MediaArtifact {
            name: key.artifact_name(&format),
            mime_type: opts.mime_type(),
            size_bytes,
            base64_payload,
        })
    }
}

/// Find the extractor's output for `key`.
///
/// The expected `<stem>.<format>` path wins. Otherwise we scan the directory for names with
/// the request's prefix (ignoring partial downloads) and prefer the requested format, then
/// any audio extension, then the first match by name.
pub async fn locate_output(dir: &Path, key: RequestKey, format: &str) -> Option<PathBuf> {
    let expected = dir.join(format!("{}{format}", key.file_prefix()));
    if is_file(&expected).await {
        return Some(expected);
    }

    let prefix = key.file_prefix();
    let mut candidates = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "failed to scan temp directory");
            return None;
        }
    };
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                if name.starts_with(&prefix) && !has_extension_in(name, PARTIAL_EXTENSIONS) {
                    candidates.push(entry.path());
                }
            }
            Ok(None) => break,
            Err(err) => {
                debug!(dir = %dir.display(), error = %err, "temp directory scan interrupted");
                break;
            }
        }
    }
    candidates.sort();

    let chosen = pick_candidate(&candidates, format)?;
    if is_file(chosen).await {
        Some(chosen.to_path_buf())
    } else {
        None
    }
}

fn pick_candidate<'a>(candidates: &'a [PathBuf], format: &str) -> Option<&'a Path> {
    find_by_name(candidates, |name| has_extension_in(name, &[format]))
        .or_else(|| find_by_name(candidates, |name| has_extension_in(name, AUDIO_EXTENSIONS)))
        .or_else(|| candidates.first())
        .map(PathBuf::as_path)
}

fn find_by_name(candidates: &[PathBuf], pred: impl Fn(&str) -> bool) -> Option<&PathBuf> {
    candidates
        .iter()
        .find(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(&pred))
}

fn has_extension_in(name: &str, extensions: &[&str]) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)),
        None => false,
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Removes every file in `dir` belonging to one request, unless disarmed.
struct TempFileGuard {
    dir: PathBuf,
    prefix: String,
    armed: bool,
}

impl TempFileGuard {
    fn new(dir: &Path, key: RequestKey, armed: bool) -> Self {
        Self {
            dir: dir.to_path_buf(),
            prefix: key.file_prefix(),
            armed,
        }
    }

    /// Clean up without blocking the runtime, then disarm.
    ///
    /// Stays armed until the removal finishes, so a caller dropped mid-cleanup still gets the
    /// synchronous sweep from `Drop`.
    async fn cleanup(&mut self) {
        if self.armed {
            remove_request_files_async(&self.dir, &self.prefix).await;
            self.armed = false;
        }
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            remove_request_files(&self.dir, &self.prefix);
            self.armed = false;
        }
    }
}

/// Best-effort removal of files in `dir` whose names start with `prefix`. Returns how many
/// were removed; failures are logged.
fn remove_request_files(dir: &Path, prefix: &str) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "failed to scan temp directory for cleanup");
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_str().is_some_and(|n| n.starts_with(prefix)) {
            continue;
        }
        let path = entry.path();
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %path.display(), error = %err, "failed to remove temp file"),
        }
    }
    if removed > 0 {
        debug!(removed, %prefix, "removed temp files");
    }
    removed
}

/// [`remove_request_files`] on `tokio::fs`, for cleanup from async code.
async fn remove_request_files_async(dir: &Path, prefix: &str) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "failed to scan temp directory for cleanup");
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "temp directory cleanup scan interrupted");
                break;
            }
        };
        if !entry.file_name().to_str().is_some_and(|n| n.starts_with(prefix)) {
            continue;
        }
        let path = entry.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %path.display(), error = %err, "failed to remove temp file"),
        }
    }
    if removed > 0 {
        debug!(removed, %prefix, "removed temp files");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> anyhow::Result<()> {
        std::fs::write(dir.join(name), b"x")?;
        Ok(())
    }

    #[tokio::test]
    async fn locate_prefers_expected_path() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let key = RequestKey::from_millis(42);
        touch(dir.path(), "audio_42.webm")?;
        touch(dir.path(), "audio_42.mp3")?;

        let found = locate_output(dir.path(), key, "mp3").await;
        assert_eq!(found, Some(dir.path().join("audio_42.mp3")));
        Ok(())
    }

    #[tokio::test]
    async fn locate_prefers_audio_over_first_match() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let key = RequestKey::from_millis(7);
        touch(dir.path(), "audio_7.info.json")?;
        touch(dir.path(), "audio_7.m4a")?;
        touch(dir.path(), "audio_7.webm.part")?;
        touch(dir.path(), "audio_70.mp3")?;

        let found = locate_output(dir.path(), key, "mp3").await;
        assert_eq!(found, Some(dir.path().join("audio_7.m4a")));
        Ok(())
    }

    #[tokio::test]
    async fn locate_falls_back_to_first_match() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let key = RequestKey::from_millis(9);
        touch(dir.path(), "audio_9.webm")?;
        touch(dir.path(), "audio_9.bin")?;

        let found = locate_output(dir.path(), key, "mp3").await;
        assert_eq!(found, Some(dir.path().join("audio_9.bin")));
        Ok(())
    }

    #[tokio::test]
    async fn locate_returns_none_without_matches() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        touch(dir.path(), "audio_1.mp3")?;
        assert_eq!(locate_output(dir.path(), RequestKey::from_millis(2), "mp3").await, None);
        assert_eq!(
            locate_output(&dir.path().join("missing"), RequestKey::from_millis(1), "mp3").await,
            None
        );
        Ok(())
    }

    #[test]
    fn remove_request_files_only_touches_its_prefix() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        touch(dir.path(), "audio_5.mp3")?;
        touch(dir.path(), "audio_5.webm.part")?;
        touch(dir.path(), "audio_55.mp3")?;

        assert_eq!(remove_request_files(dir.path(), "audio_5."), 2);
        assert!(dir.path().join("audio_55.mp3").exists());
        assert_eq!(remove_request_files(&dir.path().join("missing"), "audio_5."), 0);
        Ok(())
    }

    #[tokio::test]
    async fn async_cleanup_removes_request_files_and_disarms() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        touch(dir.path(), "audio_8.mp3")?;
        touch(dir.path(), "audio_8.webm.part")?;
        touch(dir.path(), "audio_80.mp3")?;

        let mut guard = TempFileGuard::new(dir.path(), RequestKey::from_millis(8), true);
        guard.cleanup().await;
        assert!(!guard.armed);
        assert!(!dir.path().join("audio_8.mp3").exists());
        assert!(!dir.path().join("audio_8.webm.part").exists());

        // Disarmed: dropping must not sweep files that reappear under the prefix.
        touch(dir.path(), "audio_8.mp3")?;
        drop(guard);
        assert!(dir.path().join("audio_8.mp3").exists());
        assert!(dir.path().join("audio_80.mp3").exists());

        assert_eq!(
            remove_request_files_async(&dir.path().join("missing"), "audio_8.").await,
            0
        );
        Ok(())
    }

    #[test]
    fn disarmed_guard_leaves_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        touch(dir.path(), "audio_3.mp3")?;
        drop(TempFileGuard::new(dir.path(), RequestKey::from_millis(3), false));
        assert!(dir.path().join("audio_3.mp3").exists());

        drop(TempFileGuard::new(dir.path(), RequestKey::from_millis(3), true));
        assert!(!dir.path().join("audio_3.mp3").exists());
        Ok(())
    }
}
