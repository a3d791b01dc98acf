//! Running the external extraction tool.
//!
//! The pipeline only needs two things from an extractor: run to completion against an output
//! template, and hand back what it printed. Everything about formats and codecs is the tool's
//! business. Process output is captured with a hard byte ceiling per stream, and the run can
//! be cut short by cancellation or a timeout; in every such case the child is killed.

use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{Error, Result};

/// What one extraction run should produce.
#[derive(Debug, Clone)]
pub struct ExtractionRequest<'a> {
    /// The remote video reference (URL).
    pub reference: &'a str,

    /// Output path template; the tool substitutes the extension for `%(ext)s`.
    pub output_template: &'a Path,

    pub audio_format: &'a str,
    pub audio_quality: &'a str,

    /// Byte ceiling for each captured stream.
    pub max_capture_bytes: usize,

    pub timeout: Option<Duration>,
}

/// Exit information and captured streams from a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    /// Best human-readable explanation of what the process did: trimmed stderr if it wrote
    /// any, otherwise a description of the exit status.
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_owned();
        }
        match self.exit_code {
            Some(code) => format!("process exited with status {code}"),
            None => "process was terminated by a signal".to_owned(),
        }
    }
}

/// Pluggable media extractor used by [`crate::Acquirer`].
///
/// Implementations must honor `cancel` and `request.timeout`, and must bound what they
/// capture. Spawn failures, overflowing output, timeouts, and cancellation are reported as
/// [`Error::ExtractionFailed`]; a process that ran and exited non-zero is reported through
/// `CapturedOutput::success` so the caller can decide.
pub trait Extractor {
    fn extract(
        &self,
        request: &ExtractionRequest<'_>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<CapturedOutput>> + Send;
}

/// Extractor backed by the `yt-dlp` command-line tool.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    program: PathBuf,
}

impl YtDlpExtractor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments for one extraction: single video only, audio only, transcoded to the
    /// requested format and quality.
    pub fn args(request: &ExtractionRequest<'_>) -> Vec<OsString> {
        vec![
            "--no-playlist".into(),
            "-x".into(),
            "--audio-format".into(),
            request.audio_format.into(),
            "--audio-quality".into(),
            request.audio_quality.into(),
            "-o".into(),
            request.output_template.as_os_str().to_owned(),
            // Keeps a reference that starts with '-' from being read as an option.
            "--".into(),
            request.reference.into(),
        ]
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl Extractor for YtDlpExtractor {
    async fn extract(
        &self,
        request: &ExtractionRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<CapturedOutput> {
        let mut command = Command::new(&self.program);
        command.args(Self::args(request));
        run_captured(command, request.max_capture_bytes, request.timeout, cancel).await
    }
}

/// Why capture stopped early.
enum CaptureError {
    Io(std::io::Error),
    Overflow,
}

enum RunOutcome {
    Finished(std::result::Result<CapturedOutput, CaptureError>),
    Cancelled,
    TimedOut,
}

/// Run `command` to completion, capturing at most `limit` bytes of each output stream.
///
/// The child is killed if capture overflows, if `timeout` elapses, or if `cancel` fires. It is
/// also spawned with `kill_on_drop`, so dropping the returned future kills it too.
pub async fn run_captured(
    mut command: Command,
    limit: usize,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<CapturedOutput> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|err| Error::extraction(format!("failed to start {program}: {err}")))?;
    debug!(%program, pid = child.id(), "extractor started");

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::extraction("extractor stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::extraction("extractor stderr was not captured"))?;

    let outcome = {
        let capture = async {
            let (stdout, stderr) =
                tokio::try_join!(read_bounded(stdout, limit), read_bounded(stderr, limit))?;
            let status = child.wait().await.map_err(CaptureError::Io)?;
            Ok::<_, CaptureError>(CapturedOutput {
                success: status.success(),
                exit_code: status.code(),
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            })
        };

        tokio::select! {
            res = capture => RunOutcome::Finished(res),
            _ = cancel.cancelled() => RunOutcome::Cancelled,
            _ = sleep_or_pending(timeout) => RunOutcome::TimedOut,
        }
    };

    let failure = match outcome {
        RunOutcome::Finished(Ok(captured)) => {
            debug!(%program, exit_code = ?captured.exit_code, "extractor finished");
            return Ok(captured);
        }
        RunOutcome::Finished(Err(CaptureError::Overflow)) => {
            format!("{program} output exceeded the {limit} byte capture limit")
        }
        RunOutcome::Finished(Err(CaptureError::Io(err))) => {
            format!("failed to read {program} output: {err}")
        }
        RunOutcome::Cancelled => format!("{program} was cancelled"),
        RunOutcome::TimedOut => match timeout {
            Some(t) => format!("{program} timed out after {:.1}s", t.as_secs_f64()),
            None => format!("{program} timed out"),
        },
    };

    // The child may already be gone; either way it must not outlive this call.
    let _ = child.kill().await;
    Err(Error::extraction(failure))
}

async fn read_bounded<R>(mut reader: R, limit: usize) -> std::result::Result<Vec<u8>, CaptureError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8 * 1024];
    loop {
        let n = reader.read(&mut chunk).await.map_err(CaptureError::Io)?;
        if n == 0 {
            return Ok(buf);
        }
        if buf.len() + n > limit {
            return Err(CaptureError::Overflow);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

async fn sleep_or_pending(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(template: &'a Path) -> ExtractionRequest<'a> {
        ExtractionRequest {
            reference: "https://example.com/watch?v=abc",
            output_template: template,
            audio_format: "mp3",
            audio_quality: "64K",
            max_capture_bytes: 1024,
            timeout: None,
        }
    }

    #[test]
    fn ytdlp_args_pass_format_template_and_reference() {
        let template = Path::new("/tmp/vttsync/audio_1.%(ext)s");
        let args = YtDlpExtractor::args(&request(template));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "--no-playlist",
                "-x",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "64K",
                "-o",
                "/tmp/vttsync/audio_1.%(ext)s",
                "--",
                "https://example.com/watch?v=abc",
            ]
        );
    }

    #[test]
    fn diagnostics_prefer_stderr() {
        let mut out = CapturedOutput {
            success: false,
            exit_code: Some(2),
            stdout: String::new(),
            stderr: "  ERROR: unsupported URL \n".to_owned(),
        };
        assert_eq!(out.diagnostics(), "ERROR: unsupported URL");

        out.stderr.clear();
        assert_eq!(out.diagnostics(), "process exited with status 2");
    }

    #[tokio::test]
    async fn spawn_failure_is_extraction_failed() {
        let command = Command::new("/definitely/not/a/real/program");
        let err = run_captured(command, 1024, None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_streams_and_exit_code() -> anyhow::Result<()> {
        let mut command = Command::new("sh");
        command.args(["-c", "echo out; echo err >&2; exit 3"]);
        let out = run_captured(command, 1024, None, &CancellationToken::new()).await?;
        assert!(!out.success);
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn overflowing_output_fails() {
        let mut command = Command::new("sh");
        command.args(["-c", "yes vttsync | head -c 100000"]);
        let err = run_captured(command, 1024, None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("capture limit"), "{err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_the_child() {
        let mut command = Command::new("sleep");
        command.arg("30");
        let started = std::time::Instant::now();
        let err = run_captured(
            command,
            1024,
            Some(Duration::from_millis(100)),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_kills_the_child() {
        let mut command = Command::new("sleep");
        command.arg("30");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let err = run_captured(command, 1024, None, &cancel).await.unwrap_err();
        assert!(err.to_string().contains("cancelled"), "{err}");
    }
}
