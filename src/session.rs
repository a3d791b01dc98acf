//! Client-side state for one caption rehearsal.
//!
//! A session goes `Idle -> Processing -> Success | Error`. Starting a new run or calling
//! [`CaptionSession::reset`] throws away everything from the previous one, so a failed run can
//! always be retried from a clean slate.

use tracing::debug;

use crate::cue::Cue;
use crate::locator::{self, ActiveCueChange, PlaybackTracker};
use crate::media::MediaArtifact;
use crate::transcriber::{Captions, Transcriber, captions_from_artifact};
use crate::vtt_encoder::vtt_file_name;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Processing,
    Success,
    Error,
}

#[derive(Debug, Default)]
pub struct CaptionSession {
    status: SessionStatus,
    source_name: Option<String>,
    captions: Captions,
    error: Option<String>,
    tracker: PlaybackTracker,
}

impl CaptionSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    /// The cleaned caption document, empty until a run succeeds.
    pub fn document(&self) -> &str {
        &self.captions.document
    }

    pub fn cues(&self) -> &[Cue] {
        &self.captions.cues
    }

    /// User-facing message for the last failure.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Start a run for `source_name`, discarding the previous run's state.
    pub fn begin(&mut self, source_name: impl Into<String>) {
        self.reset();
        self.source_name = Some(source_name.into());
        self.status = SessionStatus::Processing;
    }

    /// Finish the current run with raw engine output.
    pub fn complete(&mut self, raw: &str) {
        self.set_captions(Captions::from_raw(raw));
    }

    /// Finish the current run with a failure.
    pub fn fail(&mut self, err: &Error) {
        debug!(kind = %err.kind(), error = %err, "caption session failed");
        self.captions = Captions::default();
        self.tracker.reset();
        self.error = Some(err.user_message());
        self.status = SessionStatus::Error;
    }

    /// Return to `Idle`, dropping the document, cues, source, and error.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Transcribe `artifact` and load the result, recording any failure on the session.
    pub async fn transcribe<T: Transcriber>(
        &mut self,
        transcriber: &T,
        artifact: &MediaArtifact,
    ) -> Result<()> {
        self.begin(artifact.name.clone());
        match captions_from_artifact(transcriber, artifact).await {
            Ok(captions) => {
                self.set_captions(captions);
                Ok(())
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// The cue active at `time`, if any.
    pub fn active_cue(&self, time: f64) -> Option<&Cue> {
        locator::locate(&self.captions.cues, time)
    }

    /// Feed a playback position and learn whether the displayed cue should change.
    pub fn sync(&mut self, time: f64) -> ActiveCueChange<'_> {
        self.tracker.update(&self.captions.cues, time)
    }

    /// File name for downloading the current document.
    pub fn export_file_name(&self) -> String {
        vtt_file_name(self.source_name.as_deref().unwrap_or(""))
    }

    fn set_captions(&mut self, captions: Captions) {
        // A new document replaces the old cue sequence wholesale.
        self.captions = captions;
        self.tracker.reset();
        self.error = None;
        self.status = SessionStatus::Success;
    }
}
