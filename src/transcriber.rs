//! The boundary with the transcription engine.
//!
//! We don't transcribe anything ourselves. A [`Transcriber`] takes a base64 payload and its
//! MIME type and returns whatever text the engine generated; [`captions_from_artifact`] turns
//! that text into a cleaned document and its cues.

use std::future::Future;

use tracing::debug;

use crate::cue::Cue;
use crate::media::MediaArtifact;
use crate::sanitize::clean;
use crate::vtt_parser;
use crate::{Error, ErrorKind, Result};

/// Pluggable transcription engine.
pub trait Transcriber {
    /// Transcribe `base64_payload` (of type `mime_type`) into raw WebVTT-ish text.
    fn transcribe(
        &self,
        base64_payload: &str,
        mime_type: &str,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// A cleaned caption document together with the cues parsed from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Captions {
    pub document: String,
    pub cues: Vec<Cue>,
}

impl Captions {
    /// Clean `raw` engine output and parse it.
    pub fn from_raw(raw: &str) -> Self {
        let document = clean(raw);
        let cues = vtt_parser::parse(&document);
        Self { document, cues }
    }
}

/// Run `artifact` through the transcriber and parse the result.
///
/// Engine errors and blank output both surface as [`Error::TranscriptionFailed`].
pub async fn captions_from_artifact<T: Transcriber>(
    transcriber: &T,
    artifact: &MediaArtifact,
) -> Result<Captions> {
    let raw = transcriber
        .transcribe(&artifact.base64_payload, &artifact.mime_type)
        .await
        .map_err(|err| match err.kind() {
            ErrorKind::TranscriptionFailed => err,
            _ => Error::TranscriptionFailed(err.to_string()),
        })?;

    let captions = Captions::from_raw(&raw);
    if captions.document.is_empty() {
        return Err(Error::TranscriptionFailed(
            "No transcription generated.".to_owned(),
        ));
    }

    debug!(
        name = %artifact.name,
        cues = captions.cues.len(),
        "transcription parsed"
    );
    Ok(captions)
}
