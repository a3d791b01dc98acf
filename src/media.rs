use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::Result;

/// An in-memory media payload on its way to the transcription boundary.
///
/// The payload is kept base64-encoded because that is the form both the transcription
/// boundary and the HTTP API want. Artifacts are transient; nothing here touches disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaArtifact {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub base64_payload: String,
}

impl MediaArtifact {
    /// Build an artifact from raw bytes, e.g. a locally uploaded file.
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes: bytes.len() as u64,
            base64_payload: STANDARD.encode(bytes),
        }
    }

    /// Decode the payload back into bytes.
    pub fn decode_payload(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.base64_payload)
            .map_err(|err| crate::Error::msg(format!("artifact payload is not valid base64: {err}")))
    }

    /// Video artifacts can be previewed alongside their captions; audio ones cannot.
    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }
}
