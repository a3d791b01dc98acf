/// The supported export formats for a cue sequence.
///
/// Each variant maps to a concrete `CueEncoder` implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputType {
    /// Cues as a JSON array of `{start, end, text}` objects.
    Json,

    /// Cues as a WebVTT document.
    #[default]
    Vtt,
}

impl OutputType {
    /// Parse a user-supplied format name. `None` selects the default (VTT).
    pub fn parse(raw: Option<&str>) -> crate::Result<Self> {
        match raw {
            None => Ok(OutputType::Vtt),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "json" => Ok(OutputType::Json),
                "vtt" => Ok(OutputType::Vtt),
                other => Err(crate::Error::msg(format!(
                    "unknown output type '{other}' (expected 'json' or 'vtt')"
                ))),
            },
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            OutputType::Json => "application/json; charset=utf-8",
            OutputType::Vtt => "text/vtt; charset=utf-8",
        }
    }
}
