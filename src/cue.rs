use serde::{Deserialize, Serialize};

/// One caption unit from a WebVTT document.
///
/// Times are in seconds. `end >= start` holds for well-formed documents, but the parser passes
/// violations through rather than rejecting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Cue {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Whether `time` falls inside this cue, inclusive at both ends.
    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }
}
