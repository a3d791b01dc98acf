use std::io::Write;

use crate::cue::Cue;
use crate::cue_encoder::CueEncoder;
use crate::{Error, Result};

/// Streams cues out as one JSON array, one element per line:
///
/// ```json
/// [
/// {"start":1.0,"end":3.5,"text":"Hello world"},
/// {"start":5.0,"end":6.0,"text":"Second line"}
/// ]
/// ```
///
/// An encoder closed without cues still emits `[]`.
pub struct JsonArrayEncoder<W: Write> {
    w: W,
    state: ArrayState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayState {
    Pending,
    Open { written: usize },
    Closed,
}

impl<W: Write> JsonArrayEncoder<W> {
    pub fn new(w: W) -> Self {
        Self {
            w,
            state: ArrayState::Pending,
        }
    }

    /// Number of cues written so far.
    pub fn written(&self) -> usize {
        match self.state {
            ArrayState::Open { written } => written,
            ArrayState::Pending | ArrayState::Closed => 0,
        }
    }
}

impl<W: Write> CueEncoder for JsonArrayEncoder<W> {
    fn write_cue(&mut self, cue: &Cue) -> Result<()> {
        let written = match self.state {
            ArrayState::Closed => {
                return Err(Error::msg("cannot write cue: encoder is already closed"));
            }
            ArrayState::Pending => {
                self.w.write_all(b"[\n")?;
                0
            }
            ArrayState::Open { written } => {
                self.w.write_all(b",\n")?;
                written
            }
        };

        serde_json::to_writer(&mut self.w, cue)?;
        self.state = ArrayState::Open {
            written: written + 1,
        };

        // Consumers may be reading a pipe or socket as we go.
        self.w.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        match self.state {
            ArrayState::Closed => return Ok(()),
            ArrayState::Pending => self.w.write_all(b"[]")?,
            ArrayState::Open { .. } => self.w.write_all(b"\n]")?,
        }
        self.w.flush()?;
        self.state = ArrayState::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_track_is_an_empty_array() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut enc = JsonArrayEncoder::new(&mut out);
        enc.close()?;
        enc.close()?;
        assert_eq!(std::str::from_utf8(&out)?, "[]");
        Ok(())
    }

    #[test]
    fn cues_deserialize_back() -> anyhow::Result<()> {
        let cues = vec![Cue::new(1.0, 3.5, "Hello world"), Cue::new(5.0, 6.0, "a\nb")];

        let mut out = Vec::new();
        let mut enc = JsonArrayEncoder::new(&mut out);
        for cue in &cues {
            enc.write_cue(cue)?;
        }
        assert_eq!(enc.written(), 2);
        enc.close()?;

        let text = std::str::from_utf8(&out)?;
        assert_eq!(text.lines().count(), 4);
        let parsed: Vec<Cue> = serde_json::from_str(text)?;
        assert_eq!(parsed, cues);
        Ok(())
    }

    #[test]
    fn writing_after_close_fails() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut enc = JsonArrayEncoder::new(&mut out);
        enc.close()?;
        let err = enc.write_cue(&Cue::new(0.0, 1.0, "late")).unwrap_err();
        assert!(err.to_string().contains("already closed"));
        Ok(())
    }
}
