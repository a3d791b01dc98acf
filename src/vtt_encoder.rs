use std::io::Write;

use crate::cue::Cue;
use crate::cue_encoder::CueEncoder;
use crate::timestamp;
use crate::vtt_parser::TIMING_SEPARATOR;
use crate::{Error, Result};

/// Streams cues out as a WebVTT document.
///
/// The `WEBVTT` header goes out with the first cue, so closing an encoder that never saw a cue
/// writes nothing. Output parses back into the same cues with [`crate::vtt_parser::parse`],
/// give or take millisecond rounding of the times.
pub struct VttEncoder<W: Write> {
    w: W,
    header_written: bool,
    closed: bool,
}

impl<W: Write> VttEncoder<W> {
    pub fn new(w: W) -> Self {
        Self {
            w,
            header_written: false,
            closed: false,
        }
    }

    fn write_header_once(&mut self) -> Result<()> {
        if !self.header_written {
            self.w.write_all(b"WEBVTT\n\n")?;
            self.header_written = true;
        }
        Ok(())
    }
}

impl<W: Write> CueEncoder for VttEncoder<W> {
    fn write_cue(&mut self, cue: &Cue) -> Result<()> {
        if self.closed {
            return Err(Error::msg("cannot write cue: encoder is already closed"));
        }
        self.write_header_once()?;

        writeln!(
            &mut self.w,
            "{} {TIMING_SEPARATOR} {}",
            timestamp::format(cue.start),
            timestamp::format(cue.end)
        )?;

        // A blank line inside the text would end the cue early when read back, so we drop
        // empty lines. An empty cue is written as a bare timing line.
        for line in cue.text.lines().filter(|l| !l.trim().is_empty()) {
            writeln!(&mut self.w, "{line}")?;
        }

        writeln!(&mut self.w)?;
        self.w.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.w.flush()?;
        self.closed = true;

        Ok(())
    }
}

/// File name to offer when exporting captions for `source_name`.
///
/// We replace the last extension with `.vtt` (`clip.final.mp4` -> `clip.final.vtt`). An empty
/// name falls back to `transcription.vtt`.
pub fn vtt_file_name(source_name: &str) -> String {
    let name = source_name.trim();
    let stem = match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    };
    if stem.is_empty() {
        return "transcription.vtt".to_owned();
    }
    format!("{stem}.vtt")
}
