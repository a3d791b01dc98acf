use crate::Result;
use crate::cue::Cue;

/// A streaming sink for cues in some serialized format.
pub trait CueEncoder {
    fn write_cue(&mut self, cue: &Cue) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Write every cue to `encoder`, then close it.
///
/// If writing fails we still attempt to close, and report the write error first.
pub fn write_cues(encoder: &mut dyn CueEncoder, cues: &[Cue]) -> Result<()> {
    let run_res = cues.iter().try_for_each(|cue| encoder.write_cue(cue));
    let close_res = encoder.close();
    run_res.and(close_res)
}
