//! Lenient WebVTT parsing.
//!
//! Generated captions are frequently not conformant: missing headers, stray identifiers,
//! cue settings we don't care about, half-written blocks. We parse in a single forward pass
//! over lines and treat each block independently. A block that fails to parse is skipped and
//! scanning resumes on the following line, so one bad block never costs us the rest of the
//! document.

use tracing::debug;

use crate::cue::Cue;
use crate::timestamp;

/// The literal header line that opens a WebVTT document.
pub const HEADER: &str = "WEBVTT";

/// Separator between the start and end timestamps on a timing line.
pub const TIMING_SEPARATOR: &str = "-->";

/// Parsed cues plus bookkeeping about what was skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseReport {
    pub cues: Vec<Cue>,
    pub malformed_blocks: usize,
}

/// Result of attempting to read one block starting at the cursor.
enum BlockOutcome {
    /// A cue was read; the cursor now points at the line after its terminating blank line.
    Cue(Cue, usize),
    /// The block could not be parsed; resume scanning at the given line.
    Malformed(usize),
}

/// Parse a WebVTT document into cues in document order.
///
/// Never fails: empty input yields an empty sequence and malformed blocks are dropped.
pub fn parse(document: &str) -> Vec<Cue> {
    parse_with_report(document).cues
}

/// Like [`parse`], but also reports how many blocks were skipped.
pub fn parse_with_report(document: &str) -> ParseReport {
    let mut report = ParseReport::default();
    if document.is_empty() {
        return report;
    }

    let normalized = document.replace('\r', "");
    let lines: Vec<&str> = normalized.split('\n').collect();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim();
        if line.is_empty() || line == HEADER {
            i += 1;
            continue;
        }

        match read_block(&lines, i) {
            BlockOutcome::Cue(cue, next) => {
                report.cues.push(cue);
                i = next;
            }
            BlockOutcome::Malformed(next) => {
                report.malformed_blocks += 1;
                i = next;
            }
        }
    }

    if report.malformed_blocks > 0 {
        debug!(
            cues = report.cues.len(),
            malformed_blocks = report.malformed_blocks,
            "skipped malformed WebVTT blocks"
        );
    }

    report
}

/// Read the block whose first non-blank line is `lines[i]`.
fn read_block(lines: &[&str], mut i: usize) -> BlockOutcome {
    let first = lines[i].trim();

    // Anything that isn't a timing line is a cue identifier; the timing line must follow it.
    let timing = if first.contains(TIMING_SEPARATOR) {
        first
    } else {
        i += 1;
        lines.get(i).map(|l| l.trim()).unwrap_or("")
    };

    if !timing.contains(TIMING_SEPARATOR) {
        return BlockOutcome::Malformed(i + 1);
    }

    let Some((start, end)) = parse_timing_line(timing) else {
        return BlockOutcome::Malformed(i + 1);
    };

    i += 1;
    let text_start = i;
    while i < lines.len() && !lines[i].trim().is_empty() {
        i += 1;
    }
    let text = lines[text_start..i].join("\n").trim().to_owned();

    // Step over the blank line that terminated the block.
    BlockOutcome::Cue(Cue { start, end, text }, i + 1)
}

/// Parse `START --> END [settings...]` into a pair of times in seconds.
///
/// Only the first whitespace-delimited token on each side is a timestamp; cue settings such
/// as `align:start position:10%` are discarded.
fn parse_timing_line(line: &str) -> Option<(f64, f64)> {
    let (start_raw, end_raw) = line.split_once(TIMING_SEPARATOR)?;
    let start = timestamp::parse(first_token(start_raw))?;
    let end = timestamp::parse(first_token(end_raw))?;
    Some((start, end))
}

fn first_token(side: &str) -> &str {
    side.split_whitespace().next().unwrap_or("")
}
