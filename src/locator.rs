//! Finding the cue that is active at a playback position.
//!
//! The rule everywhere in this module: a cue is active at `t` when `start <= t <= end`, and
//! when several cues are active the one that comes first in the document wins. Sequences are
//! not assumed to be sorted.

use std::cmp::Ordering;

use crate::cue::Cue;

/// Return the first cue in document order that is active at `time`.
///
/// A plain linear scan. It allocates nothing and has no side effects, so it is fine to call on
/// every playback time update.
pub fn locate(cues: &[Cue], time: f64) -> Option<&Cue> {
    cues.iter().find(|cue| cue.contains(time))
}

/// Like [`locate`], but returns the cue's position in the sequence.
pub fn locate_index(cues: &[Cue], time: f64) -> Option<usize> {
    cues.iter().position(|cue| cue.contains(time))
}

/// An interval index over a cue sequence for documents too large for a linear scan.
///
/// Entries are sorted by start time and carry a running maximum of end times, which lets a
/// query stop walking backwards as soon as no earlier cue can still be active. Results are
/// identical to [`locate_index`], including the first-in-document-order tie-break.
#[derive(Debug, Clone, Default)]
pub struct CueIndex {
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    start: f64,
    end: f64,
    /// Position of the cue in the original document.
    position: usize,
    /// Largest `end` among this entry and every entry sorted before it.
    max_end: f64,
}

impl CueIndex {
    pub fn new(cues: &[Cue]) -> Self {
        let mut entries: Vec<IndexEntry> = cues
            .iter()
            .enumerate()
            .map(|(position, cue)| IndexEntry {
                start: cue.start,
                end: cue.end,
                position,
                max_end: cue.end,
            })
            .collect();

        entries.sort_by(|a, b| match a.start.total_cmp(&b.start) {
            Ordering::Equal => a.position.cmp(&b.position),
            other => other,
        });

        let mut running = f64::NEG_INFINITY;
        for entry in &mut entries {
            running = running.max(entry.end);
            entry.max_end = running;
        }

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position (in document order) of the first cue active at `time`.
    pub fn locate_index(&self, time: f64) -> Option<usize> {
        // Every entry before `upper` starts at or before `time`.
        let upper = self.entries.partition_point(|e| e.start <= time);

        let mut best: Option<usize> = None;
        for entry in self.entries[..upper].iter().rev() {
            if entry.max_end < time {
                break;
            }
            if entry.end >= time && best.is_none_or(|b| entry.position < b) {
                best = Some(entry.position);
            }
        }
        best
    }

    /// The first cue active at `time`. `cues` must be the sequence the index was built from.
    pub fn locate<'a>(&self, cues: &'a [Cue], time: f64) -> Option<&'a Cue> {
        self.locate_index(time).and_then(|i| cues.get(i))
    }
}

/// What changed between two successive playback samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActiveCueChange<'a> {
    /// The same cue (or no cue) is still active.
    Unchanged,
    /// A different cue became active.
    Entered(&'a Cue),
    /// The previously active cue ended and nothing replaced it.
    Cleared,
}

/// Caller-owned playback state that turns a stream of time samples into active-cue changes.
///
/// The locator itself stays pure; the only memory lives here, in the position of the cue that
/// was active on the previous sample. Create a fresh tracker whenever the cue sequence is
/// replaced.
#[derive(Debug, Clone, Default)]
pub struct PlaybackTracker {
    active: Option<usize>,
}

impl PlaybackTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn update<'a>(&mut self, cues: &'a [Cue], time: f64) -> ActiveCueChange<'a> {
        let now = locate_index(cues, time);
        if now == self.active {
            return ActiveCueChange::Unchanged;
        }
        self.active = now;
        match now.and_then(|i| cues.get(i)) {
            Some(cue) => ActiveCueChange::Entered(cue),
            None => ActiveCueChange::Cleared,
        }
    }

    pub fn reset(&mut self) {
        self.active = None;
    }
}
