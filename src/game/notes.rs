//! Note data model and density filtering.
//!
//! The host page runs its own MIDI decoder and hands the result over as JSON;
//! this module deserializes that payload, consumes the first track, and thins
//! it into the spawn queue. The minimum spacing between kept notes is a step
//! function of elapsed song time, so early passages stay sparse and later
//! ones ramp up in density.

use serde::Deserialize;

/// Decoded MIDI payload as produced by the host-side decoder.
/// Missing or empty `tracks` means a silent session, not an error.
#[derive(Debug, Default, Deserialize)]
pub struct DecodedSong {
    #[serde(default)]
    pub tracks: Vec<NoteTrack>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NoteTrack {
    #[serde(default)]
    pub notes: Vec<NoteEvent>,
}

/// One note of the song script: seconds from song start plus MIDI pitch.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct NoteEvent {
    pub time: f64,
    pub pitch: u8,
}

/// A kept note awaiting its spawn instant. `spawned` flips false -> true
/// exactly once (in the scheduler) and never back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledNote {
    pub time: f64,
    pub pitch: u8,
    pub spawned: bool,
}

/// Length of one difficulty segment in seconds of song time.
pub const SEGMENT_SECS: f64 = 15.0;

/// Minimum spacing between kept notes while the song is inside `segment`.
pub fn min_gap_secs(segment: i64) -> f64 {
    match segment {
        ..=0 => 0.6,
        1 => 0.4,
        2 => 0.3,
        _ => 0.2,
    }
}

/// Notes of the first track; songs with no tracks play silent.
pub fn first_track_notes(song: &DecodedSong) -> &[NoteEvent] {
    song.tracks.first().map(|t| t.notes.as_slice()).unwrap_or(&[])
}

/// One-pass greedy thinning of a raw note stream.
///
/// Input need not be sorted; notes are stably ordered by time first, so
/// simultaneous chord notes keep their arrival order and the result is
/// deterministic. Walking the ordered stream, a note is kept iff it is at
/// least `min_gap_secs(segment)` after the previously kept note, where
/// `segment` is the 15-second band the note's own time falls in. Earliest
/// note wins inside a gap window; output order matches input time order.
///
/// Non-finite and negative times are malformed decoder output and dropped up
/// front. Running the filter on its own output is a no-op.
pub fn filter_notes(raw: &[NoteEvent]) -> Vec<ScheduledNote> {
    let mut ordered: Vec<NoteEvent> = raw
        .iter()
        .copied()
        .filter(|n| n.time.is_finite() && n.time >= 0.0)
        .collect();
    ordered.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut kept = Vec::with_capacity(ordered.len());
    // Starts below zero so the first note always passes the gap check.
    let mut last_spawn = f64::NEG_INFINITY;
    for note in ordered {
        let segment = (note.time / SEGMENT_SECS).floor() as i64;
        if note.time - last_spawn >= min_gap_secs(segment) {
            kept.push(ScheduledNote {
                time: note.time,
                pitch: note.pitch,
                spawned: false,
            });
            last_spawn = note.time;
        }
    }
    kept
}
