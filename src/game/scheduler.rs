//! Spawn scheduling: turning queued notes into tile spawns at the right
//! instant of wall-clock song time.

use super::notes::ScheduledNote;

/// Nominal display refresh rate used to convert per-tick velocity into
/// pixels per second for the lead-time formula.
pub const ASSUMED_FPS: f64 = 60.0;
/// Lead time used when the kinematic formula cannot be evaluated.
pub const FALLBACK_LEAD_SECS: f64 = 1.0;
/// Number of tile lanes.
pub const COLUMNS: usize = 3;

/// Lane for a pitch: stateless pitch-to-column mapping.
pub fn lane_for_pitch(pitch: u8) -> usize {
    pitch as usize % COLUMNS
}

/// Decides which queued notes are due and marks them spawned.
///
/// A tile must have fully crossed the board at the instant its note sounds,
/// so each note spawns `lead_secs` ahead of its nominal time, where
/// `lead_secs` covers the travel distance (board height plus one tile height)
/// at the tile fall speed.
pub struct SpawnScheduler {
    lead_secs: f64,
}

impl SpawnScheduler {
    pub fn new(board_height: f64, tile_height: f64, velocity_per_tick: f64) -> Self {
        let speed = velocity_per_tick * ASSUMED_FPS;
        let lead = (board_height + tile_height) / speed;
        // Fail safe on degenerate kinematics: a fixed lead beats spawning
        // nothing or dumping the whole queue at once.
        let lead_secs = if lead.is_finite() && lead > 0.0 {
            lead
        } else {
            FALLBACK_LEAD_SECS
        };
        Self { lead_secs }
    }

    pub fn lead_secs(&self) -> f64 {
        self.lead_secs
    }

    /// One spawn check. Every not-yet-spawned note whose spawn instant has
    /// passed is marked spawned and returned in queue order; a note is
    /// returned at most once per session and never un-spawns.
    pub fn due_notes(&self, queue: &mut [ScheduledNote], elapsed_secs: f64) -> Vec<ScheduledNote> {
        let mut due = Vec::new();
        for note in queue.iter_mut() {
            if !note.spawned && note.time - self.lead_secs <= elapsed_secs {
                note.spawned = true;
                due.push(*note);
            }
        }
        due
    }
}
