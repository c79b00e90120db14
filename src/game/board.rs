//! Gameboard simulation core: live tiles, score, and the session state
//! machine.
//!
//! Pure logic, natively testable; the browser glue in `game` drives it from
//! the requestAnimationFrame loop and renders whatever it holds. All timing
//! derives from the wall-clock timestamps passed into `tick`, never from a
//! frame counter, so spawn timing stays correct under variable frame rates.
//! The tile collection and note queue are touched only from `tick` and
//! `handle_tap`, both of which run on the single browser event queue, so one
//! tick always completes before the next begins.

use super::notes::ScheduledNote;
use super::scheduler::{self, SpawnScheduler};
use super::tile::{self, Tile};

/// Horizontal gap between lanes in canvas pixels.
pub const LANE_GAP: f64 = 10.0;
/// Taps above this fraction of the board height land outside the hit zone
/// and are ignored.
pub const HIT_ZONE_FRACTION: f64 = 0.5;

/// Session lifecycle. `Stopped` is terminal: a stopped board ignores ticks,
/// taps, and repeated stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active,
    Stopped,
}

/// What one tick amounted to, for the host shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Board not active; the tick was a no-op.
    Skipped,
    /// Normal frame.
    Running,
    /// A tile crossed the bottom edge unhit; the session just ended.
    GameOver { final_score: u32 },
}

pub struct Gameboard {
    phase: Phase,
    width: f64,
    height: f64,
    tile_width: f64,
    tiles: Vec<Tile>,
    queue: Vec<ScheduledNote>,
    scheduler: SpawnScheduler,
    score: u32,
    fails: u32,
    start_ms: f64,
}

fn lane_width(board_width: f64) -> f64 {
    (board_width - (scheduler::COLUMNS - 1) as f64 * LANE_GAP) / scheduler::COLUMNS as f64
}

impl Gameboard {
    /// A fresh session over an already-filtered note queue. The board starts
    /// `Idle`; nothing moves until `start`.
    pub fn new(width: f64, height: f64, queue: Vec<ScheduledNote>) -> Self {
        Self {
            phase: Phase::Idle,
            width,
            height,
            tile_width: lane_width(width),
            tiles: Vec::new(),
            queue,
            scheduler: SpawnScheduler::new(height, tile::TILE_HEIGHT, tile::TILE_VELOCITY),
            score: 0,
            fails: 0,
            start_ms: 0.0,
        }
    }

    /// Begin the session, recording the synchronization clock origin. The
    /// caller starts the audio track and the frame loop alongside.
    pub fn start(&mut self, now_ms: f64) {
        if self.phase != Phase::Idle {
            return;
        }
        self.phase = Phase::Active;
        self.start_ms = now_ms;
    }

    /// Host-triggered teardown (e.g. navigating away mid-session). Terminal.
    pub fn stop(&mut self) {
        self.phase = Phase::Stopped;
    }

    /// Recompute lane geometry for a new canvas size. Live tiles keep the
    /// geometry they spawned with; only future spawns use the new lanes.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        self.tile_width = lane_width(width);
        self.scheduler = SpawnScheduler::new(height, tile::TILE_HEIGHT, tile::TILE_VELOCITY);
    }

    /// Resolve one normalized tap. Taps above the hit zone are ignored; among
    /// live unhit tiles the oldest (lowest on screen) containing the point
    /// registers, and at most one tile registers per tap. A tap matching
    /// nothing is a no-op. Returns true when the score changed.
    pub fn handle_tap(&mut self, x: f64, y: f64) -> bool {
        if self.phase != Phase::Active {
            return false;
        }
        if y < self.height * HIT_ZONE_FRACTION {
            return false;
        }
        for tile in self.tiles.iter_mut() {
            if !tile.hit() && tile.contains(x, y) && tile.register_hit() {
                self.score += 1;
                return true;
            }
        }
        false
    }

    /// One frame: spawn due notes, advance every live tile, then sweep. The
    /// first unhit tile to cross the bottom edge ends the session.
    pub fn tick(&mut self, now_ms: f64) -> TickOutcome {
        if self.phase != Phase::Active {
            return TickOutcome::Skipped;
        }
        let elapsed_secs = (now_ms - self.start_ms) / 1000.0;
        for note in self.scheduler.due_notes(&mut self.queue, elapsed_secs) {
            self.spawn_tile(scheduler::lane_for_pitch(note.pitch));
        }
        for tile in self.tiles.iter_mut() {
            tile.advance();
        }
        self.sweep()
    }

    fn spawn_tile(&mut self, lane: usize) {
        let x = lane as f64 * (self.tile_width + LANE_GAP);
        self.tiles.push(Tile::new(
            x,
            -tile::TILE_HEIGHT,
            self.tile_width,
            tile::TILE_HEIGHT,
            lane,
        ));
    }

    /// Remove tiles whose resolve animation finished, drop hit tiles that
    /// fell off the board, and end the session on the first unhit faller.
    /// A tile leaves through exactly one of those paths.
    fn sweep(&mut self) -> TickOutcome {
        let height = self.height;
        let mut missed = false;
        self.tiles.retain(|t| {
            if t.resolved() {
                return false;
            }
            if t.y > height {
                if !t.hit() {
                    missed = true;
                }
                return false;
            }
            true
        });
        if missed {
            self.fails += 1;
            self.phase = Phase::Stopped;
            return TickOutcome::GameOver {
                final_score: self.score,
            };
        }
        TickOutcome::Running
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn fails(&self) -> u32 {
        self.fails
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile_width(&self) -> f64 {
        self.tile_width
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::notes::ScheduledNote;

    const W: f64 = 360.0;
    const H: f64 = 900.0;

    fn queued(time: f64, pitch: u8) -> ScheduledNote {
        ScheduledNote {
            time,
            pitch,
            spawned: false,
        }
    }

    /// Board started at t=0ms with the given queue.
    fn started(queue: Vec<ScheduledNote>) -> Gameboard {
        let mut b = Gameboard::new(W, H, queue);
        b.start(0.0);
        b
    }

    /// Tick at 60fps until the predicate holds or the tick limit runs out.
    fn tick_until(b: &mut Gameboard, mut now_ms: f64, limit: u32, mut stop: impl FnMut(&Gameboard, TickOutcome) -> bool) -> (f64, TickOutcome) {
        let mut outcome = TickOutcome::Running;
        for _ in 0..limit {
            now_ms += 1000.0 / 60.0;
            outcome = b.tick(now_ms);
            if stop(b, outcome) {
                break;
            }
        }
        (now_ms, outcome)
    }

    #[test]
    fn tick_before_start_is_a_noop() {
        let mut b = Gameboard::new(W, H, vec![queued(0.0, 60)]);
        assert_eq!(b.tick(16.0), TickOutcome::Skipped);
        assert!(b.tiles().is_empty());
    }

    #[test]
    fn lane_geometry_matches_gap_layout() {
        let b = started(vec![]);
        // (360 - 2*10) / 3
        assert!((b.tile_width() - 340.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn note_spawns_off_screen_top_in_its_lane() {
        // Pitch 61 -> lane 1.
        let mut b = started(vec![queued(0.0, 61)]);
        b.tick(16.0);
        assert_eq!(b.tiles().len(), 1);
        let t = &b.tiles()[0];
        assert_eq!(t.lane, 1);
        // Spawned at -height, already advanced one tick.
        assert!((t.y - (-tile::TILE_HEIGHT + tile::TILE_VELOCITY)).abs() < 1e-9);
        assert!((t.x - (b.tile_width() + LANE_GAP)).abs() < 1e-9);
    }

    #[test]
    fn spawn_instant_respects_lead_time() {
        // Lead is (900+220)/1020 = 1.098s; a t=5 note spawns near 3.902s.
        let mut b = started(vec![queued(5.0, 60)]);
        assert_eq!(b.tick(3890.0), TickOutcome::Running);
        assert!(b.tiles().is_empty());
        b.tick(3910.0);
        assert_eq!(b.tiles().len(), 1);
    }

    #[test]
    fn tap_above_hit_zone_is_ignored() {
        let mut b = started(vec![queued(0.0, 60)]);
        // Walk the tile down into the upper half.
        tick_until(&mut b, 0.0, 20, |b, _| !b.tiles().is_empty() && b.tiles()[0].y > 0.0);
        let t = &b.tiles()[0];
        let (px, py) = (t.x + 5.0, t.y + 5.0);
        assert!(py < H * HIT_ZONE_FRACTION);
        assert!(!b.handle_tap(px, py));
        assert_eq!(b.score(), 0);
        assert!(!b.tiles()[0].hit());
    }

    #[test]
    fn tap_in_hit_zone_scores_once_per_tile() {
        let mut b = started(vec![queued(0.0, 60)]);
        tick_until(&mut b, 0.0, 80, |b, _| {
            !b.tiles().is_empty() && b.tiles()[0].y > H * HIT_ZONE_FRACTION
        });
        let (px, py) = (b.tiles()[0].x + 5.0, b.tiles()[0].y + 5.0);
        assert!(b.handle_tap(px, py));
        assert_eq!(b.score(), 1);
        // Same spot again: tile already hit, nothing registers.
        assert!(!b.handle_tap(px, py));
        assert_eq!(b.score(), 1);
    }

    #[test]
    fn tap_resolves_oldest_tile_first() {
        // Two notes in one lane spawning a few ticks apart, so their boxes
        // still overlap while both are live.
        let mut b = started(vec![queued(1.2, 60), queued(1.25, 60)]);
        tick_until(&mut b, 0.0, 200, |b, _| {
            b.tiles().len() == 2 && b.tiles()[0].y + 5.0 > H * HIT_ZONE_FRACTION
        });
        assert_eq!(b.tiles().len(), 2);
        let older_y = b.tiles()[0].y;
        assert!(older_y > b.tiles()[1].y);
        // A point inside both boxes registers against the older tile only.
        let (px, py) = (b.tiles()[0].x + 5.0, older_y + 5.0);
        assert!(b.tiles()[1].contains(px, py));
        assert!(b.handle_tap(px, py));
        assert!(b.tiles()[0].hit());
        assert!(!b.tiles()[1].hit());
        assert_eq!(b.score(), 1);
    }

    #[test]
    fn hit_tile_that_falls_off_is_removed_without_fail() {
        let mut b = started(vec![queued(0.0, 60)]);
        let (now, _) = tick_until(&mut b, 0.0, 80, |b, _| {
            !b.tiles().is_empty() && b.tiles()[0].y > H * HIT_ZONE_FRACTION
        });
        let (px, py) = (b.tiles()[0].x + 5.0, b.tiles()[0].y + 5.0);
        assert!(b.handle_tap(px, py));
        let (_, outcome) = tick_until(&mut b, now, 120, |b, _| b.tiles().is_empty());
        assert_eq!(outcome, TickOutcome::Running);
        assert_eq!(b.fails(), 0);
        assert_eq!(b.phase(), Phase::Active);
        assert_eq!(b.score(), 1);
    }

    #[test]
    fn resolved_tile_is_removed_when_animation_finishes_on_board() {
        // A tall board gives the resolve animation time to finish while the
        // tile is still falling inside the board.
        let mut b = Gameboard::new(W, 2000.0, vec![queued(0.0, 60)]);
        b.start(0.0);
        tick_until(&mut b, 0.0, 120, |b, _| {
            !b.tiles().is_empty() && b.tiles()[0].y > 2000.0 * HIT_ZONE_FRACTION
        });
        assert!(b.handle_tap(b.tiles()[0].x + 5.0, b.tiles()[0].y + 5.0));
        let (_, outcome) = tick_until(&mut b, 2000.0, 80, |b, _| b.tiles().is_empty());
        assert_eq!(outcome, TickOutcome::Running);
        assert!(b.tiles().is_empty());
        // Removed by the finished animation, well above the bottom edge.
        assert_eq!(b.fails(), 0);
        assert_eq!(b.phase(), Phase::Active);
        assert_eq!(b.score(), 1);
    }

    #[test]
    fn unhit_tile_past_bottom_ends_the_session_once() {
        let mut b = started(vec![queued(0.0, 60)]);
        let (now, outcome) = tick_until(&mut b, 0.0, 200, |_, o| {
            matches!(o, TickOutcome::GameOver { .. })
        });
        assert_eq!(outcome, TickOutcome::GameOver { final_score: 0 });
        assert_eq!(b.fails(), 1);
        assert_eq!(b.phase(), Phase::Stopped);
        // A stray late tick is a no-op, never a second report.
        assert_eq!(b.tick(now + 16.0), TickOutcome::Skipped);
        assert_eq!(b.fails(), 1);
    }

    #[test]
    fn game_over_reports_score_at_time_of_miss() {
        // First note gets hit, second is left to fall.
        let mut b = started(vec![queued(0.0, 60), queued(1.0, 61)]);
        let (now, _) = tick_until(&mut b, 0.0, 80, |b, _| {
            !b.tiles().is_empty() && b.tiles()[0].y > H * HIT_ZONE_FRACTION
        });
        assert!(b.handle_tap(b.tiles()[0].x + 5.0, b.tiles()[0].y + 5.0));
        let (_, outcome) = tick_until(&mut b, now, 300, |_, o| {
            matches!(o, TickOutcome::GameOver { .. })
        });
        assert_eq!(outcome, TickOutcome::GameOver { final_score: 1 });
    }

    #[test]
    fn stop_is_terminal_and_silences_ticks_and_taps() {
        let mut b = started(vec![queued(0.0, 60)]);
        b.tick(16.0);
        assert_eq!(b.tiles().len(), 1);
        b.stop();
        assert_eq!(b.phase(), Phase::Stopped);
        let y_before = b.tiles()[0].y;
        assert_eq!(b.tick(1000.0), TickOutcome::Skipped);
        assert_eq!(b.tiles()[0].y, y_before);
        assert!(!b.handle_tap(b.tiles()[0].x + 5.0, y_before + 5.0));
        assert_eq!(b.score(), 0);
    }

    #[test]
    fn resize_keeps_in_flight_tiles_and_changes_future_spawns() {
        let mut b = started(vec![queued(0.0, 62), queued(1.2, 62)]);
        b.tick(16.0);
        assert_eq!(b.tiles().len(), 1);
        let old_x = b.tiles()[0].x;
        let old_w = b.tiles()[0].width;
        b.resize(720.0, H);
        assert_eq!(b.tiles()[0].x, old_x);
        assert_eq!(b.tiles()[0].width, old_w);
        // Next spawn in the same lane uses the wider lane math.
        tick_until(&mut b, 16.0, 60, |b, _| b.tiles().len() == 2);
        assert_eq!(b.tiles().len(), 2);
        assert!(b.tiles()[1].x > old_x);
        assert!(b.tiles()[1].width > old_w);
    }

    #[test]
    fn empty_queue_session_runs_without_spawning() {
        let mut b = started(vec![]);
        let (_, outcome) = tick_until(&mut b, 0.0, 120, |_, _| false);
        assert_eq!(outcome, TickOutcome::Running);
        assert!(b.tiles().is_empty());
        assert_eq!(b.phase(), Phase::Active);
    }
}
