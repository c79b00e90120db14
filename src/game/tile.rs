//! A single falling hit target.

/// Vertical speed in canvas pixels per tick, fixed at spawn.
pub const TILE_VELOCITY: f64 = 17.0;
/// Tile height in canvas pixels.
pub const TILE_HEIGHT: f64 = 220.0;
/// Per-tick resolve animation step (~0.8s hit-to-gone at 60fps).
pub const HIT_STEP: f64 = 0.02;
/// Progress mark where the fade-out ramp begins.
pub const FADE_START: f64 = 0.8;

/// A live tile. Falling never stops, hit or not: a hit tile keeps moving
/// while its resolve animation plays out.
#[derive(Debug, Clone)]
pub struct Tile {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub lane: usize,
    velocity: f64,
    hit: bool,
    hit_progress: f64,
}

impl Tile {
    pub fn new(x: f64, y: f64, width: f64, height: f64, lane: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            lane,
            velocity: TILE_VELOCITY,
            hit: false,
            hit_progress: 0.0,
        }
    }

    /// Advance one tick: fall unconditionally; once hit, also run the
    /// resolve animation.
    pub fn advance(&mut self) {
        self.y += self.velocity;
        if self.hit {
            self.hit_progress += HIT_STEP;
        }
    }

    /// Mark the tile as hit. Returns false (and changes nothing) when it was
    /// already hit, so a tap can never count twice against one tile.
    pub fn register_hit(&mut self) -> bool {
        if self.hit {
            return false;
        }
        self.hit = true;
        true
    }

    /// Axis-aligned containment test against the current box.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }

    pub fn hit(&self) -> bool {
        self.hit
    }

    pub fn hit_progress(&self) -> f64 {
        self.hit_progress
    }

    /// Resolve animation has played out; the tile is render-invisible.
    pub fn resolved(&self) -> bool {
        self.hit && self.hit_progress >= 1.0
    }

    /// Draw opacity: solid until late in the resolve animation, then a linear
    /// ramp to zero.
    pub fn opacity(&self) -> f64 {
        if self.hit && self.hit_progress > FADE_START {
            (1.0 - (self.hit_progress - FADE_START) * 5.0).max(0.0)
        } else {
            1.0
        }
    }

    /// Height of the bottom-anchored highlight band while resolving.
    pub fn highlight_height(&self) -> f64 {
        if self.hit {
            self.height * self.hit_progress.min(1.0)
        } else {
            0.0
        }
    }
}
