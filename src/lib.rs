//! Tilefall core crate.
//!
//! A piano-tiles style rhythm mini-game compiled to WASM. The host page runs
//! its own MIDI decoder and passes the decoded note track in; this crate owns
//! the simulation (density filtering, spawn scheduling, tile lifecycle, tap
//! resolution) and the canvas presentation. Page navigation, song selection,
//! countdowns, and persistence stay on the JS side.

use wasm_bindgen::prelude::*;

pub mod game;

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

// -----------------------------------------------------------------------------
// Host shell entry points
// -----------------------------------------------------------------------------

/// Start one play session.
///
/// `notes_json` is the host-side MIDI decoder output,
/// `{"tracks":[{"notes":[{"time":seconds,"pitch":midi},..]},..]}`; only the
/// first track is consumed. `audio_src` is an optional URL for the backing
/// track. Calling this while a session is live retires the old session first.
#[wasm_bindgen]
pub fn start_game(notes_json: &str, audio_src: Option<String>) -> Result<(), JsValue> {
    game::start_game_session(notes_json, audio_src.as_deref())
}

/// Stop the running session (host navigation away). Safe to call at any time.
#[wasm_bindgen]
pub fn stop_game() {
    game::stop_game_session();
}

/// Current session score, 0 when no session is live.
#[wasm_bindgen]
pub fn game_score() -> u32 {
    game::current_score()
}

/// Rank letter for a final score; the mapping the end card uses, exposed so
/// the host shell can render the same letter elsewhere.
#[wasm_bindgen]
pub fn rank_for_score(score: u32) -> String {
    game::rank_for(score).to_string()
}
