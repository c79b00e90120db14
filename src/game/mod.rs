//! Browser glue for the falling-tile game: canvas and audio setup, pointer
//! and resize listeners, the requestAnimationFrame loop, and rendering.
//!
//! All `web_sys` traffic lives here. The simulation itself sits in the pure
//! child modules and is driven with the wall-clock timestamps this module
//! feeds it, so it stays testable under plain `cargo test` on the host.

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlAudioElement, HtmlCanvasElement, window};

pub mod board;
pub mod notes;
pub mod scheduler;
pub mod tile;

use board::{Gameboard, Phase, TickOutcome};
use notes::DecodedSong;
use tile::Tile;

// --- Rank presentation -------------------------------------------------------

/// Score bands for the end-of-session rank letter, highest first.
pub static RANK_THRESHOLDS: [(u32, &str); 4] = [(80, "S"), (60, "A"), (40, "B"), (20, "C")];

/// Rank letter for a final score. Monotonic step function over score bands;
/// anything under the lowest band is a "D".
pub fn rank_for(score: u32) -> &'static str {
    for &(min, rank) in RANK_THRESHOLDS.iter() {
        if score >= min {
            return rank;
        }
    }
    "D"
}

// --- Session state -----------------------------------------------------------

/// One live session: the simulation core plus the browser resources it
/// drives. Replaced wholesale on every `start_game_session` call; nothing is
/// shared across sessions.
struct GameSession {
    seq: u64,
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    audio: Option<HtmlAudioElement>,
    board: Gameboard,
}

// RefCell::new isn't const on this toolchain; allow Clippy lint until a const initializer is feasible.
thread_local! {
    static GAME_STATE: std::cell::RefCell<Option<GameSession>> = std::cell::RefCell::new(None);
    static SESSION_SEQ: std::cell::Cell<u64> = std::cell::Cell::new(0);
}

// --- Entry points ------------------------------------------------------------

/// Build and start a fresh session. `notes_json` is the host-side MIDI
/// decoder output; `audio_src` an optional URL for the backing track.
pub fn start_game_session(notes_json: &str, audio_src: Option<&str>) -> Result<(), JsValue> {
    let win = window().ok_or_else(|| JsValue::from_str("no window"))?;
    let doc = win
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    // Decoded payload -> first track -> thinned spawn queue. A payload that
    // fails to parse degrades to a silent session rather than an error.
    let song: DecodedSong = match serde_json::from_str(notes_json) {
        Ok(song) => song,
        Err(err) => {
            web_sys::console::warn_1(
                &format!("tilefall: bad note payload ({err}); starting silent").into(),
            );
            DecodedSong::default()
        }
    };
    let queue = notes::filter_notes(notes::first_track_notes(&song));
    if queue.is_empty() {
        web_sys::console::warn_1(&"tilefall: empty note queue; no tiles will spawn".into());
    }

    // Create / reuse the game canvas. Listeners are bound exactly once, when
    // the element is first created.
    let canvas: HtmlCanvasElement = if let Some(el) = doc.get_element_by_id("tf-game-canvas") {
        el.dyn_into()?
    } else {
        let c: HtmlCanvasElement = doc.create_element("canvas")?.dyn_into()?;
        c.set_id("tf-game-canvas");
        c.set_attribute("style", "position:fixed; left:50%; top:50%; transform:translate(-50%,-50%); background:#101018; border-radius:12px; box-shadow:0 0 32px 0 rgba(0,0,0,0.25); z-index:20; touch-action:none;").ok();
        doc.body().unwrap().append_child(&c)?;
        bind_pointer_input(&c)?;
        bind_resize()?;
        c
    };
    let (cw, ch) = viewport_size(&win);
    canvas.set_width(cw);
    canvas.set_height(ch);
    let ctx: CanvasRenderingContext2d = canvas.get_context("2d")?.unwrap().dyn_into()?;

    // Backing track, when the host supplied one. A fresh session always gets
    // a fresh element; playback denial is non-fatal (see `play_audio`).
    let audio = match audio_src {
        Some(src) => {
            let el: HtmlAudioElement = doc.create_element("audio")?.dyn_into()?;
            el.set_src(src);
            el.set_loop(true);
            el.set_volume(0.5);
            Some(el)
        }
        None => None,
    };

    ensure_score_overlay(&doc)?;
    update_score_overlay(0);

    // Retire any previous session before the new one takes the state cell;
    // its frame loop halts on the seq mismatch.
    stop_game_session();
    let seq = SESSION_SEQ.with(|s| {
        let next = s.get() + 1;
        s.set(next);
        next
    });

    let now = win.performance().unwrap().now();
    let mut game = Gameboard::new(cw as f64, ch as f64, queue);
    if let Some(el) = &audio {
        play_audio(el);
    }
    game.start(now);

    GAME_STATE.with(|cell| {
        cell.replace(Some(GameSession {
            seq,
            canvas: canvas.clone(),
            ctx,
            audio,
            board: game,
        }))
    });

    start_frame_loop(seq);
    Ok(())
}

/// Host-triggered teardown (navigation away). Safe whenever; a session that
/// is already over is left untouched apart from the idempotent audio stop.
pub fn stop_game_session() {
    GAME_STATE.with(|cell| {
        if let Some(session) = cell.borrow_mut().as_mut() {
            session.board.stop();
            if let Some(audio) = &session.audio {
                stop_audio(audio);
            }
        }
    });
}

/// Current session score, 0 when no session is live.
pub fn current_score() -> u32 {
    GAME_STATE.with(|cell| cell.borrow().as_ref().map(|s| s.board.score()).unwrap_or(0))
}

// --- Listeners ---------------------------------------------------------------

/// Pointer input: `pointerdown` unifies mouse and touch, and offset
/// coordinates are already canvas-local, so the core only ever sees a
/// normalized tap point.
fn bind_pointer_input(canvas: &HtmlCanvasElement) -> Result<(), JsValue> {
    let closure = Closure::wrap(Box::new(move |evt: web_sys::PointerEvent| {
        evt.prevent_default();
        let x = evt.offset_x() as f64;
        let y = evt.offset_y() as f64;
        GAME_STATE.with(|cell| {
            if let Some(session) = cell.borrow_mut().as_mut() {
                if session.board.handle_tap(x, y) {
                    update_score_overlay(session.board.score());
                }
            }
        });
    }) as Box<dyn FnMut(_)>);
    canvas.add_event_listener_with_callback("pointerdown", closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}

/// Window resizes update the canvas backing store and the board's lane math;
/// in-flight tiles keep their spawn-time geometry.
fn bind_resize() -> Result<(), JsValue> {
    let win = window().ok_or_else(|| JsValue::from_str("no window"))?;
    let closure = Closure::wrap(Box::new(move || {
        if let Some(w) = window() {
            let (cw, ch) = viewport_size(&w);
            GAME_STATE.with(|cell| {
                if let Some(session) = cell.borrow_mut().as_mut() {
                    session.canvas.set_width(cw);
                    session.canvas.set_height(ch);
                    session.board.resize(cw as f64, ch as f64);
                }
            });
        }
    }) as Box<dyn FnMut()>);
    win.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}

fn viewport_size(win: &web_sys::Window) -> (u32, u32) {
    let w = win.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(360.0);
    let h = win.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(640.0);
    (w.max(1.0) as u32, h.max(1.0) as u32)
}

// --- Frame loop --------------------------------------------------------------

type FrameCallback = std::rc::Rc<std::cell::RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// One rAF loop per session. The captured `seq` lets a superseded loop stand
/// down as soon as a newer session owns the state cell.
fn start_frame_loop(seq: u64) {
    let f: FrameCallback = std::rc::Rc::new(std::cell::RefCell::new(None));
    let g = f.clone();
    *g.borrow_mut() = Some(Closure::wrap(Box::new(move |ts: f64| {
        let keep_going = GAME_STATE.with(|cell| {
            match cell.borrow_mut().as_mut() {
                Some(session) if session.seq == seq => session_tick(session, ts),
                _ => false,
            }
        });
        if keep_going {
            if let Some(w) = window() {
                let _ =
                    w.request_animation_frame(f.borrow().as_ref().unwrap().as_ref().unchecked_ref());
            }
        }
    }) as Box<dyn FnMut(f64)>));
    if let Some(w) = window() {
        let _ = w.request_animation_frame(g.borrow().as_ref().unwrap().as_ref().unchecked_ref());
    }
}

/// One frame: advance the simulation, mirror the score, render, and react to
/// the terminal transition. Returns false when the loop should stand down.
fn session_tick(session: &mut GameSession, now: f64) -> bool {
    match session.board.tick(now) {
        TickOutcome::Running => {
            render(session);
            update_score_overlay(session.board.score());
            true
        }
        TickOutcome::GameOver { final_score } => {
            if let Some(audio) = &session.audio {
                stop_audio(audio);
            }
            update_score_overlay(final_score);
            // Final frame stays on screen: the loop stops, so nothing clears
            // the end card until the host starts a new session.
            render(session);
            web_sys::console::log_1(
                &format!(
                    "tilefall: game over, score {final_score}, rank {}",
                    rank_for(final_score)
                )
                .into(),
            );
            false
        }
        TickOutcome::Skipped => false,
    }
}

// --- Audio -------------------------------------------------------------------

/// Start playback. Autoplay policy may reject the returned promise; that is
/// logged and the session simply runs silent.
fn play_audio(el: &HtmlAudioElement) {
    match el.play() {
        Ok(promise) => {
            let on_denied = Closure::wrap(Box::new(move |_err: JsValue| {
                web_sys::console::warn_1(
                    &"tilefall: audio playback blocked; continuing without sound".into(),
                );
            }) as Box<dyn FnMut(JsValue)>);
            let _ = promise.catch(&on_denied);
            on_denied.forget();
        }
        Err(_) => {
            web_sys::console::warn_1(
                &"tilefall: audio.play() failed; continuing without sound".into(),
            );
        }
    }
}

fn stop_audio(el: &HtmlAudioElement) {
    el.pause().ok();
    el.set_current_time(0.0);
}

// --- Score overlay -----------------------------------------------------------

fn ensure_score_overlay(doc: &web_sys::Document) -> Result<(), JsValue> {
    if doc.get_element_by_id("tf-score").is_none() {
        if let Some(body) = doc.body() {
            let div = doc.create_element("div")?;
            div.set_id("tf-score");
            div.set_text_content(Some("Score: 0"));
            div.set_attribute("style", "position:fixed; top:10px; left:12px; font-family:'Fira Code', monospace; font-size:15px; padding:4px 8px; background:rgba(0,0,0,0.42); border:1px solid #333; border-radius:6px; color:#ffd166; z-index:45; letter-spacing:0.5px;").ok();
            body.append_child(&div)?;
        }
    }
    Ok(())
}

fn update_score_overlay(score: u32) {
    if let Some(doc) = window().and_then(|w| w.document()) {
        if let Some(el) = doc.get_element_by_id("tf-score") {
            el.set_text_content(Some(&format!("Score: {score}")));
        }
    }
}

// --- Rendering ---------------------------------------------------------------

fn render(session: &mut GameSession) {
    let ctx = &session.ctx;
    let w = session.canvas.width() as f64;
    let h = session.canvas.height() as f64;

    ctx.set_fill_style_str("#101018");
    ctx.fill_rect(0.0, 0.0, w, h);

    // Lane separators
    let lane_w = session.board.tile_width();
    ctx.set_stroke_style_str("#1f1f2c");
    ctx.set_line_width(2.0);
    for lane in 1..scheduler::COLUMNS {
        let fx = lane as f64 * (lane_w + board::LANE_GAP) - board::LANE_GAP / 2.0;
        line(ctx, fx, 0.0, fx, h);
    }

    // Hit-zone boundary
    ctx.set_stroke_style_str("rgba(255,220,120,0.25)");
    line(ctx, 0.0, h * board::HIT_ZONE_FRACTION, w, h * board::HIT_ZONE_FRACTION);

    for tile in session.board.tiles() {
        draw_tile(ctx, tile);
    }

    // End card only for a miss-terminated session; a host stop just freezes.
    if session.board.phase() == Phase::Stopped && session.board.fails() > 0 {
        draw_game_over(ctx, w, h, session.board.score());
    }
}

fn draw_tile(ctx: &CanvasRenderingContext2d, tile: &Tile) {
    let opacity = tile.opacity();
    if opacity <= 0.0 {
        return;
    }
    ctx.save();
    ctx.set_global_alpha(opacity);

    ctx.set_fill_style_str("#2b2b3a");
    ctx.fill_rect(tile.x, tile.y, tile.width, tile.height);
    ctx.set_stroke_style_str("#3d3d52");
    ctx.set_line_width(2.0);
    ctx.stroke_rect(tile.x + 1.0, tile.y + 1.0, tile.width - 2.0, tile.height - 2.0);

    // Resolve visual: a band rising from the tile's bottom edge, strongest at
    // its leading (top) edge and transparent at the trailing edge.
    let band = tile.highlight_height();
    if band > 0.0 {
        let band_top = tile.y + tile.height - band;
        let gradient = ctx.create_linear_gradient(0.0, band_top + band, 0.0, band_top);
        gradient.add_color_stop(0.0, "rgba(255,0,0,0.0)").ok();
        gradient.add_color_stop(1.0, "rgba(255,0,0,0.8)").ok();
        ctx.set_fill_style_canvas_gradient(&gradient);
        ctx.fill_rect(tile.x, band_top, tile.width, band);
    }

    ctx.restore();
}

fn draw_game_over(ctx: &CanvasRenderingContext2d, w: f64, h: f64, score: u32) {
    ctx.set_fill_style_str("rgba(0,0,0,0.55)");
    ctx.fill_rect(0.0, 0.0, w, h);
    let cx = w / 2.0;
    let cy = h / 2.0;
    ctx.set_text_align("center");
    ctx.set_font("64px 'Fira Code', monospace");
    ctx.set_line_width(6.0);
    ctx.set_stroke_style_str("#000000");
    ctx.set_fill_style_str("#ffffff");
    ctx.stroke_text("GAME OVER", cx, cy).ok();
    ctx.fill_text("GAME OVER", cx, cy).ok();
    ctx.set_font("22px 'Fira Code', monospace");
    ctx.fill_text(&format!("Score: {score}   Rank: {}", rank_for(score)), cx, cy + 48.0)
        .ok();
}

fn line(ctx: &CanvasRenderingContext2d, x1: f64, y1: f64, x2: f64, y2: f64) {
    ctx.begin_path();
    ctx.move_to(x1, y1);
    ctx.line_to(x2, y2);
    ctx.stroke();
}
