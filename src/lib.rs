//! Pomodoro timer for stream overlays.
//!
//! A single timer cycles through work and break phases, survives restarts by
//! reconciling a persisted snapshot against wall-clock time, and takes its
//! commands from overlay chat, settings-panel buttons and control clicks.

pub mod cue;
pub mod events;
pub mod persistence;
pub mod pomodoro;
pub mod render;
pub mod store;
pub mod widget;
pub mod ws;
