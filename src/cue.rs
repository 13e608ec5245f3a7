use notify_rust::Notification;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::pomodoro::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Cue {
    Tick,
    WorkComplete,
    BreakComplete,
}

impl Cue {
    /// Completion cue for a phase that just ended.
    pub fn for_finished(phase: Phase) -> Self {
        if phase.is_break() {
            Cue::BreakComplete
        } else {
            Cue::WorkComplete
        }
    }
}

#[derive(Debug, Error)]
pub enum CueError {
    #[error("playback failed: {0}")]
    Playback(String),
}

pub trait CuePlayer: Send {
    fn play(&mut self, cue: Cue) -> Result<(), CueError>;
}

/// Play a cue, logging instead of propagating failures.
pub fn play_cue(player: &mut dyn CuePlayer, cue: Cue) {
    if let Err(e) = player.play(cue) {
        warn!(?cue, error = %e, "Cue playback failed");
    }
}

/// Desktop notification with a sound for completion cues. Per-second tick
/// cues are left to the overlay client.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotificationCuePlayer;

impl NotificationCuePlayer {
    fn message(cue: Cue) -> Option<&'static str> {
        match cue {
            Cue::Tick => None,
            Cue::WorkComplete => Some("Work session complete! Time for a break."),
            Cue::BreakComplete => Some("Break is over! Back to work."),
        }
    }
}

impl CuePlayer for NotificationCuePlayer {
    fn play(&mut self, cue: Cue) -> Result<(), CueError> {
        let Some(message) = Self::message(cue) else {
            return Ok(());
        };
        debug!(?cue, "Sending notification");
        Notification::new()
            .summary("Pomodoro")
            .body(message)
            .sound_name("complete")
            .show()
            .map(|_| ())
            .map_err(|e| CueError::Playback(e.to_string()))
    }
}

/// Used when sound is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentCuePlayer;

impl CuePlayer for SilentCuePlayer {
    fn play(&mut self, _cue: Cue) -> Result<(), CueError> {
        Ok(())
    }
}
