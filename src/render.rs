//! Display projection of the timer and the sinks that consume it.

use chrono::Local;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::cue::Cue;
use crate::pomodoro::{PomodoroConfig, Timer};

pub const CYCLE_COMPLETE_TITLE: &str = "COMPLETE!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Animation {
    /// A phase finished.
    Pulse,
    /// The whole cycle finished.
    Shake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionCounter {
    pub current: u32,
    pub total: u32,
}

/// Everything the overlay needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFrame {
    pub clock: String,
    pub minutes: u64,
    pub seconds: u64,
    pub title: String,
    pub session: SessionCounter,
    pub progress: f64,
    pub classes: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cue: Option<Cue>,
    pub show_title: bool,
    pub show_session_box: bool,
    pub show_countdown: bool,
    pub scale: f64,
}

impl RenderFrame {
    pub fn new(timer: &Timer, config: &PomodoroConfig) -> Self {
        let remaining = timer.remaining_seconds();
        let minutes = remaining / 60;
        let seconds = remaining % 60;

        let title = if timer.is_cycle_complete() {
            CYCLE_COMPLETE_TITLE.to_string()
        } else {
            config.title(timer.phase()).to_string()
        };

        let mut classes = vec![timer.phase().css_class()];
        if timer.is_paused() {
            classes.push("timer-paused");
        }

        Self {
            clock: format!("{minutes:02}:{seconds:02}"),
            minutes,
            seconds,
            title,
            session: SessionCounter {
                current: timer.session_index(),
                total: config.total_sessions(),
            },
            progress: progress_percent(timer.total_seconds(), remaining),
            classes,
            animation: None,
            cue: None,
            show_title: config.show_titles(),
            show_session_box: config.show_session_box(),
            show_countdown: config.show_countdown(),
            scale: config.scale(),
        }
    }

    pub fn with_animation(mut self, animation: Animation) -> Self {
        self.animation = Some(animation);
        self
    }

    pub fn with_cue(mut self, cue: Option<Cue>) -> Self {
        self.cue = cue;
        self
    }
}

/// Elapsed share of the phase, clamped to [0, 100].
pub fn progress_percent(total: u64, remaining: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let elapsed = total.saturating_sub(remaining) as f64;
    (elapsed / total as f64 * 100.0).clamp(0.0, 100.0)
}

pub trait RenderSink: Send {
    fn render(&mut self, frame: &RenderFrame);
}

/// Prints the readout to the terminal whenever it changes.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    last_line: String,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn line(frame: &RenderFrame) -> String {
        let state = if frame.classes.contains(&"timer-paused") {
            " (paused)"
        } else {
            ""
        };
        format!(
            "{} {}  session {}/{}  {:>3.0}%{}",
            frame.title,
            frame.clock,
            frame.session.current,
            frame.session.total,
            frame.progress,
            state
        )
    }
}

impl RenderSink for ConsoleSink {
    fn render(&mut self, frame: &RenderFrame) {
        let line = Self::line(frame);
        if line != self.last_line {
            println!("[{}] {}", Local::now().format("%H:%M:%S"), line);
            self.last_line = line;
        }
    }
}

/// Fans frames out to every connected overlay client.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<RenderFrame>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RenderFrame> {
        self.tx.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<RenderFrame> {
        self.tx.clone()
    }
}

impl RenderSink for BroadcastSink {
    fn render(&mut self, frame: &RenderFrame) {
        // No subscribers is normal before the overlay connects.
        if self.tx.send(frame.clone()).is_err() {
            trace!("No overlay clients connected");
        }
    }
}
