use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TICK_INTERVAL_MS: u64 = 1000; // Countdown cadence while running
pub const SAVE_INTERVAL_MS: u64 = 5000; // Periodic snapshot cadence
pub const CYCLE_COMPLETE_HOLD_MS: u64 = 2000; // "COMPLETE!" display before the next cycle

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Work,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Work => "work",
            Phase::ShortBreak => "shortBreak",
            Phase::LongBreak => "longBreak",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "work" => Some(Phase::Work),
            "shortBreak" => Some(Phase::ShortBreak),
            "longBreak" => Some(Phase::LongBreak),
            _ => None,
        }
    }

    pub fn is_break(&self) -> bool {
        !matches!(self, Phase::Work)
    }

    /// Styling class the overlay applies for this phase.
    pub fn css_class(&self) -> &'static str {
        match self {
            Phase::Work => "timer-work",
            Phase::ShortBreak => "timer-break",
            Phase::LongBreak => "timer-long-break",
        }
    }

    pub(crate) fn emoji(&self) -> &'static str {
        match self {
            Phase::Work => "💼",
            Phase::ShortBreak => "☕",
            Phase::LongBreak => "🌴",
        }
    }
}

/// Exactly one of these holds at any time; the anchor only exists while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running { anchor: DateTime<Utc> },
    Paused,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, RunState::Paused)
    }
}
