//! Phase state machine.
//!
//! While running, the remaining time is always derived from the wall-clock
//! anchor (`total - elapsed`), never decremented per tick, so a late or
//! skipped tick cannot drift the countdown.

use chrono::{DateTime, Utc};

use super::config::PomodoroConfig;
use super::phase::{Phase, RunState};
use super::snapshot::Snapshot;

/// What a completed phase turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The finished phase handed over to `next`, idle and at full length.
    PhaseChanged { finished: Phase, next: Phase },
    /// The last work session of the cycle finished; the session counter is
    /// back at 1 and the timer holds until [`Timer::finish_cycle`].
    CycleComplete,
}

/// Test hook target for a forced completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedPhase {
    Work,
    Break,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timer {
    phase: Phase,
    session_index: u32,
    total_seconds: u64,
    remaining_seconds: u64,
    run: RunState,
    cycle_complete: bool,
}

impl Timer {
    /// Fresh idle work phase at session 1.
    pub fn new(config: &PomodoroConfig) -> Self {
        let total = config.duration_secs(Phase::Work);
        Self {
            phase: Phase::Work,
            session_index: 1,
            total_seconds: total,
            remaining_seconds: total,
            run: RunState::Idle,
            cycle_complete: false,
        }
    }

    /// Rebuild a timer from reconciled parts. `remaining` is clamped to `total`.
    pub(crate) fn restored(
        phase: Phase,
        session_index: u32,
        total_seconds: u64,
        remaining_seconds: u64,
        paused: bool,
    ) -> Self {
        Self {
            phase,
            session_index: session_index.max(1),
            total_seconds,
            remaining_seconds: remaining_seconds.min(total_seconds),
            run: if paused { RunState::Paused } else { RunState::Idle },
            cycle_complete: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session_index(&self) -> u32 {
        self.session_index
    }

    pub fn total_seconds(&self) -> u64 {
        self.total_seconds
    }

    /// Last computed remaining time. Authoritative while idle or paused; refreshed by
    /// [`Timer::tick`] while running.
    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn run_state(&self) -> RunState {
        self.run
    }

    pub fn is_running(&self) -> bool {
        self.run.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.run.is_paused()
    }

    /// True while the "COMPLETE!" hold after a finished cycle is showing.
    pub fn is_cycle_complete(&self) -> bool {
        self.cycle_complete
    }

    /// Remaining time as of `now`, derived from the anchor while running.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> u64 {
        match self.run {
            RunState::Running { anchor } => {
                let elapsed = (now - anchor).num_seconds().max(0) as u64;
                self.total_seconds.saturating_sub(elapsed)
            }
            RunState::Idle | RunState::Paused => self.remaining_seconds,
        }
    }

    /// Idle or Paused -> Running. Returns false when nothing changed.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_running() || self.cycle_complete {
            return false;
        }
        if matches!(self.run, RunState::Idle) && self.remaining_seconds == 0 {
            // Completed unattended before a reload; run the phase again from the top.
            self.remaining_seconds = self.total_seconds;
        }
        // The anchor sits in the past by the part of the phase already used, so
        // a restored partial Idle phase continues from its remaining time rather
        // than restarting from full length. Fresh phases have nothing used and
        // anchor at `now`.
        let already_elapsed = self.total_seconds - self.remaining_seconds;
        let anchor = now - chrono::Duration::seconds(already_elapsed as i64);
        self.run = RunState::Running { anchor };
        true
    }

    /// Running -> Paused, freezing the remaining time at its value as of `now`.
    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_running() {
            return false;
        }
        self.remaining_seconds = self.remaining_at(now);
        self.run = RunState::Paused;
        true
    }

    /// Any state -> Idle at the full, freshly configured length of the current phase.
    pub fn reset(&mut self, config: &PomodoroConfig) {
        if self.cycle_complete {
            self.finish_cycle(config);
            return;
        }
        self.run = RunState::Idle;
        self.total_seconds = config.duration_secs(self.phase);
        self.remaining_seconds = self.total_seconds;
    }

    /// Recompute the countdown. Completes the phase once it reaches zero.
    pub fn tick(&mut self, config: &PomodoroConfig, now: DateTime<Utc>) -> Option<Completion> {
        if !self.is_running() {
            return None;
        }
        self.remaining_seconds = self.remaining_at(now);
        if self.remaining_seconds == 0 {
            return Some(self.complete(config));
        }
        None
    }

    /// Finish the current phase and move to the next one, idle.
    pub fn complete(&mut self, config: &PomodoroConfig) -> Completion {
        let finished = self.phase;
        self.run = RunState::Idle;

        let next = if finished == Phase::Work {
            self.session_index += 1;
            let total = config.total_sessions();
            if self.session_index > config.sessions_for_long_break() && self.session_index <= total
            {
                Phase::LongBreak
            } else if self.session_index <= total {
                Phase::ShortBreak
            } else {
                self.session_index = 1;
                self.remaining_seconds = 0;
                self.cycle_complete = true;
                return Completion::CycleComplete;
            }
        } else {
            Phase::Work
        };

        self.switch_to(next, config);
        Completion::PhaseChanged { finished, next }
    }

    /// Enter `phase` idle, at its configured length.
    pub fn switch_to(&mut self, phase: Phase, config: &PomodoroConfig) {
        self.phase = phase;
        self.run = RunState::Idle;
        self.total_seconds = config.duration_secs(phase);
        self.remaining_seconds = self.total_seconds;
    }

    /// End the post-cycle hold and begin a new cycle at an idle work phase.
    pub fn finish_cycle(&mut self, config: &PomodoroConfig) {
        self.cycle_complete = false;
        self.session_index = 1;
        self.switch_to(Phase::Work, config);
    }

    /// Editor test hook: complete a phase of the given kind right now.
    pub fn force_complete(&mut self, forced: ForcedPhase, config: &PomodoroConfig) -> Completion {
        self.cycle_complete = false;
        self.phase = match forced {
            ForcedPhase::Work => Phase::Work,
            ForcedPhase::Break => Phase::ShortBreak,
        };
        self.complete(config)
    }

    /// Editor test hook: bump the session counter, capped at the cycle length.
    pub fn advance_session(&mut self, config: &PomodoroConfig) {
        self.session_index = (self.session_index + 1).min(config.total_sessions());
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> Snapshot {
        Snapshot {
            current_session: self.session_index,
            mode: self.phase,
            remaining_time: Some(self.remaining_at(now)),
            is_running: self.is_running(),
            is_paused: self.is_paused(),
            timestamp: now.timestamp_millis(),
        }
    }
}
