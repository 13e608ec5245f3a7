//! Persisted projection of the timer and the reload reconciliation that turns
//! a stale snapshot back into a plausible timer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::config::PomodoroConfig;
use super::phase::Phase;
use super::timer::Timer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub current_session: u32,
    pub mode: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_time: Option<u64>,
    pub is_running: bool,
    pub is_paused: bool,
    /// Save time, epoch milliseconds.
    pub timestamp: i64,
}

/// Loose shape of whatever the store handed back.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    #[serde(default)]
    current_session: Option<u32>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    remaining_time: Option<u64>,
    #[serde(default)]
    is_running: Option<bool>,
    #[serde(default)]
    is_paused: Option<bool>,
    #[serde(default)]
    timestamp: Option<i64>,
}

impl Snapshot {
    /// Decode a stored value. Anything without a usable timestamp, with an
    /// unknown mode, or running/paused without a remaining time is rejected
    /// and the caller starts fresh.
    pub fn from_value(value: Value) -> Option<Self> {
        let raw: RawSnapshot = serde_json::from_value(value).ok()?;
        let timestamp = raw.timestamp.filter(|ts| *ts > 0)?;
        let mode = match raw.mode.as_deref() {
            None | Some("") => Phase::Work,
            Some(mode) => Phase::parse(mode)?,
        };
        let is_running = raw.is_running.unwrap_or(false);
        let is_paused = raw.is_paused.unwrap_or(false);
        if raw.remaining_time.is_none() && (is_running || is_paused) {
            // An active countdown cannot be resumed without knowing where it was.
            return None;
        }
        Some(Self {
            current_session: raw.current_session.filter(|s| *s > 0).unwrap_or(1),
            mode,
            remaining_time: raw.remaining_time,
            is_running,
            is_paused,
            timestamp,
        })
    }

    pub fn to_value(&self) -> Value {
        // A struct of plain fields always serializes.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Reconstruct the timer a reload should resume from.
///
/// The phase length always comes from the current configuration. A snapshot
/// that was running is charged for the time since it was saved and comes back
/// paused (or idle at zero if it ran out); a paused snapshot is restored as is.
pub fn reconcile(snapshot: &Snapshot, config: &PomodoroConfig, now: DateTime<Utc>) -> Timer {
    let phase = snapshot.mode;
    let total = config.duration_secs(phase);
    let elapsed = ((now.timestamp_millis() - snapshot.timestamp) / 1000).max(0) as u64;

    if snapshot.is_running && !snapshot.is_paused {
        let remaining = snapshot.remaining_time.unwrap_or(total).saturating_sub(elapsed);
        let paused = remaining > 0;
        Timer::restored(phase, snapshot.current_session, total, remaining, paused)
    } else if snapshot.is_paused {
        let remaining = snapshot.remaining_time.unwrap_or(total);
        Timer::restored(phase, snapshot.current_session, total, remaining, true)
    } else {
        let remaining = snapshot
            .remaining_time
            .filter(|r| *r > 0)
            .unwrap_or(total);
        Timer::restored(phase, snapshot.current_session, total, remaining, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pomodoro::phase::RunState;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn running(remaining: u64) -> Snapshot {
        Snapshot {
            current_session: 3,
            mode: Phase::Work,
            remaining_time: Some(remaining),
            is_running: true,
            is_paused: false,
            timestamp: t0().timestamp_millis(),
        }
    }

    #[test]
    fn test_running_snapshot_comes_back_paused() {
        let config = PomodoroConfig::default();
        let timer = reconcile(&running(100), &config, t0() + Duration::seconds(30));
        assert_eq!(timer.run_state(), RunState::Paused);
        assert_eq!(timer.remaining_seconds(), 70);
        assert_eq!(timer.session_index(), 3);
        assert_eq!(timer.total_seconds(), 1500);
    }

    #[test]
    fn test_running_snapshot_that_ran_out_is_idle_at_zero() {
        let config = PomodoroConfig::default();
        let timer = reconcile(&running(100), &config, t0() + Duration::seconds(130));
        assert_eq!(timer.run_state(), RunState::Idle);
        assert_eq!(timer.remaining_seconds(), 0);
        assert_eq!(timer.phase(), Phase::Work);
    }

    #[test]
    fn test_elapsed_is_floored_to_whole_seconds() {
        let config = PomodoroConfig::default();
        let timer = reconcile(&running(100), &config, t0() + Duration::milliseconds(30_999));
        assert_eq!(timer.remaining_seconds(), 70);
    }

    #[test]
    fn test_paused_snapshot_does_not_decay() {
        let config = PomodoroConfig::default();
        let snapshot = Snapshot {
            is_running: false,
            is_paused: true,
            remaining_time: Some(42),
            ..running(0)
        };
        for later in [1, 3600, 86_400 * 7] {
            let timer = reconcile(&snapshot, &config, t0() + Duration::seconds(later));
            assert_eq!(timer.run_state(), RunState::Paused);
            assert_eq!(timer.remaining_seconds(), 42);
        }
    }

    #[test]
    fn test_idle_snapshot_restores_saved_remaining_or_full_length() {
        let config = PomodoroConfig::default();
        let idle = Snapshot {
            mode: Phase::ShortBreak,
            remaining_time: Some(120),
            is_running: false,
            ..running(0)
        };
        let timer = reconcile(&idle, &config, t0() + Duration::seconds(500));
        assert_eq!(timer.run_state(), RunState::Idle);
        assert_eq!(timer.phase(), Phase::ShortBreak);
        assert_eq!(timer.remaining_seconds(), 120);

        let without_remaining = Snapshot {
            remaining_time: None,
            ..idle
        };
        let timer = reconcile(&without_remaining, &config, t0());
        assert_eq!(timer.remaining_seconds(), 300);
    }

    #[test]
    fn test_configuration_changes_apply_to_restored_phase() {
        let config = PomodoroConfig {
            long_break_duration: Some(1.0),
            ..PomodoroConfig::default()
        };
        let snapshot = Snapshot {
            mode: Phase::LongBreak,
            remaining_time: Some(600),
            is_running: false,
            is_paused: true,
            ..running(0)
        };
        let timer = reconcile(&snapshot, &config, t0());
        assert_eq!(timer.total_seconds(), 60);
        assert_eq!(timer.remaining_seconds(), 60);
    }

    #[test]
    fn test_from_value_accepts_stored_shape() {
        let value = json!({
            "currentSession": 4,
            "mode": "longBreak",
            "remainingTime": 321,
            "isRunning": false,
            "isPaused": true,
            "timestamp": 1714564800000i64
        });
        let snapshot = Snapshot::from_value(value.clone()).expect("snapshot");
        assert_eq!(snapshot.mode, Phase::LongBreak);
        assert_eq!(snapshot.current_session, 4);
        assert_eq!(snapshot.remaining_time, Some(321));
        assert_eq!(snapshot.to_value(), value);
    }

    #[test]
    fn test_from_value_rejects_malformed() {
        assert_eq!(Snapshot::from_value(json!({"mode": "work", "remainingTime": 5})), None);
        assert_eq!(Snapshot::from_value(json!({"timestamp": 0})), None);
        assert_eq!(
            Snapshot::from_value(json!({"timestamp": 1714564800000i64, "mode": "nap"})),
            None
        );
        assert_eq!(Snapshot::from_value(json!("pomodoro")), None);
        assert_eq!(Snapshot::from_value(json!({"timestamp": "yesterday"})), None);
    }

    #[test]
    fn test_from_value_rejects_active_snapshot_without_remaining_time() {
        let ts = t0().timestamp_millis();
        let running = json!({
            "isRunning": true,
            "mode": "longBreak",
            "currentSession": 5,
            "timestamp": ts
        });
        assert_eq!(Snapshot::from_value(running), None);
        let paused = json!({"isPaused": true, "mode": "work", "timestamp": ts});
        assert_eq!(Snapshot::from_value(paused), None);

        let idle = json!({"isRunning": false, "mode": "shortBreak", "timestamp": ts});
        assert_eq!(Snapshot::from_value(idle).unwrap().remaining_time, None);
    }

    #[test]
    fn test_from_value_fills_partial_fields() {
        let snapshot = Snapshot::from_value(json!({"timestamp": 1714564800000i64})).unwrap();
        assert_eq!(snapshot.current_session, 1);
        assert_eq!(snapshot.mode, Phase::Work);
        assert_eq!(snapshot.remaining_time, None);
        assert!(!snapshot.is_running);
        assert!(!snapshot.is_paused);
    }
}
