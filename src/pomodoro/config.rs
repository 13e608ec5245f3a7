//! Widget field data.
//!
//! The overlay host hands the widget a flat key/value object once at load.
//! Every key is optional and an absent *or falsy* value (0, negative, empty
//! string) falls back to the documented default, so accessors are the only
//! way the rest of the crate reads configuration. Values of the wrong type
//! are decoded leniently (`"25"` is 25) or dropped with a warning.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::phase::Phase;

pub const DEFAULT_WORK_MINUTES: f64 = 25.0;
pub const DEFAULT_SHORT_BREAK_MINUTES: f64 = 5.0;
pub const DEFAULT_LONG_BREAK_MINUTES: f64 = 15.0;
pub const DEFAULT_SESSIONS_FOR_LONG_BREAK: u32 = 4;
pub const DEFAULT_TOTAL_SESSIONS: u32 = 6;
/// Upper bound on any phase length (one year).
pub const MAX_PHASE_MINUTES: f64 = 365.0 * 24.0 * 60.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read field data {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse field data {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroConfig {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub work_duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub short_break_duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub long_break_duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub sessions_for_long_break: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub total_sessions: Option<u32>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub work_title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub short_break_title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub long_break_title: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub start_command: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pause_command: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reset_command: Option<String>,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub enable_sound: Option<bool>,

    // Presentation toggles consumed by the render sinks.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub show_titles: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub show_session_box: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub show_countdown: Option<bool>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub timer_scale: Option<f64>,
}

impl PomodoroConfig {
    /// Load field data from a JSON file. Unknown keys (colors, fonts) are ignored.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Configured length of `phase`, in whole seconds.
    pub fn duration_secs(&self, phase: Phase) -> u64 {
        let minutes = match phase {
            Phase::Work => positive_or(self.work_duration, DEFAULT_WORK_MINUTES),
            Phase::ShortBreak => positive_or(self.short_break_duration, DEFAULT_SHORT_BREAK_MINUTES),
            Phase::LongBreak => positive_or(self.long_break_duration, DEFAULT_LONG_BREAK_MINUTES),
        };
        (minutes.min(MAX_PHASE_MINUTES) * 60.0).floor() as u64
    }

    pub fn title(&self, phase: Phase) -> &str {
        match phase {
            Phase::Work => text_or(&self.work_title, "FOCUS"),
            Phase::ShortBreak => text_or(&self.short_break_title, "SHORT BREAK"),
            Phase::LongBreak => text_or(&self.long_break_title, "LONG BREAK"),
        }
    }

    pub fn sessions_for_long_break(&self) -> u32 {
        count_or(self.sessions_for_long_break, DEFAULT_SESSIONS_FOR_LONG_BREAK)
    }

    pub fn total_sessions(&self) -> u32 {
        count_or(self.total_sessions, DEFAULT_TOTAL_SESSIONS)
    }

    pub fn start_command(&self) -> &str {
        text_or(&self.start_command, "!pomodoro start")
    }

    pub fn pause_command(&self) -> &str {
        text_or(&self.pause_command, "!pomodoro pause")
    }

    pub fn reset_command(&self) -> &str {
        text_or(&self.reset_command, "!pomodoro reset")
    }

    pub fn enable_sound(&self) -> bool {
        self.enable_sound.unwrap_or(false)
    }

    pub fn show_titles(&self) -> bool {
        self.show_titles.unwrap_or(true)
    }

    pub fn show_session_box(&self) -> bool {
        self.show_session_box.unwrap_or(true)
    }

    pub fn show_countdown(&self) -> bool {
        self.show_countdown.unwrap_or(true)
    }

    /// Overlay scale factor (1.0 = 100%).
    pub fn scale(&self) -> f64 {
        positive_or(self.timer_scale, 100.0) / 100.0
    }
}

fn lenient<'de, D, T>(
    deserializer: D,
    expected: &str,
    convert: impl FnOnce(&Value) -> Option<T>,
) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    let converted = convert(&value);
    if converted.is_none() {
        warn!(%value, "Ignoring field data value, expected {}", expected);
    }
    Ok(converted)
}

fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    lenient(deserializer, "a number", number)
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    lenient(deserializer, "a whole number", |value| {
        number(value)
            .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= f64::from(u32::MAX))
            .map(|n| n as u32)
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    lenient(deserializer, "true or false", |value| match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    lenient(deserializer, "text", |value| match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn positive_or(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => default,
    }
}

fn count_or(value: Option<u32>, default: u32) -> u32 {
    match value {
        Some(v) if v > 0 => v,
        _ => default,
    }
}

fn text_or<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
    match value.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_absent() {
        let config = PomodoroConfig::default();
        assert_eq!(config.duration_secs(Phase::Work), 25 * 60);
        assert_eq!(config.duration_secs(Phase::ShortBreak), 5 * 60);
        assert_eq!(config.duration_secs(Phase::LongBreak), 15 * 60);
        assert_eq!(config.sessions_for_long_break(), 4);
        assert_eq!(config.total_sessions(), 6);
        assert_eq!(config.title(Phase::Work), "FOCUS");
        assert_eq!(config.title(Phase::ShortBreak), "SHORT BREAK");
        assert_eq!(config.title(Phase::LongBreak), "LONG BREAK");
        assert_eq!(config.start_command(), "!pomodoro start");
        assert_eq!(config.pause_command(), "!pomodoro pause");
        assert_eq!(config.reset_command(), "!pomodoro reset");
        assert!(!config.enable_sound());
        assert!(config.show_countdown());
    }

    #[test]
    fn test_falsy_values_fall_back_to_defaults() {
        let config = PomodoroConfig::from_json(
            r#"{"workDuration": 0, "totalSessions": 0, "workTitle": "", "startCommand": ""}"#,
        )
        .unwrap();
        assert_eq!(config.duration_secs(Phase::Work), 25 * 60);
        assert_eq!(config.total_sessions(), 6);
        assert_eq!(config.title(Phase::Work), "FOCUS");
        assert_eq!(config.start_command(), "!pomodoro start");
    }

    #[test]
    fn test_fractional_minutes_floor_to_seconds() {
        let config =
            PomodoroConfig::from_json(r#"{"workDuration": 0.5, "shortBreakDuration": 0.01}"#)
                .unwrap();
        assert_eq!(config.duration_secs(Phase::Work), 30);
        assert_eq!(config.duration_secs(Phase::ShortBreak), 0);
    }

    #[test]
    fn test_load_ignores_styling_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r##"{{"workDuration": 50, "cardBackgroundColor": "#fff", "enableSound": true, "timerScale": 150}}"##
        )
        .unwrap();
        let config = PomodoroConfig::load(file.path()).unwrap();
        assert_eq!(config.duration_secs(Phase::Work), 50 * 60);
        assert!(config.enable_sound());
        assert!((config.scale() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_loosely_typed_values_are_decoded() {
        let config = PomodoroConfig::from_json(
            r#"{"workDuration": "25", "shortBreakDuration": " 2.5 ", "totalSessions": 6.0,
                "sessionsForLongBreak": "3", "enableSound": "true", "showTitles": "FALSE",
                "timerScale": "150", "workTitle": 42}"#,
        )
        .unwrap();
        assert_eq!(config.duration_secs(Phase::Work), 25 * 60);
        assert_eq!(config.duration_secs(Phase::ShortBreak), 150);
        assert_eq!(config.total_sessions(), 6);
        assert_eq!(config.sessions_for_long_break(), 3);
        assert!(config.enable_sound());
        assert!(!config.show_titles());
        assert!((config.scale() - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.title(Phase::Work), "42");
    }

    #[test]
    fn test_unusable_values_fall_back_to_defaults() {
        let config = PomodoroConfig::from_json(
            r#"{"workDuration": [1], "totalSessions": 4.5, "sessionsForLongBreak": -2,
                "enableSound": "loud", "timerScale": {"x": 1}, "startCommand": false,
                "longBreakDuration": null}"#,
        )
        .unwrap();
        assert_eq!(config.duration_secs(Phase::Work), 25 * 60);
        assert_eq!(config.duration_secs(Phase::LongBreak), 15 * 60);
        assert_eq!(config.total_sessions(), 6);
        assert_eq!(config.sessions_for_long_break(), 4);
        assert!(!config.enable_sound());
        assert!((config.scale() - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.start_command(), "!pomodoro start");
    }

    #[test]
    fn test_phase_length_is_capped() {
        let config = PomodoroConfig::from_json(r#"{"workDuration": 1e300}"#).unwrap();
        assert_eq!(
            config.duration_secs(Phase::Work),
            (MAX_PHASE_MINUTES * 60.0) as u64
        );
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = PomodoroConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
