use serde::Deserialize;

use crate::pomodoro::PomodoroConfig;

/// Everything that can change the timer from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Reset,
    ForceCompleteWork,
    ForceCompleteBreak,
    AdvanceSession,
}

/// Event envelope as delivered by the overlay, keyed by `listener`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "listener")]
pub enum InboundEvent {
    /// A chat message.
    #[serde(rename = "message")]
    Message { event: MessageEvent },
    /// A button on the widget's settings panel.
    #[serde(rename = "widget-button")]
    WidgetButton { event: ButtonEvent },
    /// Start/pause/reset clicked on the overlay itself.
    #[serde(rename = "control")]
    Control { action: ControlAction },
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEvent {
    pub data: MessageData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageData {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ButtonEvent {
    pub field: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Start,
    Pause,
    Reset,
}

impl InboundEvent {
    /// The command this event asks for, if any. Unrelated chat and unknown
    /// buttons map to `None`.
    pub fn command(&self, config: &PomodoroConfig) -> Option<Command> {
        match self {
            InboundEvent::Message { event } => chat_command(&event.data.text, config),
            InboundEvent::WidgetButton { event } => match event.field.as_str() {
                "testWorkComplete" => Some(Command::ForceCompleteWork),
                "testBreakComplete" => Some(Command::ForceCompleteBreak),
                "testSessionChange" => Some(Command::AdvanceSession),
                _ => None,
            },
            InboundEvent::Control { action } => Some(match action {
                ControlAction::Start => Command::Start,
                ControlAction::Pause => Command::Pause,
                ControlAction::Reset => Command::Reset,
            }),
        }
    }
}

/// Match chat text against the configured commands, ignoring case and
/// surrounding whitespace.
pub fn chat_command(text: &str, config: &PomodoroConfig) -> Option<Command> {
    let message = text.trim().to_lowercase();
    if message == config.start_command().to_lowercase() {
        Some(Command::Start)
    } else if message == config.pause_command().to_lowercase() {
        Some(Command::Pause)
    } else if message == config.reset_command().to_lowercase() {
        Some(Command::Reset)
    } else {
        None
    }
}
