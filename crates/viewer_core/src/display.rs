//! Derived display values for the render contract.

use shared::domain::MeetingState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    Neutral,
    Warning,
    Danger,
}

/// Agenda countdown: last minute is a warning, overtime is danger.
pub fn agenda_status(remaining_seconds: i64) -> DisplayStatus {
    if remaining_seconds < 0 {
        DisplayStatus::Danger
    } else if remaining_seconds <= 60 {
        DisplayStatus::Warning
    } else {
        DisplayStatus::Neutral
    }
}

/// Speaker count-up: three minutes is a warning, five is danger.
pub fn speaker_status(elapsed_seconds: i64) -> DisplayStatus {
    if elapsed_seconds >= 300 {
        DisplayStatus::Danger
    } else if elapsed_seconds >= 180 {
        DisplayStatus::Warning
    } else {
        DisplayStatus::Neutral
    }
}

/// Meeting window: danger once the window is used up, warning in the last
/// five minutes. Neutral until a window is set.
pub fn meeting_status(state: &MeetingState) -> DisplayStatus {
    match state.meeting_remaining_seconds() {
        Some(0) => DisplayStatus::Danger,
        Some(remaining) if remaining < 300 => DisplayStatus::Warning,
        _ => DisplayStatus::Neutral,
    }
}

/// "MM:SS", with a leading minus for overtime values.
pub fn format_clock(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let seconds = seconds.abs();
    format!("{sign}{:02}:{:02}", seconds / 60, seconds % 60)
}
