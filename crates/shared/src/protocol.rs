use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ItemId, MeetingState};

/// Facilitator commands accepted by the controller surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Command {
    AddItem {
        name: String,
        allocated_seconds: i64,
    },
    RemoveItem {
        id: ItemId,
    },
    MoveUp {
        index: usize,
    },
    MoveDown {
        index: usize,
    },
    SelectItem {
        index: usize,
    },
    Advance,
    StartAgendaTimer,
    PauseAgendaTimer,
    StopAgendaTimer,
    StartSpeakerTimer,
    PauseSpeakerTimer,
    StopSpeakerTimer,
    SetMeetingWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Events broadcast from the controller to viewers. Always a whole-state
/// snapshot: no diffs, no sequence numbers, latest snapshot wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum StateEvent {
    Snapshot { state: MeetingState },
}
