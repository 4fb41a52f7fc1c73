use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(ItemId);

/// Sentinel for `MeetingState::current_agenda_index` when nothing is selected.
pub const NO_SELECTION: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// A named, time-boxed segment of the meeting.
///
/// `used_seconds` may exceed `allocated_seconds`: overtime is tracked, never
/// clamped. `started_at` is an audit field only; tick accounting never reads
/// it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgendaItem {
    pub id: ItemId,
    pub name: String,
    pub allocated_seconds: i64,
    #[serde(default)]
    pub used_seconds: i64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl AgendaItem {
    pub fn remaining_seconds(&self) -> i64 {
        self.allocated_seconds - self.used_seconds
    }
}

/// The root aggregate shared between the facilitator controller and all
/// stage viewers. Serialized whole as the only transport unit; unknown
/// fields are ignored and missing ones defaulted so old and new surfaces
/// can coexist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingState {
    #[serde(default)]
    pub agenda_items: Vec<AgendaItem>,
    #[serde(default = "default_no_selection")]
    pub current_agenda_index: i64,
    #[serde(default)]
    pub agenda_timer: TimerPhase,
    #[serde(default)]
    pub agenda_time_remaining: i64,
    #[serde(default)]
    pub speaker_timer: TimerPhase,
    #[serde(default)]
    pub speaker_time_elapsed: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub meeting_elapsed_seconds: i64,
    #[serde(default = "default_next_item_id")]
    pub next_item_id: i64,
}

fn default_no_selection() -> i64 {
    NO_SELECTION
}

fn default_next_item_id() -> i64 {
    1
}

impl Default for MeetingState {
    fn default() -> Self {
        Self {
            agenda_items: Vec::new(),
            current_agenda_index: NO_SELECTION,
            agenda_timer: TimerPhase::Stopped,
            agenda_time_remaining: 0,
            speaker_timer: TimerPhase::Stopped,
            speaker_time_elapsed: 0,
            meeting_start: None,
            meeting_end: None,
            meeting_elapsed_seconds: 0,
            next_item_id: 1,
        }
    }
}

impl MeetingState {
    pub fn selected_index(&self) -> Option<usize> {
        if self.current_agenda_index < 0 {
            return None;
        }
        let index = self.current_agenda_index as usize;
        (index < self.agenda_items.len()).then_some(index)
    }

    pub fn current_item(&self) -> Option<&AgendaItem> {
        self.selected_index().map(|i| &self.agenda_items[i])
    }

    pub fn current_item_mut(&mut self) -> Option<&mut AgendaItem> {
        let index = self.selected_index()?;
        Some(&mut self.agenda_items[index])
    }

    pub fn allocate_item_id(&mut self) -> ItemId {
        let id = ItemId(self.next_item_id);
        self.next_item_id += 1;
        id
    }

    /// Seconds left in the meeting window, clamped to zero. `None` until a
    /// window has been set.
    pub fn meeting_remaining_seconds(&self) -> Option<i64> {
        let start = self.meeting_start?;
        let end = self.meeting_end?;
        let total = (end - start).num_seconds();
        Some((total - self.meeting_elapsed_seconds).max(0))
    }
}
