use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    domain::{AgendaItem, ItemId, MeetingState, TimerPhase, NO_SELECTION},
    error::CommandError,
    protocol::Command,
};

use crate::clock::Clock;

/// Exclusive owner of the authoritative `MeetingState`.
///
/// Every mutation goes through a command handler or `tick`; the caller is
/// responsible for publishing the snapshot after each successful mutation.
/// Failed commands leave the state untouched.
pub struct MeetingController {
    state: MeetingState,
    clock: Arc<dyn Clock>,
}

impl MeetingController {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: MeetingState::default(),
            clock,
        }
    }

    /// Restore persisted agenda items and meeting window. Timers always come
    /// back up stopped: a reload must never resume into a running tick.
    pub fn rehydrate(
        clock: Arc<dyn Clock>,
        items: Vec<AgendaItem>,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Self {
        let mut state = MeetingState::default();
        state.next_item_id = items.iter().map(|item| item.id.0 + 1).max().unwrap_or(1);
        state.agenda_items = items;
        if let Some((start, end)) = window {
            state.meeting_start = Some(start);
            state.meeting_end = Some(end);
        }
        Self { state, clock }
    }

    pub fn state(&self) -> &MeetingState {
        &self.state
    }

    pub fn apply(&mut self, command: Command) -> Result<(), CommandError> {
        match command {
            Command::AddItem {
                name,
                allocated_seconds,
            } => self.add_item(&name, allocated_seconds).map(|_| ()),
            Command::RemoveItem { id } => self.remove_item(id),
            Command::MoveUp { index } => self.move_up(index),
            Command::MoveDown { index } => self.move_down(index),
            Command::SelectItem { index } => self.select_item(index),
            Command::Advance => self.advance(),
            Command::StartAgendaTimer => self.start_agenda_timer(),
            Command::PauseAgendaTimer => self.pause_agenda_timer(),
            Command::StopAgendaTimer => self.stop_agenda_timer(),
            Command::StartSpeakerTimer => self.start_speaker_timer(),
            Command::PauseSpeakerTimer => self.pause_speaker_timer(),
            Command::StopSpeakerTimer => self.stop_speaker_timer(),
            Command::SetMeetingWindow { start, end } => self.set_meeting_window(start, end),
        }
    }

    pub fn add_item(&mut self, name: &str, allocated_seconds: i64) -> Result<ItemId, CommandError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CommandError::Validation(
                "agenda item name cannot be empty".into(),
            ));
        }
        if allocated_seconds < 1 {
            return Err(CommandError::Validation(
                "allocated duration must be at least one second".into(),
            ));
        }
        let id = self.state.allocate_item_id();
        self.state.agenda_items.push(AgendaItem {
            id,
            name: name.to_string(),
            allocated_seconds,
            used_seconds: 0,
            completed: false,
            started_at: None,
        });
        Ok(id)
    }

    /// Removes the item with the given id; absent ids are a no-op. The active
    /// item is tracked by identity across the removal: deleting an earlier
    /// item shifts the index so the same item stays selected, and deleting
    /// the active item itself clears the selection and stops its timer.
    pub fn remove_item(&mut self, id: ItemId) -> Result<(), CommandError> {
        let Some(removed) = self.state.agenda_items.iter().position(|item| item.id == id) else {
            return Ok(());
        };
        let active_id = self.state.current_item().map(|item| item.id);
        self.state.agenda_items.remove(removed);

        match active_id {
            Some(active_id) if active_id == id => {
                self.state.current_agenda_index = NO_SELECTION;
                self.state.agenda_timer = TimerPhase::Stopped;
                self.state.agenda_time_remaining = 0;
            }
            Some(active_id) => {
                if let Some(index) = self
                    .state
                    .agenda_items
                    .iter()
                    .position(|item| item.id == active_id)
                {
                    self.state.current_agenda_index = index as i64;
                }
            }
            None => {}
        }
        Ok(())
    }

    pub fn move_up(&mut self, index: usize) -> Result<(), CommandError> {
        if index == 0 || index >= self.state.agenda_items.len() {
            return Ok(());
        }
        self.swap_items(index - 1, index);
        Ok(())
    }

    pub fn move_down(&mut self, index: usize) -> Result<(), CommandError> {
        if index + 1 >= self.state.agenda_items.len() {
            return Ok(());
        }
        self.swap_items(index, index + 1);
        Ok(())
    }

    fn swap_items(&mut self, a: usize, b: usize) {
        self.state.agenda_items.swap(a, b);
        // The selection follows the item, not the slot.
        if self.state.current_agenda_index == a as i64 {
            self.state.current_agenda_index = b as i64;
        } else if self.state.current_agenda_index == b as i64 {
            self.state.current_agenda_index = a as i64;
        }
    }

    /// Out-of-bounds indices are silently ignored. A running timer on the
    /// previous item is stopped first; its `used_seconds` stay committed, so
    /// re-selecting a partially used item resumes where it left off.
    pub fn select_item(&mut self, index: usize) -> Result<(), CommandError> {
        if index >= self.state.agenda_items.len() {
            return Ok(());
        }
        self.state.agenda_timer = TimerPhase::Stopped;
        self.state.current_agenda_index = index as i64;
        self.state.agenda_time_remaining = self.state.agenda_items[index].remaining_seconds();
        Ok(())
    }

    /// Completes the current item and selects the next. At the end of the
    /// agenda nothing changes and `NoMoreItems` is surfaced to the caller.
    pub fn advance(&mut self) -> Result<(), CommandError> {
        let next = match self.state.selected_index() {
            Some(index) => index + 1,
            None => 0,
        };
        if next >= self.state.agenda_items.len() {
            return Err(CommandError::NoMoreItems);
        }
        if let Some(item) = self.state.current_item_mut() {
            item.completed = true;
        }
        self.select_item(next)
    }

    pub fn start_agenda_timer(&mut self) -> Result<(), CommandError> {
        let now = self.clock.now();
        let Some(item) = self.state.current_item_mut() else {
            return Err(CommandError::NoSelection);
        };
        // First start stamps the audit field; later starts keep it.
        if item.started_at.is_none() {
            item.started_at = Some(now);
        }
        // Idempotent when already running: there is a single logical tick
        // source, so re-starting must not double the cadence.
        self.state.agenda_timer = TimerPhase::Running;
        Ok(())
    }

    pub fn pause_agenda_timer(&mut self) -> Result<(), CommandError> {
        if self.state.agenda_timer == TimerPhase::Running {
            self.state.agenda_timer = TimerPhase::Paused;
        }
        Ok(())
    }

    /// Stop keeps the item's accumulated `used_seconds`; only the phase and
    /// the redundant remaining field are reset.
    pub fn stop_agenda_timer(&mut self) -> Result<(), CommandError> {
        self.state.agenda_timer = TimerPhase::Stopped;
        if let Some(item) = self.state.current_item() {
            self.state.agenda_time_remaining = item.remaining_seconds();
        }
        Ok(())
    }

    pub fn start_speaker_timer(&mut self) -> Result<(), CommandError> {
        self.state.speaker_timer = TimerPhase::Running;
        Ok(())
    }

    pub fn pause_speaker_timer(&mut self) -> Result<(), CommandError> {
        if self.state.speaker_timer == TimerPhase::Running {
            self.state.speaker_timer = TimerPhase::Paused;
        }
        Ok(())
    }

    /// Unlike the agenda timer, stopping the speaker timer resets the count:
    /// every speaker starts from zero.
    pub fn stop_speaker_timer(&mut self) -> Result<(), CommandError> {
        self.state.speaker_timer = TimerPhase::Stopped;
        self.state.speaker_time_elapsed = 0;
        Ok(())
    }

    pub fn set_meeting_window(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), CommandError> {
        if end <= start {
            return Err(CommandError::Validation(
                "meeting end must be after meeting start".into(),
            ));
        }
        self.state.meeting_start = Some(start);
        self.state.meeting_end = Some(end);
        self.state.meeting_elapsed_seconds = 0;
        Ok(())
    }

    /// One-second cadence entry point for all three timers. Returns whether
    /// anything changed, so the caller knows to republish the snapshot.
    pub fn tick(&mut self) -> bool {
        let mut changed = false;

        if self.state.agenda_timer == TimerPhase::Running {
            if let Some(item) = self.state.current_item_mut() {
                item.used_seconds += 1;
                // Continues past zero into negative remaining: overtime is
                // tracked, not clamped.
                let remaining = item.remaining_seconds();
                self.state.agenda_time_remaining = remaining;
                changed = true;
            }
        }

        if self.state.speaker_timer == TimerPhase::Running {
            self.state.speaker_time_elapsed += 1;
            changed = true;
        }

        // Meeting elapsed time is recomputed from the wall clock rather than
        // accumulated, so missed ticks self-correct.
        if let Some(start) = self.state.meeting_start {
            let elapsed = (self.clock.now() - start).num_seconds().max(0);
            if elapsed != self.state.meeting_elapsed_seconds {
                self.state.meeting_elapsed_seconds = elapsed;
                changed = true;
            }
        }

        changed
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
