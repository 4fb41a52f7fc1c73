use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use shared::{
    domain::{MeetingState, TimerPhase, NO_SELECTION},
    error::CommandError,
};

use super::*;
use crate::clock::ManualClock;

fn fixed_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).single().expect("valid timestamp"),
    ))
}

fn controller_with_items(names: &[(&str, i64)]) -> MeetingController {
    let mut controller = MeetingController::new(fixed_clock());
    for (name, seconds) in names {
        controller.add_item(name, *seconds).expect("add item");
    }
    controller
}

#[test]
fn add_item_rejects_empty_name_and_zero_duration() {
    let mut controller = MeetingController::new(fixed_clock());
    assert!(matches!(
        controller.add_item("   ", 300),
        Err(CommandError::Validation(_))
    ));
    assert!(matches!(
        controller.add_item("Intro", 0),
        Err(CommandError::Validation(_))
    ));
    assert!(controller.state().agenda_items.is_empty());
}

#[test]
fn item_ids_are_monotonic_and_never_reused() {
    let mut controller = controller_with_items(&[("A", 60), ("B", 60)]);
    let first = controller.state().agenda_items[0].id;
    controller.remove_item(first).expect("remove");
    let new_id = controller.add_item("C", 60).expect("add");
    assert!(new_id.0 > controller.state().agenda_items[0].id.0);
    assert_ne!(new_id, first);
}

#[test]
fn used_seconds_counts_only_running_ticks() {
    let mut controller = controller_with_items(&[("Intro", 300)]);
    controller.select_item(0).expect("select");
    controller.start_agenda_timer().expect("start");
    for _ in 0..5 {
        controller.tick();
    }
    controller.pause_agenda_timer().expect("pause");
    for _ in 0..10 {
        controller.tick();
    }
    controller.start_agenda_timer().expect("resume");
    for _ in 0..3 {
        controller.tick();
    }
    assert_eq!(controller.state().agenda_items[0].used_seconds, 8);
    assert_eq!(controller.state().agenda_time_remaining, 292);
}

#[test]
fn remaining_equals_allocated_minus_used_after_every_transition() {
    let mut controller = controller_with_items(&[("Intro", 120)]);
    controller.select_item(0).expect("select");
    controller.start_agenda_timer().expect("start");
    for _ in 0..7 {
        controller.tick();
        let item = &controller.state().agenda_items[0];
        assert_eq!(
            controller.state().agenda_time_remaining,
            item.allocated_seconds - item.used_seconds
        );
    }
    controller.stop_agenda_timer().expect("stop");
    assert_eq!(controller.state().agenda_time_remaining, 113);
    controller.select_item(0).expect("reselect");
    assert_eq!(controller.state().agenda_time_remaining, 113);
}

#[test]
fn overtime_goes_negative_without_clamping() {
    let mut controller = controller_with_items(&[("Intro", 300)]);
    controller.select_item(0).expect("select");
    controller.start_agenda_timer().expect("start");
    for _ in 0..301 {
        controller.tick();
    }
    assert_eq!(controller.state().agenda_items[0].used_seconds, 301);
    assert_eq!(controller.state().agenda_time_remaining, -1);
    assert!(!controller.state().agenda_items[0].completed);
    controller.tick();
    assert_eq!(controller.state().agenda_time_remaining, -2);
}

#[test]
fn agenda_stop_preserves_progress_speaker_stop_resets() {
    let mut controller = controller_with_items(&[("Intro", 300)]);
    controller.select_item(0).expect("select");
    controller.start_agenda_timer().expect("start");
    controller.start_speaker_timer().expect("start speaker");
    for _ in 0..42 {
        controller.tick();
    }
    controller.stop_agenda_timer().expect("stop agenda");
    controller.stop_speaker_timer().expect("stop speaker");
    assert_eq!(controller.state().agenda_items[0].used_seconds, 42);
    assert_eq!(controller.state().speaker_time_elapsed, 0);
    assert_eq!(controller.state().agenda_timer, TimerPhase::Stopped);
    assert_eq!(controller.state().speaker_timer, TimerPhase::Stopped);
}

#[test]
fn start_agenda_timer_requires_selection() {
    let mut controller = controller_with_items(&[("Intro", 300)]);
    assert_eq!(
        controller.start_agenda_timer(),
        Err(CommandError::NoSelection)
    );
    assert_eq!(controller.state().agenda_timer, TimerPhase::Stopped);
}

#[test]
fn started_at_is_stamped_once() {
    let clock = fixed_clock();
    let mut controller = MeetingController::new(clock.clone());
    controller.add_item("Intro", 300).expect("add");
    controller.select_item(0).expect("select");
    controller.start_agenda_timer().expect("start");
    let first = controller.state().agenda_items[0].started_at;
    assert!(first.is_some());

    clock.advance(Duration::seconds(90));
    controller.pause_agenda_timer().expect("pause");
    controller.start_agenda_timer().expect("restart");
    assert_eq!(controller.state().agenda_items[0].started_at, first);
}

#[test]
fn restarting_a_running_timer_does_not_double_ticks() {
    let mut controller = controller_with_items(&[("Intro", 300)]);
    controller.select_item(0).expect("select");
    controller.start_agenda_timer().expect("start");
    controller.start_agenda_timer().expect("start again");
    for _ in 0..4 {
        controller.tick();
    }
    assert_eq!(controller.state().agenda_items[0].used_seconds, 4);
}

#[test]
fn advance_completes_current_and_preserves_partial_progress_on_return() {
    let mut controller = controller_with_items(&[("Intro", 300), ("Demo", 600)]);
    controller.select_item(1).expect("select demo");
    controller.start_agenda_timer().expect("start");
    for _ in 0..30 {
        controller.tick();
    }
    controller.select_item(0).expect("back to intro");
    controller.advance().expect("advance");

    let state = controller.state();
    assert!(state.agenda_items[0].completed);
    assert_eq!(state.current_agenda_index, 1);
    assert_eq!(state.agenda_items[1].used_seconds, 30);
    assert_eq!(state.agenda_time_remaining, 570);
}

#[test]
fn advance_past_last_item_is_an_error_and_changes_nothing() {
    let mut controller = controller_with_items(&[("Intro", 300)]);
    controller.select_item(0).expect("select");
    let before = controller.state().clone();
    assert_eq!(controller.advance(), Err(CommandError::NoMoreItems));
    assert_eq!(controller.state(), &before);
}

#[test]
fn advance_with_no_selection_picks_the_first_item() {
    let mut controller = controller_with_items(&[("Intro", 300)]);
    controller.advance().expect("advance");
    assert_eq!(controller.state().current_agenda_index, 0);
    assert!(!controller.state().agenda_items[0].completed);
}

#[test]
fn move_up_keeps_the_active_item_active() {
    let mut controller = controller_with_items(&[("A", 60), ("B", 60)]);
    controller.select_item(1).expect("select");
    let active = controller.state().agenda_items[1].id;
    controller.move_up(1).expect("move");
    assert_eq!(controller.state().current_agenda_index, 0);
    assert_eq!(controller.state().agenda_items[0].id, active);
}

#[test]
fn move_is_a_noop_at_sequence_ends() {
    let mut controller = controller_with_items(&[("A", 60), ("B", 60)]);
    let before = controller.state().clone();
    controller.move_up(0).expect("noop");
    controller.move_down(1).expect("noop");
    controller.move_up(7).expect("out of bounds");
    assert_eq!(controller.state(), &before);
}

#[test]
fn move_down_tracks_displaced_neighbour() {
    let mut controller = controller_with_items(&[("A", 60), ("B", 60), ("C", 60)]);
    controller.select_item(1).expect("select B");
    controller.move_down(0).expect("move A below B");
    // B moved up into slot 0; selection must follow it.
    assert_eq!(controller.state().current_agenda_index, 0);
    assert_eq!(controller.state().agenda_items[0].name, "B");
}

#[test]
fn removing_an_earlier_item_keeps_the_same_item_active() {
    let mut controller = controller_with_items(&[("A", 60), ("B", 60), ("C", 60)]);
    controller.select_item(1).expect("select B");
    let first = controller.state().agenda_items[0].id;
    controller.remove_item(first).expect("remove A");
    assert_eq!(controller.state().current_agenda_index, 0);
    assert_eq!(controller.state().agenda_items[0].name, "B");
}

#[test]
fn removing_the_active_item_clears_the_selection() {
    let mut controller = controller_with_items(&[("A", 60), ("B", 60)]);
    controller.select_item(0).expect("select");
    controller.start_agenda_timer().expect("start");
    let active = controller.state().agenda_items[0].id;
    controller.remove_item(active).expect("remove");
    assert_eq!(controller.state().current_agenda_index, NO_SELECTION);
    assert_eq!(controller.state().agenda_timer, TimerPhase::Stopped);
}

#[test]
fn removing_an_unknown_id_is_a_noop() {
    let mut controller = controller_with_items(&[("A", 60)]);
    let before = controller.state().clone();
    controller
        .remove_item(shared::domain::ItemId(999))
        .expect("noop");
    assert_eq!(controller.state(), &before);
}

#[test]
fn select_out_of_bounds_is_silently_ignored() {
    let mut controller = controller_with_items(&[("A", 60)]);
    let before = controller.state().clone();
    controller.select_item(5).expect("ignored");
    assert_eq!(controller.state(), &before);
}

#[test]
fn selecting_another_item_stops_a_running_timer_and_commits_progress() {
    let mut controller = controller_with_items(&[("A", 60), ("B", 120)]);
    controller.select_item(0).expect("select");
    controller.start_agenda_timer().expect("start");
    for _ in 0..10 {
        controller.tick();
    }
    controller.select_item(1).expect("switch");
    assert_eq!(controller.state().agenda_timer, TimerPhase::Stopped);
    assert_eq!(controller.state().agenda_items[0].used_seconds, 10);
    assert_eq!(controller.state().agenda_time_remaining, 120);
}

#[test]
fn meeting_window_rejects_inverted_bounds() {
    let mut controller = MeetingController::new(fixed_clock());
    let start = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).single().expect("ts");
    assert!(matches!(
        controller.set_meeting_window(start, start),
        Err(CommandError::Validation(_))
    ));
    assert!(controller.state().meeting_start.is_none());
}

#[test]
fn meeting_elapsed_recomputes_from_wall_clock_and_remaining_clamps() {
    let clock = fixed_clock();
    let mut controller = MeetingController::new(clock.clone());
    let start = clock.now();
    controller
        .set_meeting_window(start, start + Duration::seconds(3600))
        .expect("window");

    // A single tick after a long suspension catches up in one step.
    clock.advance(Duration::seconds(1800));
    controller.tick();
    assert_eq!(controller.state().meeting_elapsed_seconds, 1800);
    assert_eq!(controller.state().meeting_remaining_seconds(), Some(1800));

    clock.advance(Duration::seconds(1900));
    controller.tick();
    assert_eq!(controller.state().meeting_elapsed_seconds, 3700);
    assert_eq!(controller.state().meeting_remaining_seconds(), Some(0));
}

#[test]
fn tick_reports_whether_anything_changed() {
    let mut controller = controller_with_items(&[("A", 60)]);
    assert!(!controller.tick());
    controller.select_item(0).expect("select");
    controller.start_agenda_timer().expect("start");
    assert!(controller.tick());
    controller.pause_agenda_timer().expect("pause");
    assert!(!controller.tick());
}

#[test]
fn rehydration_restores_agenda_but_never_running_timers() {
    let mut live = controller_with_items(&[("A", 60), ("B", 120)]);
    live.select_item(0).expect("select");
    live.start_agenda_timer().expect("start");
    live.start_speaker_timer().expect("start speaker");
    for _ in 0..10 {
        live.tick();
    }

    let items = live.state().agenda_items.clone();
    let restored = MeetingController::rehydrate(fixed_clock(), items.clone(), None);
    assert_eq!(restored.state().agenda_items, items);
    assert_eq!(restored.state().agenda_timer, TimerPhase::Stopped);
    assert_eq!(restored.state().speaker_timer, TimerPhase::Stopped);
    assert_eq!(restored.state().current_agenda_index, NO_SELECTION);

    // Fresh ids must not collide with restored ones.
    let mut restored = restored;
    let new_id = restored.add_item("C", 60).expect("add");
    assert!(items.iter().all(|item| item.id != new_id));
}

#[test]
fn snapshot_round_trips_through_json() {
    let mut controller = controller_with_items(&[("Intro", 300), ("Demo", 600)]);
    controller.select_item(0).expect("select");
    controller.start_agenda_timer().expect("start");
    for _ in 0..15 {
        controller.tick();
    }

    let raw = serde_json::to_string(controller.state()).expect("serialize");
    let replica: MeetingState = serde_json::from_str(&raw).expect("deserialize");
    assert_eq!(&replica, controller.state());
}

#[test]
fn snapshot_decoding_tolerates_unknown_and_missing_fields() {
    let raw = r#"{
        "agenda_items": [{"id": 3, "name": "Intro", "allocated_seconds": 300, "color": "green"}],
        "speaker_timer": "running",
        "future_field": true
    }"#;
    let state: MeetingState = serde_json::from_str(raw).expect("tolerant decode");
    assert_eq!(state.current_agenda_index, NO_SELECTION);
    assert_eq!(state.agenda_items[0].used_seconds, 0);
    assert_eq!(state.speaker_timer, TimerPhase::Running);
    assert_eq!(state.next_item_id, 1);
}
