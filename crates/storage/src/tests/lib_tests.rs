use chrono::{Duration, TimeZone, Utc};
use shared::domain::{AgendaItem, ItemId};

use super::*;

async fn memory_storage() -> Storage {
    Storage::new("sqlite::memory:").await.expect("storage")
}

fn sample_items() -> Vec<AgendaItem> {
    vec![
        AgendaItem {
            id: ItemId(1),
            name: "Intro".into(),
            allocated_seconds: 300,
            used_seconds: 45,
            completed: true,
            started_at: Some(Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).single().expect("ts")),
        },
        AgendaItem {
            id: ItemId(2),
            name: "Demo".into(),
            allocated_seconds: 600,
            used_seconds: 0,
            completed: false,
            started_at: None,
        },
    ]
}

#[tokio::test]
async fn health_check_succeeds_on_fresh_database() {
    let storage = memory_storage().await;
    storage.health_check().await.expect("healthy");
}

#[tokio::test]
async fn agenda_round_trips_in_order() {
    let storage = memory_storage().await;
    let items = sample_items();
    storage.save_agenda(&items).await.expect("save");

    let loaded = storage.load_agenda().await.expect("load");
    assert_eq!(loaded, items);
}

#[tokio::test]
async fn save_agenda_replaces_previous_contents() {
    let storage = memory_storage().await;
    storage.save_agenda(&sample_items()).await.expect("save");

    let shorter = vec![sample_items().remove(1)];
    storage.save_agenda(&shorter).await.expect("resave");

    let loaded = storage.load_agenda().await.expect("load");
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].name, "Demo");
}

#[tokio::test]
async fn window_round_trips_and_upserts() {
    let storage = memory_storage().await;
    assert!(storage.load_window().await.expect("empty").is_none());

    let start = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).single().expect("ts");
    let end = start + Duration::hours(1);
    storage.save_window(start, end).await.expect("save");
    assert_eq!(storage.load_window().await.expect("load"), Some((start, end)));

    let later_end = end + Duration::minutes(30);
    storage.save_window(start, later_end).await.expect("resave");
    assert_eq!(
        storage.load_window().await.expect("load"),
        Some((start, later_end))
    );
}
