use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use shared::{
    domain::{ItemId, MeetingState},
    error::ApiError,
    protocol::Command,
};
use viewer_core::{
    agenda_status, format_clock, meeting_status, speaker_status, DisplayStatus, Renderer,
    StageViewer,
};

#[derive(Parser, Debug)]
#[command(about = "Facilitator controls and stage display for the meeting companion")]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8443")]
    server_url: String,
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Watch the meeting as a read-only stage display.
    Stage {
        #[arg(long, default_value_t = 2)]
        poll_seconds: u64,
    },
    /// Append an agenda item; duration is whole minutes.
    Add {
        name: String,
        #[arg(long, default_value_t = 5)]
        minutes: i64,
    },
    /// Remove an agenda item by id.
    Remove { id: i64 },
    /// Move the item at the given index one slot earlier.
    MoveUp { index: usize },
    /// Move the item at the given index one slot later.
    MoveDown { index: usize },
    /// Select the agenda item at the given index for timing.
    Select { index: usize },
    /// Complete the current item and move to the next.
    Advance,
    StartAgenda,
    PauseAgenda,
    StopAgenda,
    StartSpeaker,
    PauseSpeaker,
    StopSpeaker,
    /// Set the meeting window; RFC 3339 timestamps.
    Window { start: String, end: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let command = match args.action {
        Action::Stage { poll_seconds } => {
            let viewer = Arc::new(StageViewer::new(
                args.server_url,
                Duration::from_secs(poll_seconds.max(1)),
                StageRenderer,
            ));
            return viewer.run().await;
        }
        Action::Add { name, minutes } => Command::AddItem {
            name,
            allocated_seconds: minutes * 60,
        },
        Action::Remove { id } => Command::RemoveItem { id: ItemId(id) },
        Action::MoveUp { index } => Command::MoveUp { index },
        Action::MoveDown { index } => Command::MoveDown { index },
        Action::Select { index } => Command::SelectItem { index },
        Action::Advance => Command::Advance,
        Action::StartAgenda => Command::StartAgendaTimer,
        Action::PauseAgenda => Command::PauseAgendaTimer,
        Action::StopAgenda => Command::StopAgendaTimer,
        Action::StartSpeaker => Command::StartSpeakerTimer,
        Action::PauseSpeaker => Command::PauseSpeakerTimer,
        Action::StopSpeaker => Command::StopSpeakerTimer,
        Action::Window { start, end } => Command::SetMeetingWindow {
            start: parse_timestamp(&start)?,
            end: parse_timestamp(&end)?,
        },
    };

    let state = send_command(&args.server_url, &command).await?;
    StageRenderer.render(&state);
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .with_context(|| format!("'{raw}' is not an RFC 3339 timestamp"))
}

async fn send_command(server_url: &str, command: &Command) -> Result<MeetingState> {
    let url = format!("{}/command", server_url.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(&url)
        .json(command)
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?;

    if response.status().is_success() {
        Ok(response.json().await?)
    } else {
        let error: ApiError = response.json().await?;
        Err(anyhow!("{:?}: {}", error.code, error.message))
    }
}

struct StageRenderer;

impl Renderer for StageRenderer {
    fn render(&self, state: &MeetingState) {
        println!("\x1B[2J\x1B[H-- agenda --");
        for (index, item) in state.agenda_items.iter().enumerate() {
            let marker = if item.completed {
                "x"
            } else if Some(index) == state.selected_index() {
                ">"
            } else {
                " "
            };
            println!(
                "{marker} [{}] {} ({})",
                item.id.0,
                item.name,
                format_clock(item.remaining_seconds())
            );
        }

        if let Some(item) = state.current_item() {
            println!(
                "\ncurrent: {} {} {}",
                item.name,
                format_clock(state.agenda_time_remaining),
                status_label(agenda_status(state.agenda_time_remaining)),
            );
        } else {
            println!("\ncurrent: none");
        }

        println!(
            "speaker: {} {}",
            format_clock(state.speaker_time_elapsed),
            status_label(speaker_status(state.speaker_time_elapsed)),
        );

        if let Some(remaining) = state.meeting_remaining_seconds() {
            println!(
                "meeting: {} left {}",
                format_clock(remaining),
                status_label(meeting_status(state)),
            );
        }
    }
}

fn status_label(status: DisplayStatus) -> &'static str {
    match status {
        DisplayStatus::Neutral => "",
        DisplayStatus::Warning => "(warning)",
        DisplayStatus::Danger => "(overtime)",
    }
}
