use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use meeting::{MeetingController, SystemClock};
use shared::{
    domain::MeetingState,
    error::{ApiError, CommandError, ErrorCode},
    protocol::{Command, StateEvent},
};
use storage::Storage;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info};
use transport::{BroadcastSink, FanoutPublisher, FileSnapshotStore};

mod config;

use config::load_settings;

#[derive(Clone)]
struct AppState {
    controller: Arc<Mutex<MeetingController>>,
    events: broadcast::Sender<StateEvent>,
    publisher: Arc<FanoutPublisher>,
    storage: Storage,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let storage = Storage::new(&settings.database_url).await.map_err(|error| {
        error!(
            database_url = %settings.database_url,
            %error,
            "failed to open SQLite database"
        );
        error
    })?;

    // Agenda and window survive restarts; timers always come back stopped.
    let items = storage.load_agenda().await?;
    let window = storage.load_window().await?;
    let controller = MeetingController::rehydrate(Arc::new(SystemClock), items, window);

    let (events, _) = broadcast::channel(256);
    let publisher = Arc::new(FanoutPublisher::new(vec![
        Arc::new(BroadcastSink::new(events.clone())) as Arc<dyn transport::SnapshotSink>,
        Arc::new(FileSnapshotStore::new(&settings.snapshot_path)),
    ]));

    let state = Arc::new(AppState {
        controller: Arc::new(Mutex::new(controller)),
        events,
        publisher,
        storage,
    });

    // Baseline snapshot so late-started viewers and the polling fallback
    // have something to read before the first mutation.
    publish_current(&state).await;
    spawn_tick_loop(state.clone());

    let app = build_router(state);
    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "meeting server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/state", get(current_state))
        .route("/command", post(apply_command))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

fn spawn_tick_loop(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            let snapshot = {
                let mut controller = state.controller.lock().await;
                controller.tick().then(|| controller.state().clone())
            };
            if let Some(snapshot) = snapshot {
                state.publisher.publish(&snapshot).await;
            }
        }
    });
}

async fn publish_current(state: &AppState) {
    let snapshot = { state.controller.lock().await.state().clone() };
    state.publisher.publish(&snapshot).await;
}

async fn healthz() -> &'static str {
    "ok"
}

async fn current_state(State(state): State<Arc<AppState>>) -> Json<MeetingState> {
    let snapshot = { state.controller.lock().await.state().clone() };
    Json(snapshot)
}

async fn apply_command(
    State(state): State<Arc<AppState>>,
    Json(command): Json<Command>,
) -> Result<Json<MeetingState>, (StatusCode, Json<ApiError>)> {
    let persist_window = matches!(command, Command::SetMeetingWindow { .. });
    let snapshot = {
        let mut controller = state.controller.lock().await;
        controller.apply(command).map_err(command_rejection)?;
        controller.state().clone()
    };

    // Persistence failures must not fail the command: the authoritative
    // state already changed, the worst case is a stale reload later.
    if let Err(error) = state.storage.save_agenda(&snapshot.agenda_items).await {
        error!(%error, "failed to persist agenda");
    }
    if persist_window {
        if let (Some(start), Some(end)) = (snapshot.meeting_start, snapshot.meeting_end) {
            if let Err(error) = state.storage.save_window(start, end).await {
                error!(%error, "failed to persist meeting window");
            }
        }
    }

    state.publisher.publish(&snapshot).await;
    Ok(Json(snapshot))
}

fn command_rejection(error: CommandError) -> (StatusCode, Json<ApiError>) {
    let status = match error.code() {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::NoSelection | ErrorCode::NoMoreItems => StatusCode::CONFLICT,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiError::from(error)))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: Arc<AppState>, socket: axum::extract::ws::WebSocket) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading the current state so no snapshot published in
    // between is lost.
    let mut events_rx = state.events.subscribe();
    let snapshot = { state.controller.lock().await.state().clone() };
    if let Ok(text) = serde_json::to_string(&StateEvent::Snapshot { state: snapshot }) {
        if sender.send(Message::Text(text)).await.is_err() {
            return;
        }
    }

    let send_task = tokio::spawn(async move {
        loop {
            let event = match events_rx.recv().await {
                Ok(event) => event,
                // A lagged receiver only skipped stale snapshots; the next
                // one it gets is complete on its own.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Viewers never talk back; drain until the socket closes.
    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}
