use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use shared::{domain::MeetingState, protocol::StateEvent};
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};

mod display;

pub use display::{
    agenda_status, format_clock, meeting_status, speaker_status, DisplayStatus,
};

/// Renders an accepted snapshot into whatever the surface shows. Stateless
/// given the snapshot; invoked after every accepted state change.
pub trait Renderer: Send + Sync {
    fn render(&self, state: &MeetingState);
}

/// The viewer's local copy of the meeting state.
///
/// Snapshots replace the whole aggregate; merging field-by-field would let
/// stale nested data (for example a removed agenda item) linger. Malformed
/// payloads are dropped and the last good replica retained.
#[derive(Default)]
pub struct ViewerReplica {
    state: MeetingState,
}

impl ViewerReplica {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &MeetingState {
        &self.state
    }

    pub fn accept(&mut self, state: MeetingState) {
        self.state = state;
    }

    /// Decodes a transport frame and applies it. Returns `false` (keeping
    /// the current replica) when the payload does not parse.
    pub fn accept_frame(&mut self, raw: &str) -> bool {
        match serde_json::from_str::<StateEvent>(raw) {
            Ok(StateEvent::Snapshot { state }) => {
                self.accept(state);
                true
            }
            Err(error) => {
                warn!(%error, "dropping malformed snapshot frame");
                false
            }
        }
    }
}

/// Read-only participant display client.
///
/// Receives pushed snapshots over the server's WebSocket and additionally
/// polls `GET /state` on a fixed period in case push delivery is missed.
/// Both paths go through the same accept-and-render step; it never sends
/// a mutation.
pub struct StageViewer<R: Renderer> {
    server_url: String,
    poll_interval: Duration,
    renderer: R,
    replica: Mutex<ViewerReplica>,
    http: reqwest::Client,
}

impl<R: Renderer> StageViewer<R> {
    pub fn new(server_url: impl Into<String>, poll_interval: Duration, renderer: R) -> Self {
        Self {
            server_url: server_url.into(),
            poll_interval,
            renderer,
            replica: Mutex::new(ViewerReplica::new()),
            http: reqwest::Client::new(),
        }
    }

    pub async fn current_state(&self) -> MeetingState {
        self.replica.lock().await.state().clone()
    }

    /// Runs the push subscription and the polling fallback until the process
    /// is stopped. A lost WebSocket degrades to polling-only; the worst case
    /// is a display that lags one poll period behind.
    pub async fn run(self: Arc<Self>) -> Result<()>
    where
        R: 'static,
    {
        let ws = Arc::clone(&self);
        tokio::spawn(async move {
            if let Err(error) = ws.subscribe_push().await {
                warn!(%error, "websocket subscription ended; relying on polling");
            }
        });

        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            if let Err(error) = self.poll_once().await {
                warn!(%error, "state poll failed; keeping last good replica");
            }
        }
    }

    async fn subscribe_push(&self) -> Result<()> {
        let ws_url = ws_url(&self.server_url)?;
        let (ws_stream, _) = connect_async(&ws_url)
            .await
            .with_context(|| format!("failed to connect websocket: {ws_url}"))?;
        info!(%ws_url, "subscribed to state broadcast");
        let (_, mut ws_reader) = ws_stream.split();

        while let Some(msg) = ws_reader.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    self.accept_and_render_frame(&text).await;
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(error) => {
                    warn!(%error, "websocket receive failed");
                    break;
                }
            }
        }
        Ok(())
    }

    /// One round of the polling fallback: re-read the latest snapshot.
    pub async fn poll_once(&self) -> Result<()> {
        let url = format!("{}/state", self.server_url.trim_end_matches('/'));
        let state: MeetingState = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        self.accept_and_render(state).await;
        Ok(())
    }

    async fn accept_and_render_frame(&self, raw: &str) {
        let rendered = {
            let mut replica = self.replica.lock().await;
            replica.accept_frame(raw).then(|| replica.state().clone())
        };
        if let Some(state) = rendered {
            self.renderer.render(&state);
        }
    }

    async fn accept_and_render(&self, state: MeetingState) {
        {
            let mut replica = self.replica.lock().await;
            replica.accept(state.clone());
        }
        self.renderer.render(&state);
    }
}

fn ws_url(server_url: &str) -> Result<String> {
    let base = if let Some(rest) = server_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = server_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(anyhow!("server_url must start with http:// or https://"));
    };
    Ok(format!("{}/ws", base.trim_end_matches('/')))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
