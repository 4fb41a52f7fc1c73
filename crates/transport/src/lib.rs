use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use shared::{domain::MeetingState, protocol::StateEvent};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("snapshot io failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One publish channel for whole-state snapshots. Delivery is best-effort,
/// at-least-once, with no acknowledgment; viewers treat the latest accepted
/// snapshot as authoritative.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn publish(&self, state: &MeetingState) -> Result<(), TransportError>;
}

/// In-process push channel. The server's WebSocket fan-out subscribes to the
/// same sender, so every published snapshot reaches all connected viewers.
pub struct BroadcastSink {
    tx: broadcast::Sender<StateEvent>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<StateEvent>) -> Self {
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl SnapshotSink for BroadcastSink {
    async fn publish(&self, state: &MeetingState) -> Result<(), TransportError> {
        // No receivers is not a failure; viewers may simply not be attached.
        let _ = self.tx.send(StateEvent::Snapshot {
            state: state.clone(),
        });
        Ok(())
    }
}

/// Shared-storage channel: the snapshot is written to a single file that
/// viewers (and the polling fallback) re-read. Writes go through a temp file
/// and an atomic rename, so a crash mid-write never corrupts the last valid
/// snapshot.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last persisted snapshot, or `None` if nothing has been written yet.
    pub fn load(&self) -> Result<Option<MeetingState>, TransportError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn write_atomically(&self, payload: &[u8]) -> Result<(), TransportError> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let mut file = tempfile::NamedTempFile::new_in(parent)?;
        file.write_all(payload)?;
        file.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotSink for FileSnapshotStore {
    async fn publish(&self, state: &MeetingState) -> Result<(), TransportError> {
        let payload = serde_json::to_vec(state)?;
        self.write_atomically(&payload)
    }
}

/// Publishes each snapshot on every configured channel. Channel redundancy
/// is deliberate: none of them is guaranteed in the hosting environment, so
/// one failing sink is logged and skipped while the rest still deliver.
pub struct FanoutPublisher {
    sinks: Vec<Arc<dyn SnapshotSink>>,
}

impl FanoutPublisher {
    pub fn new(sinks: Vec<Arc<dyn SnapshotSink>>) -> Self {
        Self { sinks }
    }

    pub async fn publish(&self, state: &MeetingState) {
        for sink in &self.sinks {
            if let Err(error) = sink.publish(state).await {
                warn!(%error, "snapshot publish failed on one channel");
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
