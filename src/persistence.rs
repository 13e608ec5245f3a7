//! Snapshot I/O against the host store. Nothing here is allowed to fail the
//! caller: a store that cannot be read means "start fresh", a store that
//! cannot be written means "skip this save".

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::pomodoro::Snapshot;
use crate::store::{SharedStore, TIMER_STATE_KEY};

/// Read the last snapshot, if there is a usable one.
pub async fn load_snapshot(store: &SharedStore) -> Option<Snapshot> {
    let value = match store.get(TIMER_STATE_KEY).await {
        Ok(Some(value)) => value,
        Ok(None) => {
            info!("No saved timer state found, starting fresh");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "Failed to load timer state, starting fresh");
            return None;
        }
    };

    match Snapshot::from_value(value) {
        Some(snapshot) => {
            debug!(?snapshot, "Loaded timer snapshot");
            Some(snapshot)
        }
        None => {
            warn!("Saved timer state is malformed, starting fresh");
            None
        }
    }
}

/// Fire-and-forget save handle. Snapshots are written in the order they were
/// queued by a single background task, so a slow write never holds up the
/// countdown and an older snapshot never lands after a newer one.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    tx: mpsc::UnboundedSender<Snapshot>,
}

impl SnapshotWriter {
    pub fn spawn(store: SharedStore) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Snapshot>();
        let handle = tokio::spawn(async move {
            while let Some(snapshot) = rx.recv().await {
                match store.set(TIMER_STATE_KEY, &snapshot.to_value()).await {
                    Ok(()) => debug!(
                        mode = snapshot.mode.as_str(),
                        remaining = ?snapshot.remaining_time,
                        "Timer state saved"
                    ),
                    Err(e) => warn!(error = %e, "Failed to save timer state"),
                }
            }
        });
        (Self { tx }, handle)
    }

    pub fn save(&self, snapshot: Snapshot) {
        if self.tx.send(snapshot).is_err() {
            warn!("Snapshot writer has stopped; save skipped");
        }
    }
}
