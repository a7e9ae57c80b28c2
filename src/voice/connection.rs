//! Connection and transport seams.
//!
//! The low-level handshake and encryption live outside this crate; the queue
//! only needs a handle it can ask for the current status, watch for status
//! changes, and destroy on leave.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::warn;

use super::types::{ConnectionStatus, VoiceError};

/// One active voice connection, owned by at most one room queue at a time.
pub trait VoiceConnection: Send + Sync {
    /// Current status, read once and treated as a value by callers.
    fn status(&self) -> ConnectionStatus;

    /// Subscribe to status changes.
    fn watch_status(&self) -> watch::Receiver<ConnectionStatus>;

    /// Tear the connection down; status moves to `Destroyed`.
    fn destroy(&self);
}

/// Factory boundary: establish a connection for a room to a device target.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(
        &self,
        room_id: &str,
        target: &str,
    ) -> Result<Arc<dyn VoiceConnection>, VoiceError>;
}

/// Wait for the connection to reach `Ready`, up to `timeout`.
///
/// Returns whether `Ready` was reached. On timeout callers proceed
/// optimistically; the transport often becomes usable moments later.
pub async fn wait_ready(connection: &Arc<dyn VoiceConnection>, timeout: Duration) -> bool {
    let mut status_rx = connection.watch_status();
    let reached = tokio::time::timeout(timeout, async {
        loop {
            if *status_rx.borrow_and_update() == ConnectionStatus::Ready {
                return;
            }
            if status_rx.changed().await.is_err() {
                // Transport side dropped; nothing more will change.
                return;
            }
        }
    })
    .await;

    match reached {
        Ok(()) => connection.status() == ConnectionStatus::Ready,
        Err(_) => {
            warn!("voice connection not ready within {timeout:?}; proceeding anyway");
            false
        }
    }
}
