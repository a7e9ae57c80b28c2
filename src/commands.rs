//! Thin command layer: `join`, `leave`, `status` and the inbound-message
//! path. Everything here is event wiring over [`RoomRegistry`] and
//! [`RoomQueue`]; the queue itself never learns about chat.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::ReaderConfig;
use crate::core::registry::RoomRegistry;
use crate::core::room_queue::QueueStatus;
use crate::voice::{wait_ready, ConnectionStatus, VoiceConnection, VoiceError, VoiceTransport};

/// Connect the room to a voice target and attach the connection to its
/// queue. Refuses when the room is already connected. A transport that does
/// not reach Ready within the configured timeout is used anyway.
pub async fn join(
    registry: &Arc<RoomRegistry>,
    transport: &Arc<dyn VoiceTransport>,
    room_id: &str,
    target: &str,
    config: &ReaderConfig,
) -> Result<(), VoiceError> {
    let queue = registry.get_or_create(room_id);
    if queue.is_connected() {
        return Err(VoiceError::AlreadyConnected);
    }

    let connection = transport.connect(room_id, target).await?;

    if !wait_ready(&connection, config.ready_timeout()).await {
        warn!(room_id, "voice connection not ready in time; proceeding anyway");
    }

    spawn_disconnect_watcher(
        registry.clone(),
        room_id.to_string(),
        connection.clone(),
        config.reconnect_grace(),
    );

    queue.set_connection(connection);
    info!(room_id, target, "joined voice channel");
    Ok(())
}

/// Tear the room down. Errors when the room was never joined.
pub fn leave(registry: &RoomRegistry, room_id: &str) -> Result<(), VoiceError> {
    let connected = registry
        .get(room_id)
        .map(|queue| queue.is_connected())
        .unwrap_or(false);
    if !connected {
        return Err(VoiceError::NotConnected);
    }
    registry.remove(room_id);
    info!(room_id, "left voice channel");
    Ok(())
}

/// Snapshot of the room's queue, if the room exists.
pub fn status(registry: &RoomRegistry, room_id: &str) -> Option<QueueStatus> {
    registry.get(room_id).map(|queue| queue.status())
}

/// Inbound chat text for a room. Messages for rooms that are not joined are
/// ignored; the queue handles normalization and empty-input dropping.
pub fn read_message(registry: &RoomRegistry, room_id: &str, text: &str) {
    if let Some(queue) = registry.get(room_id) {
        if queue.is_connected() {
            queue.enqueue(text);
        }
    }
}

/// Watch the connection; when it drops, give the transport a short grace
/// period to start reconnecting (Signalling/Connecting) and otherwise remove
/// the room. This is the collaborator that observes disconnects and owns
/// session teardown.
fn spawn_disconnect_watcher(
    registry: Arc<RoomRegistry>,
    room_id: String,
    connection: Arc<dyn VoiceConnection>,
    grace: Duration,
) {
    tokio::spawn(async move {
        let mut status_rx = connection.watch_status();
        loop {
            if status_rx.changed().await.is_err() {
                break;
            }
            let current = *status_rx.borrow_and_update();
            match current {
                ConnectionStatus::Disconnected => {
                    info!(%room_id, "transport dropped; waiting for it to resume");
                    if !recovers_within(&mut status_rx, grace).await {
                        warn!(%room_id, "transport did not recover; removing room");
                        registry.remove(&room_id);
                        break;
                    }
                }
                ConnectionStatus::Destroyed => break,
                _ => {}
            }
        }
    });
}

/// Whether the transport leaves `Disconnected` (toward Signalling,
/// Connecting or Ready) within `grace`.
async fn recovers_within(
    status_rx: &mut tokio::sync::watch::Receiver<ConnectionStatus>,
    grace: Duration,
) -> bool {
    let wait = async {
        loop {
            match *status_rx.borrow_and_update() {
                ConnectionStatus::Signalling
                | ConnectionStatus::Connecting
                | ConnectionStatus::Ready => return true,
                ConnectionStatus::Destroyed => return false,
                ConnectionStatus::Disconnected => {}
            }
            if status_rx.changed().await.is_err() {
                return false;
            }
        }
    };
    tokio::time::timeout(grace, wait).await.unwrap_or(false)
}
