//! # Command Layer Tests
//!
//! join/leave/status wiring over the registry, including the disconnect
//! watcher that tears a room down when the transport drops and does not
//! recover within the grace period.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::sleep;
use uuid::Uuid;

use vocero::commands;
use vocero::config::ReaderConfig;
use vocero::core::playback::{OutputDevice, PlaybackError};
use vocero::core::registry::RoomRegistry;
use vocero::core::room_queue::PlaybackState;
use vocero::core::synth::{SpeechArtifact, SpeechSynthesizer, SynthResult};
use vocero::voice::{ConnectionStatus, VoiceConnection, VoiceError, VoiceTransport};

// ============================================================================
// Mocks
// ============================================================================

struct FileSynth {
    dir: PathBuf,
}

#[async_trait]
impl SpeechSynthesizer for FileSynth {
    async fn synthesize(&self, text: &str) -> SynthResult<SpeechArtifact> {
        let path = self.dir.join(format!("utt_{}.mp3", Uuid::new_v4()));
        tokio::fs::write(&path, text.as_bytes()).await.unwrap();
        Ok(SpeechArtifact::new(path))
    }
}

struct RecordingDevice {
    played: Arc<Mutex<Vec<String>>>,
}

impl RecordingDevice {
    fn new() -> Self {
        Self {
            played: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutputDevice for RecordingDevice {
    async fn play(&self, source: &Path) -> Result<(), PlaybackError> {
        let label = std::fs::read_to_string(source).unwrap_or_default();
        self.played.lock().unwrap().push(label);
        sleep(Duration::from_millis(10)).await;
        Ok(())
    }

    fn stop(&self) {}
}

struct ScriptedConnection {
    status_tx: watch::Sender<ConnectionStatus>,
}

impl ScriptedConnection {
    fn new(initial: ConnectionStatus) -> Arc<Self> {
        let (status_tx, _) = watch::channel(initial);
        Arc::new(Self { status_tx })
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status_tx.send_replace(status);
    }
}

impl VoiceConnection for ScriptedConnection {
    fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    fn destroy(&self) {
        self.status_tx.send_replace(ConnectionStatus::Destroyed);
    }
}

struct FakeTransport {
    connection: Arc<ScriptedConnection>,
    connects: AtomicUsize,
}

impl FakeTransport {
    fn new(connection: Arc<ScriptedConnection>) -> Arc<Self> {
        Arc::new(Self {
            connection,
            connects: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn connect(
        &self,
        _room_id: &str,
        _target: &str,
    ) -> Result<Arc<dyn VoiceConnection>, VoiceError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.connection.clone())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("vocero_cmd_{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn test_registry(dir: &Path, device: Arc<RecordingDevice>) -> Arc<RoomRegistry> {
    Arc::new(RoomRegistry::new(
        Arc::new(FileSynth { dir: dir.to_path_buf() }),
        move || {
            let device: Arc<dyn OutputDevice> = device.clone();
            device
        },
    ))
}

fn fast_config() -> ReaderConfig {
    ReaderConfig {
        ready_timeout_secs: 1,
        reconnect_grace_secs: 0,
        ..Default::default()
    }
}

async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    condition()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn join_status_leave_roundtrip() {
    let dir = scratch_dir();
    let device = Arc::new(RecordingDevice::new());
    let registry = test_registry(&dir, device.clone());
    let connection = ScriptedConnection::new(ConnectionStatus::Ready);
    let fake_transport = FakeTransport::new(connection.clone());
    let transport: Arc<dyn VoiceTransport> = fake_transport.clone();
    let config = fast_config();

    commands::join(&registry, &transport, "room-1", "voice-channel", &config)
        .await
        .unwrap();

    let status = commands::status(&registry, "room-1").expect("room must exist after join");
    assert_eq!(status.backlog, 0);
    assert_eq!(status.state, PlaybackState::Idle);
    assert_eq!(
        fake_transport.connects.load(Ordering::SeqCst),
        1,
        "join connects exactly once"
    );

    commands::leave(&registry, "room-1").unwrap();
    assert!(registry.get("room-1").is_none());
    assert_eq!(connection.status(), ConnectionStatus::Destroyed);

    std::fs::remove_dir_all(dir).unwrap();
}

#[tokio::test]
async fn second_join_is_rejected() {
    let dir = scratch_dir();
    let device = Arc::new(RecordingDevice::new());
    let registry = test_registry(&dir, device);
    let connection = ScriptedConnection::new(ConnectionStatus::Ready);
    let transport: Arc<dyn VoiceTransport> = FakeTransport::new(connection);
    let config = fast_config();

    commands::join(&registry, &transport, "room-1", "voice-channel", &config)
        .await
        .unwrap();
    let second = commands::join(&registry, &transport, "room-1", "voice-channel", &config).await;
    assert!(matches!(second, Err(VoiceError::AlreadyConnected)));

    std::fs::remove_dir_all(dir).unwrap();
}

#[tokio::test]
async fn join_proceeds_when_ready_never_arrives() {
    let dir = scratch_dir();
    let device = Arc::new(RecordingDevice::new());
    let registry = test_registry(&dir, device);
    // Stuck in Connecting; the bounded wait must not fail the join.
    let connection = ScriptedConnection::new(ConnectionStatus::Connecting);
    let transport: Arc<dyn VoiceTransport> = FakeTransport::new(connection);
    let config = ReaderConfig {
        ready_timeout_secs: 0,
        ..fast_config()
    };

    commands::join(&registry, &transport, "room-1", "voice-channel", &config)
        .await
        .unwrap();
    assert!(registry.get("room-1").unwrap().is_connected());

    std::fs::remove_dir_all(dir).unwrap();
}

#[tokio::test]
async fn unrecovered_disconnect_removes_the_room() {
    let dir = scratch_dir();
    let device = Arc::new(RecordingDevice::new());
    let registry = test_registry(&dir, device);
    let connection = ScriptedConnection::new(ConnectionStatus::Ready);
    let transport: Arc<dyn VoiceTransport> = FakeTransport::new(connection.clone());
    let config = fast_config(); // zero grace: any drop is final

    commands::join(&registry, &transport, "room-1", "voice-channel", &config)
        .await
        .unwrap();
    connection.set_status(ConnectionStatus::Disconnected);

    assert!(
        wait_until(Duration::from_secs(2), || registry.get("room-1").is_none()).await,
        "room should be torn down after an unrecovered disconnect"
    );

    std::fs::remove_dir_all(dir).unwrap();
}

#[tokio::test]
async fn reconnecting_transport_keeps_the_room() {
    let dir = scratch_dir();
    let device = Arc::new(RecordingDevice::new());
    let registry = test_registry(&dir, device);
    let connection = ScriptedConnection::new(ConnectionStatus::Ready);
    let transport: Arc<dyn VoiceTransport> = FakeTransport::new(connection.clone());
    let config = ReaderConfig {
        reconnect_grace_secs: 2,
        ..fast_config()
    };

    commands::join(&registry, &transport, "room-1", "voice-channel", &config)
        .await
        .unwrap();
    connection.set_status(ConnectionStatus::Disconnected);
    sleep(Duration::from_millis(50)).await;
    connection.set_status(ConnectionStatus::Signalling);
    connection.set_status(ConnectionStatus::Ready);

    sleep(Duration::from_millis(300)).await;
    assert!(registry.get("room-1").is_some(), "recovering transport must keep the room");

    std::fs::remove_dir_all(dir).unwrap();
}

#[tokio::test]
async fn leave_without_join_reports_not_connected() {
    let dir = scratch_dir();
    let device = Arc::new(RecordingDevice::new());
    let registry = test_registry(&dir, device);

    let result = commands::leave(&registry, "room-1");
    assert!(matches!(result, Err(VoiceError::NotConnected)));

    std::fs::remove_dir_all(dir).unwrap();
}

#[tokio::test]
async fn messages_for_unjoined_rooms_are_ignored() {
    let dir = scratch_dir();
    let device = Arc::new(RecordingDevice::new());
    let registry = test_registry(&dir, device.clone());
    let connection = ScriptedConnection::new(ConnectionStatus::Ready);
    let transport: Arc<dyn VoiceTransport> = FakeTransport::new(connection);
    let config = fast_config();

    commands::read_message(&registry, "room-1", "nadie escucha");
    sleep(Duration::from_millis(50)).await;
    assert!(device.played().is_empty());

    commands::join(&registry, &transport, "room-1", "voice-channel", &config)
        .await
        .unwrap();
    commands::read_message(&registry, "room-1", "ahora si");

    assert!(wait_until(Duration::from_secs(2), || {
        device.played() == vec!["ahora si"]
    })
    .await);

    std::fs::remove_dir_all(dir).unwrap();
}
