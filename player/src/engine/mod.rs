use crate::error::PlayerError;
use crate::player::PlayerEvent;
use crate::throughput::Transfer;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

pub mod simulated;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackType {
    Video,
    Audio,
}

/// Metrics the engine reports for one track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineMetrics {
    /// Most recently completed segment download.
    pub last_transfer: Option<Transfer>,
    /// Running average throughput in kbps.
    pub average_kbps: Option<u64>,
    pub buffer_level: Option<Duration>,
}

/// Notifications raised by the engine while it plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    PlaybackError(String),
    QualityRendered { id: String },
}

/// Posts engine notifications onto the player queue, tagged with the session
/// they belong to.
#[derive(Debug, Clone)]
pub struct EngineNotifier {
    session: u64,
    events: UnboundedSender<PlayerEvent>,
}

impl EngineNotifier {
    pub fn new(session: u64, events: UnboundedSender<PlayerEvent>) -> Self {
        Self { session, events }
    }

    pub fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(PlayerEvent::Engine {
            session: self.session,
            event,
        });
    }
}

/// The streaming playback engine. It downloads, buffers and renders
/// segments on its own; the player only steers representation choice.
///
/// Calls never block: metric queries answer from what the engine already
/// knows and return `None` when it has nothing.
pub trait PlaybackEngine {
    fn initialize(&mut self, manifest_url: &str, notifier: EngineNotifier)
        -> Result<(), PlayerError>;

    /// Turns the engine's own bitrate adaptation on or off.
    fn set_auto_switch(&mut self, track: TrackType, enabled: bool);

    fn select_representation(&mut self, track: TrackType, id: &str);

    fn seek(&mut self, position: Duration);

    /// Current play head.
    fn position(&self) -> Duration;

    fn metrics(&self, track: TrackType) -> Option<EngineMetrics>;

    fn destroy(&mut self);
}
