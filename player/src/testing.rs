//! Test doubles for the engine, view and fetcher seams.

use crate::engine::{EngineMetrics, EngineNotifier, PlaybackEngine, TrackType};
use crate::error::PlayerError;
use crate::fetch::Fetcher;
use crate::manifest::Representation;
use crate::throughput::Transfer;
use crate::view::{QualityLabel, QualitySelection, View};
use async_trait::async_trait;
use bytes::Bytes;
use common::catalog::Video;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Initialize(String),
    AutoSwitch(bool),
    Select(String),
    Seek(Duration),
    Destroy,
}

#[derive(Default)]
pub struct RecordingEngine {
    pub log: Rc<RefCell<Vec<Call>>>,
    pub fail_initialize: bool,
    pub metrics: Option<EngineMetrics>,
    pub position: Duration,
}

impl RecordingEngine {
    pub fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }

    /// Reports a one second transfer at `kbps` from now on.
    pub fn set_rate(&mut self, kbps: u64) {
        self.metrics = Some(EngineMetrics {
            last_transfer: Some(Transfer {
                bytes: kbps * 125,
                duration: Duration::from_secs(1),
            }),
            average_kbps: Some(kbps),
            buffer_level: Some(Duration::from_secs(6)),
        });
    }
}

impl PlaybackEngine for RecordingEngine {
    fn initialize(
        &mut self,
        manifest_url: &str,
        _notifier: EngineNotifier,
    ) -> Result<(), PlayerError> {
        if self.fail_initialize {
            return Err(PlayerError::EngineInitError("unsupported".to_string()));
        }
        self.log
            .borrow_mut()
            .push(Call::Initialize(manifest_url.to_string()));
        Ok(())
    }

    fn set_auto_switch(&mut self, _track: TrackType, enabled: bool) {
        self.log.borrow_mut().push(Call::AutoSwitch(enabled));
    }

    fn select_representation(&mut self, _track: TrackType, id: &str) {
        self.log.borrow_mut().push(Call::Select(id.to_string()));
    }

    fn seek(&mut self, position: Duration) {
        self.log.borrow_mut().push(Call::Seek(position));
    }

    fn position(&self) -> Duration {
        self.position
    }

    fn metrics(&self, _track: TrackType) -> Option<EngineMetrics> {
        self.metrics
    }

    fn destroy(&mut self) {
        self.log.borrow_mut().push(Call::Destroy);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shown {
    Videos(Vec<String>),
    MarkVideo(String),
    NowPlaying(String),
    Qualities(Vec<String>),
    Selection(QualitySelection),
    Label(QualityLabel),
    Error(PlayerError),
}

#[derive(Default)]
pub struct RecordingView {
    pub log: Rc<RefCell<Vec<Shown>>>,
}

impl RecordingView {
    pub fn shown(&self) -> Vec<Shown> {
        self.log.borrow().clone()
    }

    pub fn qualities(&self) -> Option<Vec<String>> {
        self.log.borrow().iter().rev().find_map(|s| match s {
            Shown::Qualities(ids) => Some(ids.clone()),
            _ => None,
        })
    }

    pub fn label(&self) -> Option<QualityLabel> {
        self.log.borrow().iter().rev().find_map(|s| match s {
            Shown::Label(label) => Some(*label),
            _ => None,
        })
    }

    pub fn selection(&self) -> Option<QualitySelection> {
        self.log.borrow().iter().rev().find_map(|s| match s {
            Shown::Selection(selection) => Some(selection.clone()),
            _ => None,
        })
    }

    pub fn errors(&self) -> Vec<PlayerError> {
        self.log
            .borrow()
            .iter()
            .filter_map(|s| match s {
                Shown::Error(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }
}

impl View for RecordingView {
    fn render_videos(&mut self, videos: &[Video]) {
        let ids = videos.iter().map(|v| v.id.clone()).collect();
        self.log.borrow_mut().push(Shown::Videos(ids));
    }

    fn mark_video(&mut self, id: &str) {
        self.log.borrow_mut().push(Shown::MarkVideo(id.to_string()));
    }

    fn show_now_playing(&mut self, title: &str) {
        self.log.borrow_mut().push(Shown::NowPlaying(title.to_string()));
    }

    fn render_qualities(&mut self, representations: &[Representation]) {
        let ids = representations.iter().map(|r| r.id.clone()).collect();
        self.log.borrow_mut().push(Shown::Qualities(ids));
    }

    fn mark_quality(&mut self, selection: &QualitySelection) {
        self.log
            .borrow_mut()
            .push(Shown::Selection(selection.clone()));
    }

    fn show_quality(&mut self, label: QualityLabel) {
        self.log.borrow_mut().push(Shown::Label(label));
    }

    fn show_error(&mut self, error: &PlayerError) {
        self.log.borrow_mut().push(Shown::Error(error.clone()));
    }
}

/// Answers from a fixed url → body table; unknown urls fail as a network
/// error would.
#[derive(Default)]
pub struct MapFetcher {
    pub bodies: HashMap<String, String>,
}

impl MapFetcher {
    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.to_string());
        self
    }
}

#[async_trait]
impl Fetcher for MapFetcher {
    async fn get(&self, url: &str) -> Result<Bytes, PlayerError> {
        self.bodies
            .get(url)
            .map(|body| Bytes::from(body.clone()))
            .ok_or_else(|| PlayerError::NetworkError(format!("connect to {}: refused", url)))
    }
}
