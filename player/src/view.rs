use crate::error::PlayerError;
use crate::manifest::Representation;
use common::catalog::Video;
use std::fmt;
use tracing::{error, info};

/// Text of the current-quality indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityLabel {
    Adapting,
    /// Automatic mode, settled on a representation.
    AutoAt(u32),
    SwitchingDown,
    SwitchingUp,
    /// Manually pinned representation.
    Fixed(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    High,
    Low,
    Auto,
    Neutral,
}

impl QualityLabel {
    pub fn tone(&self) -> Tone {
        match self {
            QualityLabel::Fixed(height) | QualityLabel::AutoAt(height) if *height >= 720 => {
                Tone::High
            }
            QualityLabel::Fixed(height) | QualityLabel::AutoAt(height) if *height <= 360 => {
                Tone::Low
            }
            QualityLabel::Fixed(_) => Tone::Neutral,
            _ => Tone::Auto,
        }
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityLabel::Adapting => write!(f, "Auto (adapting...)"),
            QualityLabel::AutoAt(height) => write!(f, "Auto ({}p)", height),
            QualityLabel::SwitchingDown => write!(f, "Auto (Switching Down...)"),
            QualityLabel::SwitchingUp => write!(f, "Auto (Switching Up...)"),
            QualityLabel::Fixed(height) => write!(f, "{}p", height),
        }
    }
}

/// Which quality control is shown as active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualitySelection {
    Auto { rendered: Option<String> },
    Manual(String),
}

/// The user-facing surface of the player.
pub trait View {
    fn render_videos(&mut self, videos: &[Video]);

    /// Marks `id` as the playing video.
    fn mark_video(&mut self, id: &str);

    fn show_now_playing(&mut self, title: &str);

    /// Replaces the quality controls. An empty slice removes them, including
    /// the Auto control.
    fn render_qualities(&mut self, representations: &[Representation]);

    fn mark_quality(&mut self, selection: &QualitySelection);

    fn show_quality(&mut self, label: QualityLabel);

    fn show_error(&mut self, error: &PlayerError);
}

/// View that writes every change to the log.
#[derive(Debug, Default)]
pub struct LogView {
    quality: Option<QualityLabel>,
}

impl LogView {
    pub fn quality(&self) -> Option<QualityLabel> {
        self.quality
    }
}

impl View for LogView {
    fn render_videos(&mut self, videos: &[Video]) {
        for video in videos {
            info!("video {}: {}", video.id, video.title);
        }
    }

    fn mark_video(&mut self, id: &str) {
        info!("selected video {}", id);
    }

    fn show_now_playing(&mut self, title: &str) {
        info!("now playing: {}", title);
    }

    fn render_qualities(&mut self, representations: &[Representation]) {
        if representations.is_empty() {
            info!("quality selection unavailable");
            return;
        }

        info!("quality auto");
        for r in representations {
            info!("quality {}: {}p ({} bps)", r.id, r.height, r.bandwidth);
        }
    }

    fn mark_quality(&mut self, selection: &QualitySelection) {
        match selection {
            QualitySelection::Auto { rendered: Some(id) } => info!("active quality: auto, {}", id),
            QualitySelection::Auto { rendered: None } => info!("active quality: auto"),
            QualitySelection::Manual(id) => info!("active quality: {}", id),
        }
    }

    fn show_quality(&mut self, label: QualityLabel) {
        self.quality = Some(label);
        info!("Currently Playing: {} ({:?})", label, label.tone());
    }

    fn show_error(&mut self, e: &PlayerError) {
        error!("[ERROR] {}", e);
    }
}
