use crate::config::{ProfileStep, Simulation};
use crate::engine::{EngineEvent, EngineMetrics, EngineNotifier, PlaybackEngine, TrackType};
use crate::error::PlayerError;
use crate::throughput::Transfer;
use hyper::Uri;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Piecewise-constant link rate over time.
#[derive(Debug, Clone)]
pub struct NetworkProfile {
    steps: Vec<ProfileStep>,
}

impl NetworkProfile {
    pub fn new(steps: Vec<ProfileStep>) -> Self {
        Self { steps }
    }

    /// Rate at `elapsed` since start. The last step holds forever.
    pub fn kbps_at(&self, elapsed: Duration) -> u64 {
        let mut start = Duration::ZERO;
        for step in &self.steps {
            match step.duration {
                Some(duration) if elapsed >= start + duration => start += duration,
                _ => return step.kbps,
            }
        }

        self.steps.last().map_or(0, |s| s.kbps)
    }

    /// Mean rate over `[0, elapsed]`.
    pub fn average_kbps(&self, elapsed: Duration) -> u64 {
        if elapsed.is_zero() {
            return self.kbps_at(elapsed);
        }

        let mut start = Duration::ZERO;
        let mut kbit = 0.0;
        for step in &self.steps {
            let end = match step.duration {
                Some(duration) => (start + duration).min(elapsed),
                None => elapsed,
            };
            kbit += step.kbps as f64 * (end - start).as_secs_f64();
            start = end;
            if start >= elapsed {
                break;
            }
        }
        if start < elapsed {
            let last = self.steps.last().map_or(0, |s| s.kbps);
            kbit += last as f64 * (elapsed - start).as_secs_f64();
        }

        (kbit / elapsed.as_secs_f64()).round() as u64
    }
}

struct Playback {
    manifest_url: String,
    notifier: EngineNotifier,
    started: Instant,
    /// Play head at `anchor`.
    offset: Duration,
    anchor: Instant,
    auto_switch: bool,
    representation: Option<String>,
}

/// Headless stand-in for a real playback engine: the play head follows the
/// wall clock and every metrics query reports one segment fetched at the
/// rate the network profile dictates.
pub struct SimulatedEngine {
    profile: NetworkProfile,
    segment_duration: Duration,
    playback: Option<Playback>,
}

impl SimulatedEngine {
    pub fn new(settings: &Simulation) -> Self {
        Self {
            profile: NetworkProfile::new(settings.steps.clone()),
            segment_duration: settings.segment_duration,
            playback: None,
        }
    }

    pub fn auto_switch(&self) -> Option<bool> {
        self.playback.as_ref().map(|p| p.auto_switch)
    }

    pub fn representation(&self) -> Option<&str> {
        self.playback
            .as_ref()
            .and_then(|p| p.representation.as_deref())
    }
}

impl PlaybackEngine for SimulatedEngine {
    fn initialize(
        &mut self,
        manifest_url: &str,
        notifier: EngineNotifier,
    ) -> Result<(), PlayerError> {
        let uri = manifest_url
            .parse::<Uri>()
            .map_err(|e| PlayerError::EngineInitError(format!("{}: {}", manifest_url, e)))?;
        if uri.scheme().is_none() || uri.host().is_none() {
            return Err(PlayerError::EngineInitError(format!(
                "{}: not an absolute url",
                manifest_url
            )));
        }

        info!("engine: loading {}", manifest_url);
        let now = Instant::now();
        self.playback = Some(Playback {
            manifest_url: manifest_url.to_string(),
            notifier,
            started: now,
            offset: Duration::ZERO,
            anchor: now,
            auto_switch: true,
            representation: None,
        });
        Ok(())
    }

    fn set_auto_switch(&mut self, track: TrackType, enabled: bool) {
        if let Some(playback) = self.playback.as_mut() {
            debug!("engine: {:?} auto switch {}", track, enabled);
            playback.auto_switch = enabled;
        }
    }

    fn select_representation(&mut self, track: TrackType, id: &str) {
        let Some(playback) = self.playback.as_mut() else {
            return;
        };

        debug!("engine: {:?} representation {}", track, id);
        playback.representation = Some(id.to_string());
        if track == TrackType::Video {
            playback
                .notifier
                .emit(EngineEvent::QualityRendered { id: id.to_string() });
        }
    }

    fn seek(&mut self, position: Duration) {
        if let Some(playback) = self.playback.as_mut() {
            playback.offset = position;
            playback.anchor = Instant::now();
        }
    }

    fn position(&self) -> Duration {
        self.playback
            .as_ref()
            .map_or(Duration::ZERO, |p| p.offset + p.anchor.elapsed())
    }

    fn metrics(&self, track: TrackType) -> Option<EngineMetrics> {
        let playback = self.playback.as_ref()?;
        if track != TrackType::Video {
            return None;
        }

        let elapsed = playback.started.elapsed();
        let kbps = self.profile.kbps_at(elapsed);
        // A stalled link has no completed transfer to report.
        let last_transfer = (kbps > 0).then(|| Transfer {
            bytes: kbps * 125 * self.segment_duration.as_millis() as u64 / 1000,
            duration: self.segment_duration,
        });

        Some(EngineMetrics {
            last_transfer,
            average_kbps: Some(self.profile.average_kbps(elapsed)),
            buffer_level: Some(self.segment_duration * 3),
        })
    }

    fn destroy(&mut self) {
        if let Some(playback) = self.playback.take() {
            info!("engine: unloading {}", playback.manifest_url);
        }
    }
}
