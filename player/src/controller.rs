//! Playback controller: owns the engine, the view and the context of the
//! video being played, and turns ABR decisions and user choices into engine
//! commands.

use crate::abr::{AbrEngine, AbrPolicy, AbrState, SwitchDecision};
use crate::config::AbrSettings;
use crate::engine::{EngineEvent, EngineNotifier, PlaybackEngine, TrackType};
use crate::error::PlayerError;
use crate::manifest::Ladder;
use crate::throughput;
use crate::view::{QualityLabel, QualitySelection, View};
use common::catalog::Video;
use std::time::{Duration, Instant};
use tokio::time::{interval_at, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Everything that lives exactly as long as one video is selected.
pub struct Session {
    id: u64,
    video: Video,
    /// Empty until the manifest has been parsed.
    ladder: Ladder,
    abr: AbrEngine,
    ticker: Interval,
}

impl Session {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn video(&self) -> &Video {
        &self.video
    }

    pub fn ladder(&self) -> &Ladder {
        &self.ladder
    }

    pub fn abr_state(&self) -> &AbrState {
        self.abr.state()
    }
}

pub struct Controller<E, V> {
    engine: E,
    view: V,
    policy: AbrPolicy,
    sample_period: Duration,
    safety_factor: f64,
    session: Option<Session>,
}

impl<E: PlaybackEngine, V: View> Controller<E, V> {
    pub fn new(engine: E, view: V, settings: &AbrSettings) -> Self {
        Self {
            engine,
            view,
            policy: AbrPolicy::from(settings),
            sample_period: settings.sample_period,
            safety_factor: settings.safety_factor,
            session: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Replaces the current session with a fresh one for `video`. Must be
    /// called from within a tokio runtime.
    pub fn begin(
        &mut self,
        id: u64,
        video: Video,
        notifier: EngineNotifier,
    ) -> Result<(), PlayerError> {
        self.end();

        self.view.render_qualities(&[]);
        if let Err(e) = self.engine.initialize(&video.stream_url, notifier) {
            self.view.show_error(&e);
            return Err(e);
        }
        self.view.show_now_playing(&video.title);

        let start = tokio::time::Instant::now() + self.sample_period;
        let mut ticker = interval_at(start, self.sample_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("session {}: playing {}", id, video.title);
        self.session = Some(Session {
            id,
            video,
            ladder: Ladder::default(),
            abr: AbrEngine::new(self.policy),
            ticker,
        });
        Ok(())
    }

    /// Drops the current session, stopping its sampling timer.
    pub fn end(&mut self) {
        if let Some(session) = self.session.take() {
            info!("session {}: stopped", session.id);
            self.engine.destroy();
        }
    }

    /// Resolves once the current session's sampling period elapses. Never
    /// resolves without a session.
    pub async fn next_tick(&mut self) {
        match self.session.as_mut() {
            Some(session) => {
                session.ticker.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    pub fn on_manifest(&mut self, id: u64, result: Result<Ladder, PlayerError>) {
        let Some(session) = current(&mut self.session, id) else {
            debug!("session {}: dropping stale manifest", id);
            return;
        };

        match result {
            Ok(ladder) => {
                info!("session {}: {} video representations", id, ladder.len());
                self.view.render_qualities(ladder.switchable());
                if ladder.is_switchable() {
                    self.view
                        .mark_quality(&QualitySelection::Auto { rendered: None });
                    self.view.show_quality(QualityLabel::Adapting);
                }
                session.ladder = ladder;
            }
            Err(e) => {
                warn!("session {}: {}", id, e);
                self.view.render_qualities(&[]);
                self.view.show_error(&e);
            }
        }
    }

    pub fn on_tick(&mut self, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.ladder.is_switchable() {
            return;
        }

        let metrics = self.engine.metrics(TrackType::Video);
        if metrics.is_none() {
            debug!("ABR tick: engine metrics unavailable");
        }
        let sample = throughput::sample(metrics.as_ref());
        debug!(
            instant_kbps = sample.kbps_instant,
            average_kbps = sample.kbps_average,
            safe_kbps = sample.safe_kbps(self.safety_factor),
            buffer_ms = metrics
                .and_then(|m| m.buffer_level)
                .map_or(0, |b| b.as_millis() as u64),
            "ABR tick"
        );

        let decision = session.abr.evaluate(&sample, &session.ladder, now);
        self.apply(&decision);
    }

    fn apply(&mut self, decision: &SwitchDecision) {
        let (target, label) = match decision {
            SwitchDecision::Hold => return,
            SwitchDecision::SwitchDown(target) => (target, QualityLabel::SwitchingDown),
            SwitchDecision::SwitchUp(target) => (target, QualityLabel::SwitchingUp),
        };

        let representation = &target.representation;
        info!(
            "ABR: {} to {} ({}p, {} bps)",
            if target.rank == 0 { "up" } else { "down" },
            representation.id,
            representation.height,
            representation.bandwidth
        );
        self.engine
            .select_representation(TrackType::Video, &representation.id);
        // Seeking to the current position flushes the buffer so the new
        // quality shows up immediately.
        let position = self.engine.position();
        self.engine.seek(position);
        self.view.show_quality(label);
    }

    /// Pins a representation chosen by the user.
    pub fn select_quality(&mut self, id: &str) {
        let Some(session) = self.session.as_mut() else {
            warn!("quality {}: nothing is playing", id);
            return;
        };
        let Some(rank) = session.ladder.switchable().iter().position(|r| r.id == id) else {
            warn!("quality {}: not available", id);
            return;
        };
        let height = session.ladder.switchable()[rank].height;

        info!("user selected {}p (id: {})", height, id);
        session.abr.select_manual(id, rank);
        self.engine.set_auto_switch(TrackType::Video, false);
        self.engine.select_representation(TrackType::Video, id);
        self.view
            .mark_quality(&QualitySelection::Manual(id.to_string()));
        self.view.show_quality(QualityLabel::Fixed(height));
    }

    /// Hands quality choice back to the ABR loop.
    pub fn select_auto(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.ladder.is_switchable() {
            return;
        }

        info!("user selected auto");
        session.abr.select_auto();
        self.engine.set_auto_switch(TrackType::Video, true);
        self.view
            .mark_quality(&QualitySelection::Auto { rendered: None });
        self.view.show_quality(QualityLabel::Adapting);
    }

    pub fn on_engine_event(&mut self, id: u64, event: EngineEvent) {
        let Some(session) = current(&mut self.session, id) else {
            debug!("session {}: dropping stale engine event", id);
            return;
        };

        match event {
            EngineEvent::PlaybackError(msg) => {
                self.view.show_error(&PlayerError::PlaybackError(msg));
            }
            EngineEvent::QualityRendered { id } => {
                debug!("quality rendered: {}", id);
                if session.abr.is_manual() {
                    return;
                }
                let Some(height) = session.ladder.iter().find(|r| r.id == id).map(|r| r.height)
                else {
                    return;
                };
                self.view
                    .mark_quality(&QualitySelection::Auto { rendered: Some(id) });
                self.view.show_quality(QualityLabel::AutoAt(height));
            }
        }
    }
}

fn current(session: &mut Option<Session>, id: u64) -> Option<&mut Session> {
    session.as_mut().filter(|s| s.id == id)
}
