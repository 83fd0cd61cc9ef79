//! Single-threaded event loop tying the catalog, the controller and user
//! input together.

use crate::catalog;
use crate::config::Settings;
use crate::controller::Controller;
use crate::engine::{EngineEvent, EngineNotifier, PlaybackEngine};
use crate::error::PlayerError;
use crate::fetch::Fetcher;
use crate::manifest::Ladder;
use crate::view::View;
use common::catalog::Video;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug)]
pub enum PlayerEvent {
    SelectVideo(String),
    SelectQuality(String),
    SelectAuto,
    ManifestLoaded {
        session: u64,
        result: Result<Ladder, PlayerError>,
    },
    Engine {
        session: u64,
        event: EngineEvent,
    },
    Shutdown,
}

impl PlayerEvent {
    /// Parses one line of user input. Blank lines yield `None`.
    pub fn parse_command(line: &str) -> Result<Option<Self>, String> {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return Ok(None);
        };
        let arg = parts.next();
        if parts.next().is_some() {
            return Err(format!("too many arguments: {}", line.trim()));
        }

        let event = match (command, arg) {
            ("video", Some(id)) => PlayerEvent::SelectVideo(id.to_string()),
            ("quality", Some("auto")) | ("auto", None) => PlayerEvent::SelectAuto,
            ("quality", Some(id)) => PlayerEvent::SelectQuality(id.to_string()),
            ("quit", None) | ("exit", None) => PlayerEvent::Shutdown,
            _ => return Err(format!("unknown command: {}", line.trim())),
        };
        Ok(Some(event))
    }
}

enum Wake {
    Event(Option<PlayerEvent>),
    Tick,
}

pub struct Player<E, V> {
    controller: Controller<E, V>,
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    catalog_url: String,
    videos: Vec<Video>,
    events: UnboundedSender<PlayerEvent>,
    next_session: u64,
    manifest_task: Option<JoinHandle<()>>,
}

impl<E: PlaybackEngine, V: View> Player<E, V> {
    pub fn new(
        settings: &Settings,
        engine: E,
        view: V,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        events: UnboundedSender<PlayerEvent>,
    ) -> Self {
        Self {
            controller: Controller::new(engine, view, &settings.abr),
            fetcher,
            catalog_url: settings.catalog.url.clone(),
            videos: Vec::new(),
            events,
            next_session: 0,
            manifest_task: None,
        }
    }

    pub fn controller(&self) -> &Controller<E, V> {
        &self.controller
    }

    /// Loads the catalog, then serves events and sampling ticks until a
    /// `Shutdown` event arrives.
    pub async fn run(mut self, mut rx: UnboundedReceiver<PlayerEvent>) {
        self.load_catalog().await;

        loop {
            let wake = tokio::select! {
                event = rx.recv() => Wake::Event(event),
                _ = self.controller.next_tick() => Wake::Tick,
            };

            match wake {
                Wake::Tick => self.controller.on_tick(Instant::now()),
                Wake::Event(Some(event)) => {
                    if self.handle(event).is_break() {
                        break;
                    }
                }
                // The player holds a sender itself, so the channel only
                // closes if the loop is torn down from outside.
                Wake::Event(None) => break,
            }
        }

        self.stop();
        info!("player stopped");
    }

    /// Fetches the catalog and starts the first video.
    pub async fn load_catalog(&mut self) {
        let videos = match catalog::load(self.fetcher.as_ref(), &self.catalog_url).await {
            Ok(videos) => videos,
            Err(e) => {
                warn!("{}", e);
                self.controller.view_mut().show_error(&e);
                return;
            }
        };

        self.controller.view_mut().render_videos(&videos);
        let first = videos.first().map(|v| v.id.clone());
        self.videos = videos;
        if let Some(first) = first {
            self.select_video(&first);
        }
    }

    pub fn handle(&mut self, event: PlayerEvent) -> ControlFlow<()> {
        match event {
            PlayerEvent::SelectVideo(id) => self.select_video(&id),
            PlayerEvent::SelectQuality(id) => self.controller.select_quality(&id),
            PlayerEvent::SelectAuto => self.controller.select_auto(),
            PlayerEvent::ManifestLoaded { session, result } => {
                self.controller.on_manifest(session, result)
            }
            PlayerEvent::Engine { session, event } => {
                self.controller.on_engine_event(session, event)
            }
            PlayerEvent::Shutdown => return ControlFlow::Break(()),
        }

        ControlFlow::Continue(())
    }

    fn select_video(&mut self, id: &str) {
        if self
            .controller
            .session()
            .is_some_and(|s| s.video().id == id)
        {
            return;
        }
        let Some(video) = self.videos.iter().find(|v| v.id == id).cloned() else {
            warn!("video {}: not in catalog", id);
            return;
        };

        if let Some(task) = self.manifest_task.take() {
            task.abort();
        }
        self.next_session += 1;
        let session = self.next_session;

        self.controller.view_mut().mark_video(id);
        let notifier = EngineNotifier::new(session, self.events.clone());
        if self.controller.begin(session, video.clone(), notifier).is_err() {
            return;
        }

        self.manifest_task = Some(tokio::spawn(fetch_manifest(
            self.fetcher.clone(),
            video.stream_url,
            session,
            self.events.clone(),
        )));
    }

    fn stop(&mut self) {
        if let Some(task) = self.manifest_task.take() {
            task.abort();
        }
        self.controller.end();
    }
}

async fn fetch_manifest(
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    url: String,
    session: u64,
    events: UnboundedSender<PlayerEvent>,
) {
    info!("fetching manifest {}", url);
    let result = match fetcher.get(&url).await {
        Ok(body) => match std::str::from_utf8(&body) {
            Ok(text) => Ladder::parse(text),
            Err(e) => Err(PlayerError::ManifestParseError(e.to_string())),
        },
        Err(e) => Err(PlayerError::ManifestFetchError(e.to_string())),
    };

    let _ = events.send(PlayerEvent::ManifestLoaded { session, result });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, MapFetcher, RecordingEngine, RecordingView, Shown};
    use crate::view::QualityLabel;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const CATALOG_URL: &str = "http://localhost:8080/videos";
    const CATALOG: &str = r#"[
        {"id":"1","title":"video1","stream_url":"http://localhost:8081/stream/video1/stream.mpd"},
        {"id":"2","title":"video2","stream_url":"http://localhost:8081/stream/video2/stream.mpd"}
    ]"#;
    const MANIFEST: &str = r#"<MPD><Period><AdaptationSet contentType="video">
        <Representation id="0" mimeType="video/mp4" height="1080" bandwidth="4500000"/>
        <Representation id="1" mimeType="video/mp4" height="240" bandwidth="400000"/>
    </AdaptationSet></Period></MPD>"#;

    type TestPlayer = Player<RecordingEngine, RecordingView>;

    fn player(fetcher: MapFetcher) -> (TestPlayer, UnboundedReceiver<PlayerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let player = Player::new(
            &Settings::default(),
            RecordingEngine::default(),
            RecordingView::default(),
            Arc::new(fetcher),
            tx,
        );
        (player, rx)
    }

    fn full_fetcher() -> MapFetcher {
        MapFetcher::default()
            .with(CATALOG_URL, CATALOG)
            .with("http://localhost:8081/stream/video1/stream.mpd", MANIFEST)
            .with("http://localhost:8081/stream/video2/stream.mpd", MANIFEST)
    }

    async fn next_manifest(rx: &mut UnboundedReceiver<PlayerEvent>, id: u64) -> PlayerEvent {
        loop {
            let event = rx.recv().await.unwrap();
            if matches!(event, PlayerEvent::ManifestLoaded { session, .. } if session == id) {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn first_video_autoplays() {
        let (mut player, mut rx) = player(full_fetcher());
        player.load_catalog().await;

        let shown = player.controller().view().shown();
        assert_eq!(shown[0], Shown::Videos(vec!["1".to_string(), "2".to_string()]));
        assert!(shown.contains(&Shown::NowPlaying("video1".to_string())));
        assert_eq!(
            player.controller().engine().calls(),
            vec![Call::Initialize(
                "http://localhost:8081/stream/video1/stream.mpd".to_string()
            )]
        );

        let event = next_manifest(&mut rx, 1).await;
        player.handle(event);
        assert_eq!(
            player.controller().view().qualities(),
            Some(vec!["0".to_string(), "1".to_string()])
        );
        assert_eq!(
            player.controller().view().label(),
            Some(QualityLabel::Adapting)
        );
    }

    #[tokio::test]
    async fn catalog_failure_is_shown() {
        let (mut player, _rx) = player(MapFetcher::default());
        player.load_catalog().await;
        assert!(player.controller().session().is_none());
        assert!(matches!(
            player.controller().view().errors().as_slice(),
            [PlayerError::CatalogFetchError(_)]
        ));
    }

    #[tokio::test]
    async fn empty_catalog_is_shown() {
        let (mut player, _rx) = player(MapFetcher::default().with(CATALOG_URL, "[]"));
        player.load_catalog().await;
        assert!(player.controller().session().is_none());
        assert_eq!(player.controller().view().errors().len(), 1);
    }

    #[tokio::test]
    async fn manifest_fetch_failure_disables_qualities() {
        let fetcher = MapFetcher::default().with(CATALOG_URL, CATALOG);
        let (mut player, mut rx) = player(fetcher);
        player.load_catalog().await;

        let event = next_manifest(&mut rx, 1).await;
        player.handle(event);
        assert!(matches!(
            player.controller().view().errors().as_slice(),
            [PlayerError::ManifestFetchError(_)]
        ));
        assert_eq!(player.controller().view().qualities(), Some(vec![]));
        assert!(player.controller().session().is_some());
    }

    #[tokio::test]
    async fn reselecting_current_video_is_noop() {
        let (mut player, _rx) = player(full_fetcher());
        player.load_catalog().await;
        player.handle(PlayerEvent::SelectVideo("1".to_string()));
        assert_eq!(player.controller().session().unwrap().id(), 1);
        assert_eq!(player.controller().engine().calls().len(), 1);
    }

    #[tokio::test]
    async fn switching_video_replaces_session() {
        let (mut player, mut rx) = player(full_fetcher());
        player.load_catalog().await;
        player.handle(PlayerEvent::SelectVideo("2".to_string()));

        let session = player.controller().session().unwrap();
        assert_eq!(session.id(), 2);
        assert_eq!(session.video().title, "video2");
        assert_eq!(
            player.controller().engine().calls(),
            vec![
                Call::Initialize("http://localhost:8081/stream/video1/stream.mpd".to_string()),
                Call::Destroy,
                Call::Initialize("http://localhost:8081/stream/video2/stream.mpd".to_string()),
            ]
        );

        // Only the manifest of the live session is applied.
        player.handle(PlayerEvent::ManifestLoaded {
            session: 1,
            result: Ladder::parse(MANIFEST),
        });
        assert!(player.controller().session().unwrap().ladder().is_empty());

        let event = next_manifest(&mut rx, 2).await;
        player.handle(event);
        assert_eq!(player.controller().session().unwrap().ladder().len(), 2);
    }

    #[tokio::test]
    async fn unknown_video_is_ignored() {
        let (mut player, _rx) = player(full_fetcher());
        player.load_catalog().await;
        player.handle(PlayerEvent::SelectVideo("42".to_string()));
        assert_eq!(player.controller().session().unwrap().id(), 1);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = RecordingEngine::default();
        let log = engine.log.clone();
        let player = Player::new(
            &Settings::default(),
            engine,
            RecordingView::default(),
            Arc::new(full_fetcher()),
            tx.clone(),
        );

        tx.send(PlayerEvent::Shutdown).unwrap();
        player.run(rx).await;
        assert_eq!(log.borrow().last(), Some(&Call::Destroy));
    }

    #[tokio::test(start_paused = true)]
    async fn run_samples_throughput_every_period() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut engine = RecordingEngine::default();
        engine.set_rate(2000);
        let log = engine.log.clone();
        let player = Player::new(
            &Settings::default(),
            engine,
            RecordingView::default(),
            Arc::new(full_fetcher()),
            tx,
        );
        let switched = |log: &std::rc::Rc<std::cell::RefCell<Vec<Call>>>| {
            log.borrow()
                .iter()
                .any(|call| matches!(call, Call::Select(_)))
        };

        let run = player.run(rx);
        tokio::pin!(run);
        let early = tokio::time::timeout(Duration::from_millis(999), &mut run).await;
        assert!(early.is_err());
        assert!(!switched(&log), "no sample before the first period");

        let _ = tokio::time::timeout(Duration::from_millis(2), &mut run).await;
        let calls = log.borrow().clone();
        let n = calls.len();
        assert_eq!(calls[n - 2], Call::Select("1".to_string()));
        assert!(matches!(calls[n - 1], Call::Seek(_)));
    }

    #[test]
    fn parse_commands() {
        assert!(matches!(
            PlayerEvent::parse_command("video 2"),
            Ok(Some(PlayerEvent::SelectVideo(id))) if id == "2"
        ));
        assert!(matches!(
            PlayerEvent::parse_command("quality 720"),
            Ok(Some(PlayerEvent::SelectQuality(id))) if id == "720"
        ));
        assert!(matches!(
            PlayerEvent::parse_command("quality auto"),
            Ok(Some(PlayerEvent::SelectAuto))
        ));
        assert!(matches!(
            PlayerEvent::parse_command("  auto "),
            Ok(Some(PlayerEvent::SelectAuto))
        ));
        assert!(matches!(
            PlayerEvent::parse_command("quit"),
            Ok(Some(PlayerEvent::Shutdown))
        ));
        assert!(matches!(PlayerEvent::parse_command("   "), Ok(None)));
        assert!(PlayerEvent::parse_command("video").is_err());
        assert!(PlayerEvent::parse_command("video 1 2").is_err());
        assert!(PlayerEvent::parse_command("rewind").is_err());
    }
}
