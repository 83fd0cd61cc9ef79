use clap::Parser as ClapParser;
use player::config::Settings;
use player::engine::simulated::SimulatedEngine;
use player::error::PlayerError;
use player::fetch::HttpFetcher;
use player::player::{Player, PlayerEvent};
use player::view::LogView;
use std::sync::Arc;
use std::time::Duration;
use std::{fs, process};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Notify};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

#[derive(ClapParser, Debug)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "player.toml")]
    config: String,
}

fn main() {
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::Layer::default()
                .with_target(false)
                .with_thread_names(false)
                .with_ansi(true)
                .with_line_number(false)
                .with_file(false)
                .with_thread_ids(false),
        );
    tracing::subscriber::set_global_default(subscriber)
        .expect("Unable to set a global logger instance");

    let cli = Cli::parse();
    let settings = match build_settings(cli.config.as_str()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let runtime = match common::runtime::build_local() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create runtime: {}", e);
            process::exit(1);
        }
    };

    runtime.block_on(run(settings));
    // The stdin reader sits in a blocking read until the next line arrives.
    runtime.shutdown_timeout(Duration::from_millis(100));
    info!("done");
}

async fn run(settings: Settings) {
    let (tx, rx) = mpsc::unbounded_channel();

    let notifier = Arc::new(Notify::new());
    common::systemd::watch_signals(notifier.clone());
    let shutdown = tx.clone();
    tokio::spawn(async move {
        notifier.notified().await;
        let _ = shutdown.send(PlayerEvent::Shutdown);
    });

    let commands = tx.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match PlayerEvent::parse_command(&line) {
                Ok(Some(event)) => {
                    if commands.send(event).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("{} (try: video <id>, quality <id>, auto, quit)", e),
            }
        }
    });

    let engine = SimulatedEngine::new(&settings.simulation);
    let fetcher = Arc::new(HttpFetcher::new(settings.network.fetch_timeout));
    let player = Player::new(&settings, engine, LogView::default(), fetcher, tx);
    player.run(rx).await;
}

fn build_settings(config_path: &str) -> Result<Settings, PlayerError> {
    let data = fs::read_to_string(config_path).map_err(|_| {
        PlayerError::ConfigError(format!("Config file '{}' does not exist", config_path))
    })?;

    Settings::from_toml(&data)
}
