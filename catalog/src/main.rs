mod api;
mod config;
mod errors;
mod library;

use crate::api::http::server::start_listener;
use crate::api::http::service::{LibraryService, Role};
use crate::config::Setting;
use crate::errors::ServerError;
use crate::library::Library;
use clap::Parser as ClapParser;
use std::fs;
use std::process;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

#[derive(ClapParser, Debug)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "catalog.toml")]
    config: String,
}

fn main() {
    // Initialize tracing
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

    let args = Cli::parse();
    let setting = match setting(&args) {
        Ok(setting) => setting,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    let runtime = match common::runtime::build(setting.runtime.threads) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create runtime: {}", e);
            process::exit(1);
        }
    };

    runtime.block_on(start(setting));
    info!("done");
}

fn setting(args: &Cli) -> Result<Setting, ServerError> {
    let data = fs::read_to_string(args.config.as_str()).map_err(|_| {
        ServerError::ConfigError(format!("config file '{}' does not exist", args.config))
    })?;
    Setting::from_toml(&data)
}

async fn start(setting: Setting) {
    info!("library: {} served at {}", setting.library.path, setting.library.public_url);
    let library = Arc::new(Library::new(&setting.library));

    let notifier = Arc::new(Notify::new());
    common::systemd::run(notifier.clone());

    let mut set = JoinSet::new();
    let listeners = [
        ("catalog", setting.catalog.addr, Role::Catalog),
        ("stream", setting.stream.addr, Role::Stream),
    ];
    for (name, addr, role) in listeners {
        let service = LibraryService::new(Arc::clone(&library), role);
        let notifier_clone = notifier.clone();
        set.spawn(async move {
            let result = start_listener(name, notifier_clone.clone(), addr, service).await;
            if let Err(e) = result {
                notifier_clone.notify_waiters();
                error!("{} server: {}", name, e);
            }
        });
    }

    set.join_all().await;
}
