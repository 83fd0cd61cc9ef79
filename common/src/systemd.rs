use sd_notify::NotifyState;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::{error, info};

/// Reports readiness to systemd and wakes `notifier` waiters on the first
/// termination signal.
pub fn run(notifier: Arc<Notify>) {
    watch_signals(notifier);
    tokio::spawn(async move {
        // @todo make it configurable
        sleep(Duration::from_secs(1)).await;
        let r = sd_notify::notify(false, &[NotifyState::Ready]);
        if let Err(e) = r {
            error!("notify ready: {}", e);
        }
    });
}

/// Wakes `notifier` waiters on the first termination signal without talking
/// to systemd.
pub fn watch_signals(notifier: Arc<Notify>) {
    tokio::spawn(handle_signals(notifier));
}

async fn handle_signals(notifier: Arc<Notify>) {
    let (mut interrupt, mut terminate, mut quit, mut hup) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
        signal(SignalKind::hangup()),
    ) {
        (Ok(interrupt), Ok(terminate), Ok(quit), Ok(hup)) => (interrupt, terminate, quit, hup),
        _ => {
            error!("unable to install signal handlers");
            return;
        }
    };

    tokio::select! {
        _ = interrupt.recv() => {
            info!("received interrupt signal");
        },
        _ = hup.recv() => {
            info!("received hup signal");
        },
        _ = terminate.recv() => {
            info!("received terminate signal");
        },
        _ = quit.recv() => {
            info!("received quit signal");
        },
    }

    let _ = sd_notify::notify(true, &[NotifyState::Stopping]);
    notifier.notify_waiters();
}
