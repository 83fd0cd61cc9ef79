use crate::api::http::service::LibraryService;
use crate::errors::ServerError;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use std::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Serves `service` on `addr` until `notifier` fires, then waits for open
/// connections to drain.
pub async fn start_listener(
    name: &'static str,
    notifier: Arc<Notify>,
    addr: String,
    service: LibraryService,
) -> Result<(), ServerError> {
    let addr = common::socket::parse_address(addr.clone())
        .map_err(|e| ServerError::NetworkError(format!("{}: {}", addr, e)))?;
    let socket = common::socket::listen_reuse_socket(&addr)
        .map_err(|e| ServerError::NetworkError(e.to_string()))?;
    let listener = TcpListener::from_std(socket.into())
        .map_err(|e| ServerError::NetworkError(e.to_string()))?;

    info!("{}: listening on http://{}", name, addr);

    let http = http1::Builder::new();
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let mut signal = pin::pin!(notifier.notified());

    loop {
        tokio::select! {
            Ok((stream, _addr)) = listener.accept() => {
                let io = TokioIo::new(stream);
                let conn = http.serve_connection(io, service.clone());
                let fut = graceful.watch(conn);
                tokio::spawn(async move {
                    if let Err(e) = fut.await {
                        error!("{}: serve: {:?}", name, e);
                    }
                });
            },
            _ = &mut signal => {
                info!("{}: http server: graceful shutdown", name);
                break;
            }
        }
    }

    tokio::select! {
        _ = graceful.shutdown() => {
            info!("{}: http server: all connections gracefully closed", name);
        },
        _ = tokio::time::sleep(SHUTDOWN_GRACE) => {
            info!("{}: timed out wait for all connections to close", name);
        }
    }
    Ok(())
}
