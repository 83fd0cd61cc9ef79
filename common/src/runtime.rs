use std::io;
use tokio::runtime::Runtime;
use tracing::info;

/// Multi-threaded runtime for the HTTP services.
pub fn build(threads: Option<usize>) -> io::Result<Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(threads) = threads {
        info!("custom runtime threads: {}", threads);
        builder.worker_threads(threads);
    }

    builder.build()
}

/// Single-threaded runtime. Everything spawned on it shares one thread, so
/// state touched only from tasks on this runtime needs no locking.
pub fn build_local() -> io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}
