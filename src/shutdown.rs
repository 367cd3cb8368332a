use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Cancels the returned token on SIGTERM or SIGINT.
///
/// This is the only way to stop a job in flight; there is no per-job cancel.
pub fn install_shutdown_handler(role: &'static str) -> std::io::Result<CancellationToken> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!(role, "Received SIGTERM, shutting down"),
            _ = sigint.recv() => tracing::info!(role, "Received SIGINT, shutting down"),
        }
        trigger.cancel();
    });

    Ok(token)
}
