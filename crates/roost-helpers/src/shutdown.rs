use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Cancels the token when the process receives SIGTERM or SIGINT.
pub async fn listen_shutdown(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let handlers = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        );
        match handlers {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        warn!("shutdown signal received: SIGTERM");
                    }
                    _ = sigint.recv() => {
                        warn!("shutdown signal received: SIGINT");
                    }
                }
                token.cancel();
                return;
            }
            _ => {
                warn!("unix signal handlers unavailable: falling back to ctrl-c");
            }
        }
    }

    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("shutdown signal received: SIGINT");
        token.cancel();
    }
}
