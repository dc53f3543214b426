//! Graceful shutdown on SIGINT and SIGTERM.

use tokio_util::sync::CancellationToken;

/// Cancels its token when the process is asked to stop.
pub struct SigDown {
    token: CancellationToken,
}

impl SigDown {
    pub fn try_new() -> std::io::Result<Self> {
        let token = CancellationToken::new();
        let trigger = token.clone();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut interrupt = signal(SignalKind::interrupt())?;
            let mut terminate = signal(SignalKind::terminate())?;
            tokio::spawn(async move {
                tokio::select! {
                    _ = interrupt.recv() => tracing::info!("SIGINT received, shutting down"),
                    _ = terminate.recv() => tracing::info!("SIGTERM received, shutting down"),
                }
                trigger.cancel();
            });
        }

        #[cfg(not(unix))]
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl-C received, shutting down");
            }
            trigger.cancel();
        });

        Ok(Self { token })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}
