// ABOUTME: Cooperative cancellation for long-running deploy steps.
// ABOUTME: SIGINT/SIGTERM flip a watch channel that the health poll selects on.

use tokio::sync::watch;

/// Receiving side of a shutdown signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Sending side of a shutdown signal.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Shutdown {
    /// A signal that never fires.
    pub fn never() -> Self {
        channel().1
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal fires. Never resolves if the trigger is gone.
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Spawn a task that fires the returned signal on SIGINT or SIGTERM.
pub fn listen_for_signals() -> Shutdown {
    let (trigger, shutdown) = channel();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });
    shutdown
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("SIGTERM received, cancelling"),
                    _ = tokio::signal::ctrl_c() => tracing::info!("SIGINT received, cancelling"),
                }
            }
            Err(e) => {
                tracing::warn!("cannot install SIGTERM handler: {}", e);
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("SIGINT received, cancelling");
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, cancelling");
        }
    }
}
