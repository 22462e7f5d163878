use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// One-shot stop flag shared between the signal listener, the accept loop
/// and a producer session's inbound pump. Once signaled it stays signaled.
#[derive(Clone, Default)]
pub struct ShutdownHandle {
    signaled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.signaled.load(Ordering::SeqCst)
    }

    /// Returns true for the call that flipped the flag.
    pub fn signal(&self) -> bool {
        let first = !self.signaled.swap(true, Ordering::SeqCst);
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    pub async fn wait(&self) {
        // Register with Notify before reading the flag; a signal landing in
        // between would otherwise find no waiter.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_shutting_down() {
            return;
        }
        notified.await;
    }
}

/// Signals `handle` on Ctrl-C (and SIGTERM on Unix).
pub fn install_signal_handlers(handle: ShutdownHandle) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = term.recv() => {}
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "SIGTERM handler unavailable");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        if handle.signal() {
            tracing::info!("Shutdown signal received");
        }
    });
}
