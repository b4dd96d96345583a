//! Cooperative shutdown coordination, grounded on the teacher's
//! `infra-common::lifecycle::component` dependency-ordered shutdown, scaled
//! down to the single broadcast-based signal this daemon needs.

use tokio::sync::watch;

/// Handle used by long-lived tasks (per-call supervisors, socket readers,
/// timer wheel) to learn that the process is shutting down.
#[derive(Clone)]
pub struct ShutdownHandle {
    rx: watch::Receiver<bool>,
}

impl ShutdownHandle {
    /// Resolves once shutdown has been requested.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|v| *v).await;
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Owned by the daemon's main task; dropping it (or calling
/// [`ShutdownController::shutdown`]) signals every outstanding
/// [`ShutdownHandle`].
pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

impl ShutdownController {
    pub fn new() -> (Self, ShutdownHandle) {
        let (tx, rx) = watch::channel(false);
        (ShutdownController { tx }, ShutdownHandle { rx })
    }

    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            rx: self.tx.subscribe(),
        }
    }

    /// Signal shutdown. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_resolves_after_shutdown() {
        let (controller, mut handle) = ShutdownController::new();
        assert!(!handle.is_shutting_down());
        controller.shutdown();
        handle.wait().await;
        assert!(handle.is_shutting_down());
    }

    #[tokio::test]
    async fn new_handles_see_prior_shutdown() {
        let (controller, _h) = ShutdownController::new();
        controller.shutdown();
        let mut late_handle = controller.handle();
        late_handle.wait().await;
        assert!(late_handle.is_shutting_down());
    }
}
