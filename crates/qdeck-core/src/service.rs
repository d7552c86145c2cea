//! Lifecycle tracking for the background loops.
//!
//! The reply listener and the request worker each own a
//! [`ServiceHandle`]; the broker's health endpoint and the integration
//! tests read it to learn whether the loop is pulling yet.
//!
//! ```rust
//! use qdeck_core::service::{ServiceHandle, ServiceState};
//!
//! let handle = ServiceHandle::new("reply-listener");
//! handle.set_state(ServiceState::Ready);
//! assert!(handle.state().is_ready());
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Where a background loop is in its lifecycle.
///
/// `Ready` means the loop has completed at least one successful pull;
/// everything else reads as unavailable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceState {
    /// The loop is not running.
    Stopped,
    /// The loop is up but has not pulled successfully yet.
    Starting,
    /// The loop is pulling.
    Ready,
    /// Shutdown was requested and the loop is draining.
    Stopping,
}

impl ServiceState {
    /// Returns `true` when the loop is pulling.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Stopping => "stopping",
        };
        f.write_str(label)
    }
}

/// Shared view of one background loop's [`ServiceState`].
///
/// Clones observe the same loop; updates broadcast over a watch
/// channel so waiters wake without polling.
#[derive(Clone, Debug)]
pub struct ServiceHandle {
    name: Arc<str>,
    tx: Arc<watch::Sender<ServiceState>>,
}

impl ServiceHandle {
    /// A handle for the named loop, starting out [`ServiceState::Stopped`].
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        let (tx, _rx) = watch::channel(ServiceState::Stopped);
        Self {
            name: name.into(),
            tx: Arc::new(tx),
        }
    }

    /// The current state.
    pub fn state(&self) -> ServiceState {
        *self.tx.borrow()
    }

    /// Records a transition and wakes any waiters.
    pub fn set_state(&self, state: ServiceState) {
        tracing::info!(service = %self.name, state = %state, "Service state changed");
        self.tx.send_replace(state);
    }

    /// Waits until the loop reports [`ServiceState::Ready`].
    ///
    /// Errors with a description of the stuck state when `timeout`
    /// passes first.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), String> {
        let mut rx = self.tx.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|state| state.is_ready())).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(format!("{} state channel closed", self.name)),
            Err(_) => Err(format!(
                "{} not ready after {timeout:?}, still {}",
                self.name,
                self.state()
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_state_labels() {
        assert_eq!(ServiceState::Stopped.to_string(), "stopped");
        assert_eq!(ServiceState::Starting.to_string(), "starting");
        assert_eq!(ServiceState::Ready.to_string(), "ready");
        assert_eq!(ServiceState::Stopping.to_string(), "stopping");
        assert!(ServiceState::Ready.is_ready());
        assert!(!ServiceState::Stopping.is_ready());
    }

    #[test]
    fn test_new_handle_is_stopped() {
        let handle = ServiceHandle::new("request-worker");
        assert_eq!(handle.state(), ServiceState::Stopped);
    }

    #[test]
    fn test_clones_observe_the_same_loop() {
        let handle = ServiceHandle::new("reply-listener");
        let observer = handle.clone();

        handle.set_state(ServiceState::Starting);
        handle.set_state(ServiceState::Ready);
        assert_eq!(observer.state(), ServiceState::Ready);

        observer.set_state(ServiceState::Stopping);
        assert_eq!(handle.state(), ServiceState::Stopping);
    }

    #[tokio::test]
    async fn test_wait_ready_returns_once_pulling() {
        let handle = ServiceHandle::new("reply-listener");
        let background = handle.clone();

        tokio::spawn(async move {
            background.set_state(ServiceState::Starting);
            tokio::time::sleep(Duration::from_millis(10)).await;
            background.set_state(ServiceState::Ready);
        });

        handle.wait_ready(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_ready_on_an_already_ready_loop() {
        let handle = ServiceHandle::new("request-worker");
        handle.set_state(ServiceState::Ready);
        handle.wait_ready(Duration::from_millis(20)).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_ready_reports_the_stuck_state() {
        let handle = ServiceHandle::new("reply-listener");
        handle.set_state(ServiceState::Starting);

        let err = handle.wait_ready(Duration::from_millis(20)).await.unwrap_err();
        assert!(err.contains("reply-listener"));
        assert!(err.contains("starting"));
    }
}
