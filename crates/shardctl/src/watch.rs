//! Registry change notification
//!
//! Publishes the registry version on a `tokio::sync::watch` channel. Waiters
//! hold a receiver only for the duration of their wait, so nothing is retained
//! for a version that is never reached.

use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Registry version publisher
pub struct RegistryWatcher {
    tx: watch::Sender<u64>,
}

impl Default for RegistryWatcher {
    fn default() -> Self {
        Self::new(0)
    }
}

impl RegistryWatcher {
    pub fn new(version: u64) -> Self {
        let (tx, _) = watch::channel(version);
        Self { tx }
    }

    /// Last published version
    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Publish a new version; older or equal versions are ignored
    pub fn publish(&self, version: u64) {
        let advanced = self.tx.send_if_modified(|current| {
            if version > *current {
                *current = version;
                true
            } else {
                false
            }
        });
        if advanced {
            debug!("Published registry version {}", version);
        }
    }

    /// Wait up to `wait` for a version newer than `known`
    ///
    /// Returns the latest published version, which equals `known` or less if
    /// nothing changed in time.
    pub async fn wait_newer(&self, known: u64, wait: Duration) -> u64 {
        let mut rx = self.tx.subscribe();
        let _ = tokio::time::timeout(wait, rx.wait_for(|v| *v > known)).await;
        let version = *rx.borrow();
        version
    }

    /// Number of clients currently waiting
    pub fn waiters(&self) -> usize {
        self.tx.receiver_count()
    }
}
