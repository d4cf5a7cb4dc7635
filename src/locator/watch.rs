//! Generic "wait until a condition holds" primitive.
//!
//! Probes on a fixed interval and also immediately after any change
//! notification, until the probe succeeds, an optional timeout elapses, or the
//! cancellation token fires. Knows nothing about UI toolkits.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, MissedTickBehavior};

/// Cooperative cancellation shared between an owner and its background work.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Floor applied to `WatchPolicy::interval`.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Retry cadence and give-up point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchPolicy {
    pub interval: Duration,
    /// `None` means poll until cancelled.
    pub timeout: Option<Duration>,
}

/// How a watch ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchOutcome<T> {
    Ready(T),
    TimedOut,
    Cancelled,
}

async fn next_change<C: Clone>(changes: &mut Option<broadcast::Receiver<C>>) {
    match changes {
        Some(rx) => match rx.recv().await {
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => {
                *changes = None;
            }
        },
        None => std::future::pending::<()>().await,
    }
}

/// Probe until `probe` yields a value.
pub async fn watch_for<T, C, F>(
    mut probe: F,
    policy: WatchPolicy,
    mut changes: Option<broadcast::Receiver<C>>,
    cancel: &CancelToken,
) -> WatchOutcome<T>
where
    C: Clone,
    F: FnMut() -> Option<T>,
{
    let deadline = policy.timeout.map(|t| Instant::now() + t);
    let mut ticker = tokio::time::interval(policy.interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; the probe below already covers it.
    ticker.tick().await;

    loop {
        if cancel.is_cancelled() {
            return WatchOutcome::Cancelled;
        }
        if let Some(value) = probe() {
            return WatchOutcome::Ready(value);
        }

        let expiry = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => return WatchOutcome::Cancelled,
            _ = expiry => {
                return match probe() {
                    Some(value) => WatchOutcome::Ready(value),
                    None => WatchOutcome::TimedOut,
                };
            }
            _ = ticker.tick() => {}
            _ = next_change(&mut changes) => {}
        }
    }
}
