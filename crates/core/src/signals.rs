//! Lifecycle signal fan-out to the host application.

use authwire_domain::constants::SIGNAL_CHANNEL_CAPACITY;
use authwire_domain::LifecycleSignal;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Broadcast channel for [`LifecycleSignal`]s.
///
/// Emitting never blocks and never fails; with no subscribers the signal is
/// dropped. Slow subscribers observe `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct LifecycleSignals {
    tx: broadcast::Sender<LifecycleSignal>,
}

impl Default for LifecycleSignals {
    fn default() -> Self {
        Self::new(SIGNAL_CHANNEL_CAPACITY)
    }
}

impl LifecycleSignals {
    /// Channel buffering up to `capacity` signals per slow subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receive every signal emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleSignal> {
        self.tx.subscribe()
    }

    /// Broadcast `signal`; dropped when nobody listens.
    pub fn emit(&self, signal: LifecycleSignal) {
        info!(signal = signal.name(), "lifecycle signal");
        if self.tx.send(signal).is_err() {
            debug!("lifecycle signal dropped: no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use authwire_domain::{ExpiryReason, RefreshFailure};

    use super::*;

    #[tokio::test]
    async fn subscribers_receive_signals_in_order() {
        let signals = LifecycleSignals::default();
        let mut rx = signals.subscribe();

        signals.emit(LifecycleSignal::RefreshFailed { reason: RefreshFailure::Rejected { status: 401 } });
        signals.emit(LifecycleSignal::SessionExpired { reason: ExpiryReason::Absolute });

        assert!(matches!(rx.recv().await.unwrap(), LifecycleSignal::RefreshFailed { .. }));
        assert!(matches!(rx.recv().await.unwrap(), LifecycleSignal::SessionExpired { .. }));
    }

    #[test]
    fn emit_without_subscribers_is_harmless() {
        let signals = LifecycleSignals::new(0);
        signals.emit(LifecycleSignal::SessionExpired { reason: ExpiryReason::Idle });
    }
}
