use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// Production code uses [`SystemClock`]; tests drive time by hand with
/// `testing::MockClock`.
pub trait Clock: Send + Sync + 'static {
    /// Current wall-clock time in UTC
    fn now(&self) -> DateTime<Utc>;

    /// Milliseconds since the UNIX epoch
    fn millis_since_epoch(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Clock shared between the token store, the pipeline and the monitor.
pub type SharedClock = Arc<dyn Clock>;

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Implement Clock for Arc<T> where T: Clock for convenient cloning
impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_tracks_utc_now() {
        let before = Utc::now();
        let now = SystemClock.now();
        let after = Utc::now();
        assert!(before <= now && now <= after);
        assert!(SystemClock.millis_since_epoch() >= before.timestamp_millis());
    }

    #[test]
    fn shared_handle_delegates_to_inner_clock() {
        let shared: SharedClock = Arc::new(Arc::new(SystemClock));
        let before = Utc::now();
        assert!(shared.now() >= before);
    }
}
