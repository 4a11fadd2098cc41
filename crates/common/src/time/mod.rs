//! Wall-clock abstraction.
//!
//! Credential expiry and session deadlines are wall-clock timestamps, so the
//! clock hands out `DateTime<Utc>` rather than monotonic instants.

pub mod clock;

pub use clock::{Clock, SharedClock, SystemClock};
