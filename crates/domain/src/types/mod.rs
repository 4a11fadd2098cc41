//! Domain types and models

pub mod credential;
pub mod http;
pub mod session;
pub mod signals;

pub use credential::{Credential, RefreshGrant};
pub use http::{ApiRequest, ApiResponse, Classification, HttpMethod};
pub use session::{ExpiryReason, SessionClock, SessionState};
pub use signals::LifecycleSignal;
