//! Credential ownership and refresh.
//!
//! - [`token_store`]: the single owner of the current credential
//! - [`refresh`]: single-flight refresh with FIFO replay of waiting requests
//! - [`storage`]: key layout shared by storage backends, in-memory backend
//! - [`ports`]: storage and refresh-endpoint interfaces

pub mod ports;
pub mod refresh;
pub mod storage;
pub mod token_store;
