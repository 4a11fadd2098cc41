//! # AuthWire Domain
//!
//! Domain types shared by every AuthWire crate.
//!
//! This crate contains:
//! - Credential, session and lifecycle-signal types
//! - Request/response envelopes used by the pipeline ports
//! - The client error taxonomy and Result alias
//! - Configuration structures and defaults
//!
//! ## Architecture
//! - No dependencies on other AuthWire crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
