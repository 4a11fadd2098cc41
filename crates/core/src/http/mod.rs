//! Request pipeline
//!
//! - [`dispatcher`]: one attempt with credential injection, hard timeout and
//!   cancellation
//! - [`classify`]: maps responses and transport errors to a classification
//! - [`ports`]: the transport interface

pub mod classify;
pub mod dispatcher;
pub mod ports;
