//! Durable credential backends.

pub mod file;

pub use file::FileCredentialStorage;
