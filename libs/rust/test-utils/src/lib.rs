//! Shared test utilities for auth-platform Rust services.
//!
//! Proptest generators for subjects, client addresses and token lifetimes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod generators;

pub use generators::*;
