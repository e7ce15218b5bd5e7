//! Token Service library.
//!
//! Issues access/refresh token pairs and rotates refresh tokens under a
//! one-time-use protocol backed by a transactional credential store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod http;
pub mod jwt;
pub mod metrics;
pub mod notify;
pub mod refresh;
pub mod storage;
pub mod telemetry;

// Re-exports for convenience
pub use config::Config;
pub use error::TokenError;
pub use refresh::{TokenLifecycleManager, TokenPair};
