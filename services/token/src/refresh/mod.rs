//! Refresh token hashing and rotation.

pub mod hasher;
pub mod rotator;

pub use hasher::SecretHasher;
pub use rotator::{ManagerParams, TokenClass, TokenLifecycleManager, TokenPair};
