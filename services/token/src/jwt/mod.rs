//! Signed token claims and codec.

pub mod claims;
pub mod codec;

pub use claims::CredentialClaims;
pub use codec::{CredentialCodec, SigningSecret};
