//! The symmetric primitives used by rosters and chat logs.
//!
//! Signing and key agreement belong to identities (see [`crate::identity`]);
//! everything else is reached through a [`CryptoProvider`].
pub mod provider;
pub mod rng;

pub use provider::{Aead, CryptoProvider, Hash, Kdf, RustCryptoProvider};
