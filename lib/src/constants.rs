//! Fixed sizes of the wire format and the context strings fed to key derivation.
//!
//! Entries are not length-prefixed, so these sizes are part of the format: a
//! primitive with a different output size is a different wire format.

/// Length of an exported ed25519 verifying key, which is also an identity.
pub const IDENTIFIER_LENGTH: usize = ed25519_dalek::PUBLIC_KEY_LENGTH;

/// Length of an x25519 public key.
pub const SHARE_LENGTH: usize = 32;

pub const SIGNATURE_LENGTH: usize = ed25519_dalek::SIGNATURE_LENGTH;

pub const OPCODE_LENGTH: usize = 1;

pub const POLICY_LENGTH: usize = 1;

/// Info string used when deriving the XOR mask from a key exchange.
pub const MASK_KEY_INFO: &[u8] = b"roster mask key";
