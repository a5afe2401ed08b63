use bytes::Bytes;
use std::fmt::Debug;

use crate::error::Result;

mod rust;

pub use rust::RustCryptoProvider;

#[allow(non_camel_case_types)]
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub enum HashScheme {
    #[default]
    SHA256,
}

#[allow(non_camel_case_types)]
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub enum KdfScheme {
    #[default]
    HKDF_SHA256,
}

#[allow(non_camel_case_types)]
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub enum AeadScheme {
    #[default]
    /// AES-128 block cipher in Galois Counter Mode (GCM).
    AES128GCM,
}

/// Digest used to chain roster entries.
pub trait Hash: Send + Sync {
    fn size(&self) -> usize;

    fn digest(&self, data: &[u8]) -> Bytes;

    /// An all-zero value as long as a digest. The first entry of every
    /// roster chains to it.
    fn zero(&self) -> Bytes {
        Bytes::from(vec![0u8; self.size()])
    }
}

pub trait Kdf: Send + Sync {
    /// Extract-then-expand: `length` bytes derived from `ikm` under `salt`
    /// and bound to `info`.
    fn derive(&self, salt: &[u8], ikm: &[u8], info: &[u8], length: usize) -> Result<Bytes>;
}

pub trait Aead: Send + Sync {
    fn key_size(&self) -> usize;

    fn nonce_size(&self) -> usize;

    fn seal(
        &self,
        key: &[u8],
        nonce: &[u8],
        plaintext: &[u8],
        additional_data: &[u8],
    ) -> Result<Bytes>;

    fn open(
        &self,
        key: &[u8],
        nonce: &[u8],
        ciphertext: &[u8],
        additional_data: &[u8],
    ) -> Result<Bytes>;
}

pub trait CryptoProvider: Send + Sync + Debug {
    fn hash(&self) -> &dyn Hash;

    fn kdf(&self) -> &dyn Kdf;

    fn aead(&self) -> &dyn Aead;
}
