mod aead;
mod hash;
mod kdf;


use self::aead::AeadSchemeWrapper;
use self::hash::HashSchemeWrapper;
use self::kdf::KdfSchemeWrapper;
use super::{Aead, CryptoProvider, Hash, Kdf};

/// [RustCrypto](https://github.com/RustCrypto) based crypto provider:
/// SHA-256, HKDF-SHA256 and AES-128-GCM.
#[derive(Default, Debug, Clone, Copy)]
pub struct RustCryptoProvider {
    hash: HashSchemeWrapper,
    kdf: KdfSchemeWrapper,
    aead: AeadSchemeWrapper,
}

impl CryptoProvider for RustCryptoProvider {
    fn hash(&self) -> &dyn Hash {
        &self.hash
    }

    fn kdf(&self) -> &dyn Kdf {
        &self.kdf
    }

    fn aead(&self) -> &dyn Aead {
        &self.aead
    }
}
