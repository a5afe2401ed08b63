use bytes::Bytes;
use hkdf::Hkdf;
use sha2::Sha256;

use crate::crypto::provider::KdfScheme;
use crate::error::{Error, Result};

#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub(super) struct KdfSchemeWrapper(pub(super) KdfScheme);

impl crate::crypto::provider::Kdf for KdfSchemeWrapper {
    fn derive(&self, salt: &[u8], ikm: &[u8], info: &[u8], length: usize) -> Result<Bytes> {
        let mut out = vec![0u8; length];

        match self.0 {
            KdfScheme::HKDF_SHA256 => {
                let salt = (!salt.is_empty()).then_some(salt);
                Hkdf::<Sha256>::new(salt, ikm)
                    .expand(info, &mut out)
                    .map_err(|err| Error::CryptoError(err.to_string()))?;
            }
        };

        Ok(Bytes::from(out))
    }
}
