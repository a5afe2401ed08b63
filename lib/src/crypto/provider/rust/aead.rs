use aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use bytes::Bytes;

use crate::crypto::provider::AeadScheme;
use crate::error::{Error, Result};

#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub(super) struct AeadSchemeWrapper(pub(super) AeadScheme);

impl AeadSchemeWrapper {
    fn cipher(&self, key: &[u8], nonce: &[u8]) -> Result<Aes128Gcm> {
        use crate::crypto::provider::Aead;

        if key.len() != self.key_size() || nonce.len() != self.nonce_size() {
            return Err(Error::InvalidLength);
        }

        match self.0 {
            AeadScheme::AES128GCM => {
                Aes128Gcm::new_from_slice(key).map_err(|err| Error::CryptoError(err.to_string()))
            }
        }
    }
}

impl crate::crypto::provider::Aead for AeadSchemeWrapper {
    fn key_size(&self) -> usize {
        match self.0 {
            AeadScheme::AES128GCM => 16,
        }
    }

    fn nonce_size(&self) -> usize {
        match self.0 {
            AeadScheme::AES128GCM => 12,
        }
    }

    fn seal(
        &self,
        key: &[u8],
        nonce: &[u8],
        plaintext: &[u8],
        additional_data: &[u8],
    ) -> Result<Bytes> {
        let cipher = self.cipher(key, nonce)?;
        let mut in_out = plaintext.to_vec();
        cipher
            .encrypt_in_place(Nonce::from_slice(nonce), additional_data, &mut in_out)
            .map_err(|err| Error::CryptoError(err.to_string()))?;

        Ok(Bytes::from(in_out))
    }

    fn open(
        &self,
        key: &[u8],
        nonce: &[u8],
        ciphertext: &[u8],
        additional_data: &[u8],
    ) -> Result<Bytes> {
        let cipher = self.cipher(key, nonce)?;
        let mut in_out = ciphertext.to_vec();
        cipher
            .decrypt_in_place(Nonce::from_slice(nonce), additional_data, &mut in_out)
            .map_err(|err| Error::CryptoError(err.to_string()))?;

        Ok(Bytes::from(in_out))
    }
}
