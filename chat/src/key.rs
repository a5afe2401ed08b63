use std::fmt::Debug;

use bytes::Bytes;
use roster::crypto::rng::random_key;
use roster::crypto::CryptoProvider;
use roster::Identifier;

use crate::error::{ChatError, Result};

pub const KEY_ID_LENGTH: usize = 16;
const KEY_ID_INFO: &[u8] = b"keyid";
const NONCE_INFO: &[u8] = b"nonce";

/// A symmetric chat key and its public identifier.
///
/// The identifier is derived from the key and the agent that generated it,
/// so receivers can tell keys apart without learning anything about them.
#[derive(Clone)]
pub struct ChatKey {
    id: Bytes,
    key: Bytes,
}

impl Debug for ChatKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatKey")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl ChatKey {
    pub fn generate(provider: &dyn CryptoProvider, rekeyer: &Identifier) -> Result<Self> {
        let key = random_key(provider.aead().key_size());
        Self::from_raw(provider, rekeyer, Bytes::from(key))
    }

    pub fn from_raw(provider: &dyn CryptoProvider, rekeyer: &Identifier, key: Bytes) -> Result<Self> {
        if key.len() != provider.aead().key_size() {
            return Err(roster::Error::InvalidLength.into());
        }

        let id = provider
            .kdf()
            .derive(rekeyer.as_ref(), &key, KEY_ID_INFO, KEY_ID_LENGTH)?;
        Ok(Self { id, key })
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    pub(crate) fn raw(&self) -> &[u8] {
        &self.key
    }

    /// The nonce `sender` uses for its message numbered `sequence`: the
    /// big-endian sequence number XORed with a mask derived from it and the
    /// sender. Senders never share a nonce, and a sender never reuses a
    /// sequence number under one key.
    pub fn nonce(
        &self,
        provider: &dyn CryptoProvider,
        sender: &Identifier,
        sequence: u64,
    ) -> Result<Vec<u8>> {
        let size = provider.aead().nonce_size();
        let sequence = sequence.to_be_bytes();
        if size < sequence.len() {
            return Err(roster::Error::InvalidLength.into());
        }

        let mut counter = vec![0u8; size];
        counter[size - sequence.len()..].copy_from_slice(&sequence);
        let mask = provider
            .kdf()
            .derive(&counter, sender.as_ref(), NONCE_INFO, size)?;

        Ok(mask.iter().zip(&counter).map(|(m, c)| m ^ c).collect())
    }

    pub fn seal(
        &self,
        provider: &dyn CryptoProvider,
        sender: &Identifier,
        sequence: u64,
        additional_data: &[u8],
        plaintext: &[u8],
    ) -> Result<Bytes> {
        let nonce = self.nonce(provider, sender, sequence)?;
        Ok(provider
            .aead()
            .seal(&self.key, &nonce, plaintext, additional_data)?)
    }

    pub fn open(
        &self,
        provider: &dyn CryptoProvider,
        sender: &Identifier,
        sequence: u64,
        additional_data: &[u8],
        ciphertext: &[u8],
    ) -> Result<Bytes> {
        let nonce = self.nonce(provider, sender, sequence)?;
        provider
            .aead()
            .open(&self.key, &nonce, ciphertext, additional_data)
            .map_err(|_| ChatError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster::crypto::RustCryptoProvider;
    use roster::{Identified, Identity};

    #[test]
    fn key_id_depends_on_rekeyer() {
        let provider = RustCryptoProvider::default();
        let alice = Identity::generate().identifier();
        let bob = Identity::generate().identifier();
        let raw = Bytes::from_static(&[3u8; 16]);

        let from_alice = ChatKey::from_raw(&provider, &alice, raw.clone()).expect("16 byte key");
        let again = ChatKey::from_raw(&provider, &alice, raw.clone()).expect("16 byte key");
        let from_bob = ChatKey::from_raw(&provider, &bob, raw).expect("16 byte key");

        assert_eq!(from_alice.id().len(), KEY_ID_LENGTH, "key id length");
        assert_eq!(from_alice.id(), again.id(), "deterministic");
        assert_ne!(from_alice.id(), from_bob.id(), "bound to the rekeyer");
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        let provider = RustCryptoProvider::default();
        assert!(
            matches!(
                ChatKey::from_raw(&provider, &Identifier::ZERO, Bytes::from_static(&[0u8; 15])),
                Err(ChatError::Roster(roster::Error::InvalidLength))
            ),
            "AES-128 takes 16 byte keys"
        );
    }

    #[test]
    fn nonces_differ_per_sender_and_sequence() {
        let provider = RustCryptoProvider::default();
        let alice = Identity::generate().identifier();
        let bob = Identity::generate().identifier();
        let key = ChatKey::generate(&provider, &alice).expect("key");

        let first = key.nonce(&provider, &alice, 0).expect("nonce");
        assert_eq!(first.len(), 12, "AES-GCM nonce size");
        assert_ne!(
            first,
            key.nonce(&provider, &alice, 1).expect("nonce"),
            "one nonce per message"
        );
        assert_ne!(
            first,
            key.nonce(&provider, &bob, 0).expect("nonce"),
            "senders at the same sequence number use different nonces"
        );
    }

    #[test]
    fn sealed_for_one_sender_and_sequence_only() {
        let provider = RustCryptoProvider::default();
        let alice = Identity::generate().identifier();
        let bob = Identity::generate().identifier();
        let key = ChatKey::generate(&provider, &alice).expect("key");

        let sealed = key.seal(&provider, &alice, 4, b"ad", b"text").expect("sealed");
        assert_eq!(
            key.open(&provider, &alice, 4, b"ad", &sealed)
                .expect("opens")
                .as_ref(),
            b"text",
            "same sender and sequence"
        );
        assert_eq!(
            key.open(&provider, &alice, 5, b"ad", &sealed),
            Err(ChatError::DecryptionFailed),
            "another sequence number uses another nonce"
        );
        assert_eq!(
            key.open(&provider, &bob, 4, b"ad", &sealed),
            Err(ChatError::DecryptionFailed),
            "another sender uses another nonce"
        );
    }
}
