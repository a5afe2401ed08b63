//! Identities of roster participants.
//!
//! An [`Identity`] holds an ed25519 signing key and an x25519 key exchange
//! secret. A [`PublicIdentity`] is what everyone else gets to see: the
//! identifier, which is the exported verifying key, and optionally the
//! x25519 share. Only the private type implements [`PrivateEntity`], so
//! signing with a public view does not compile.
use std::fmt::{Debug, Display};

use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use signature::Signer;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::constants::{IDENTIFIER_LENGTH, MASK_KEY_INFO, SHARE_LENGTH, SIGNATURE_LENGTH};
use crate::crypto::rng::get_rng;
use crate::crypto::Kdf;
use crate::error::{Error, Result};
use crate::util::base64::Base64String;

/// Public identifier of an identity: its exported ed25519 verifying key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier([u8; IDENTIFIER_LENGTH]);

impl Identifier {
    /// Stands in for "no roster" in the first entry of a group roster.
    pub const ZERO: Identifier = Identifier([0u8; IDENTIFIER_LENGTH]);

    pub fn from_bytes(bytes: [u8; IDENTIFIER_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTIFIER_LENGTH] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Identifier::ZERO
    }

    pub fn to_base64(&self) -> Base64String {
        Base64String::from_bytes(self.0)
    }
}

impl AsRef<[u8]> for Identifier {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Identifier {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self> {
        Ok(Self(value.try_into().map_err(|_| Error::InvalidLength)?))
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Identity({})", self.to_base64())
    }
}

/// An x25519 public key advertised in a roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Share([u8; SHARE_LENGTH]);

impl Share {
    pub fn from_bytes(bytes: [u8; SHARE_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SHARE_LENGTH] {
        &self.0
    }
}

impl AsRef<[u8]> for Share {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Share {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self> {
        Ok(Self(value.try_into().map_err(|_| Error::InvalidLength)?))
    }
}

impl Display for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Share({})", Base64String::from_bytes(self.0))
    }
}

/// Anything that can be looked up in a roster.
pub trait Identified: Send + Sync {
    fn identifier(&self) -> Identifier;
}

impl Identified for Identifier {
    fn identifier(&self) -> Identifier {
        *self
    }
}

/// The capabilities every view of an identity has.
pub trait PublicEntity: Identified {
    fn share(&self) -> Result<Share>;

    /// False for malformed keys and signatures as well as wrong ones.
    fn verify(&self, signature: &[u8], message: &[u8]) -> bool {
        verify_signature(&self.identifier(), signature, message)
    }

    fn to_public(&self) -> PublicIdentity;
}

/// Capabilities that need the private keys.
pub trait PrivateEntity: PublicEntity {
    fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH];

    /// XORs `key` with a mask that `kdf` derives from the key exchange
    /// between this identity and `peer`. Both sides derive the same mask, so
    /// the same call enciphers and deciphers.
    fn mask_key(&self, kdf: &dyn Kdf, peer: &Share, key: &[u8]) -> Result<Vec<u8>>;
}

fn verify_signature(identifier: &Identifier, signature: &[u8], message: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(identifier.as_bytes()) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };

    key.verify_strict(message, &signature).is_ok()
}

/// The public view of an identity. It can verify but never sign.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicIdentity {
    identifier: Identifier,
    share: Option<Share>,
}

impl PublicIdentity {
    pub fn new(identifier: Identifier) -> Self {
        Self {
            identifier,
            share: None,
        }
    }

    pub fn with_share(identifier: Identifier, share: Share) -> Self {
        Self {
            identifier,
            share: Some(share),
        }
    }

    pub(crate) fn set_share(&mut self, share: Share) {
        self.share = Some(share);
    }
}

impl From<Identifier> for PublicIdentity {
    fn from(value: Identifier) -> Self {
        PublicIdentity::new(value)
    }
}

impl Identified for PublicIdentity {
    fn identifier(&self) -> Identifier {
        self.identifier
    }
}

impl PublicEntity for PublicIdentity {
    fn share(&self) -> Result<Share> {
        self.share.ok_or(Error::NoShare)
    }

    fn to_public(&self) -> PublicIdentity {
        self.clone()
    }
}

/// A full identity holding both private keys.
#[derive(Clone)]
pub struct Identity {
    signing_key: SigningKey,
    exchange_secret: StaticSecret,
    public: PublicIdentity,
}

impl Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl Identity {
    pub fn generate() -> Self {
        let mut rng = get_rng();
        let signing_key = SigningKey::generate(&mut rng);
        let exchange_secret = StaticSecret::random_from_rng(&mut rng);

        Self::from_keys(signing_key, exchange_secret)
    }

    fn from_keys(signing_key: SigningKey, exchange_secret: StaticSecret) -> Self {
        let identifier = Identifier(signing_key.verifying_key().to_bytes());
        let share = Share(PublicKey::from(&exchange_secret).to_bytes());

        Self {
            signing_key,
            exchange_secret,
            public: PublicIdentity::with_share(identifier, share),
        }
    }
}

impl Identified for Identity {
    fn identifier(&self) -> Identifier {
        self.public.identifier
    }
}

impl PublicEntity for Identity {
    fn share(&self) -> Result<Share> {
        self.public.share()
    }

    fn to_public(&self) -> PublicIdentity {
        self.public.clone()
    }
}

impl PrivateEntity for Identity {
    fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing_key.sign(message).to_bytes()
    }

    fn mask_key(&self, kdf: &dyn Kdf, peer: &Share, key: &[u8]) -> Result<Vec<u8>> {
        let shared = self
            .exchange_secret
            .diffie_hellman(&PublicKey::from(*peer.as_bytes()));
        if !shared.was_contributory() {
            return Err(Error::CryptoError(
                "key exchange with a low order point".to_string(),
            ));
        }

        let mask = kdf.derive(&[], shared.as_bytes(), MASK_KEY_INFO, key.len())?;
        Ok(key.iter().zip(mask.iter()).map(|(k, m)| k ^ m).collect())
    }
}
