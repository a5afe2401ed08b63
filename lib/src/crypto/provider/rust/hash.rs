use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::crypto::provider::HashScheme;

/// Chains roster entries: each entry records the digest of the one before.
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
pub(super) struct HashSchemeWrapper(pub(super) HashScheme);

impl crate::crypto::provider::Hash for HashSchemeWrapper {
    fn size(&self) -> usize {
        match self.0 {
            HashScheme::SHA256 => <Sha256 as Digest>::output_size(),
        }
    }

    fn digest(&self, entry: &[u8]) -> Bytes {
        match self.0 {
            HashScheme::SHA256 => Bytes::copy_from_slice(&Sha256::digest(entry)),
        }
    }
}
