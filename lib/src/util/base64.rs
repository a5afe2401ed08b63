use std::fmt::Display;

use base64ct::{Base64UrlUnpadded, Encoding};

/// Unpadded base64url text, the form identities take in logs and messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Base64String(String);

impl Display for Base64String {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Base64String {
    pub fn from_bytes<Bytes: AsRef<[u8]>>(bytes: Bytes) -> Self {
        Base64String(Base64UrlUnpadded::encode_string(bytes.as_ref()))
    }
}
