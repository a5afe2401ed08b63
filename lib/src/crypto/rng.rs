use rand_core::{CryptoRng, OsRng, RngCore};

/// The randomness behind identities and chat keys.
#[inline]
pub fn get_rng() -> impl RngCore + CryptoRng {
    OsRng
}

/// A fresh symmetric key of `size` bytes.
pub fn random_key(size: usize) -> Vec<u8> {
    let mut key = vec![0u8; size];
    get_rng().fill_bytes(&mut key);
    key
}
