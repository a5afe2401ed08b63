use crate::identity::Identifier;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("The first member of a roster must hold both the member and add privileges")]
    InsufficientPrivilege,
    #[error("The actor is not allowed to make this change")]
    ChangeForbidden,
    #[error("Not a member of the roster")]
    NotAMember,
    #[error("This operation is not valid for this roster")]
    InvalidOperation,
    #[error("Unknown opcode: {0:#04x}")]
    InvalidOpcode(u8),
    #[error("The previous hash of an entry does not match the entry before it")]
    ChainBroken,
    #[error("Invalid signature on entry")]
    SignatureInvalid,
    #[error("The policy uses reserved bits")]
    UnsupportedVersion,
    #[error("No roster is registered for {0}")]
    UnknownRoster(Identifier),
    #[error("Another roster is already registered for {0}")]
    AlreadyRegistered(Identifier),
    #[error("This identity has no key exchange share")]
    NoShare,
    #[error("An earlier append failed and the roster no longer accepts entries")]
    RosterPoisoned,
    #[error("The input ended in the middle of an entry")]
    Truncated,
    #[error("The signing identity is not the actor of the operation")]
    SignerMismatch,
    #[error("A field has an unexpected length")]
    InvalidLength,
    #[error("RustCrypto error: {0}")]
    CryptoError(String),
}

impl Error {
    /// True for errors that mean the bytes of a log were damaged or forged,
    /// as opposed to a well-formed log that breaks the roster's rules.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Error::ChainBroken
                | Error::SignatureInvalid
                | Error::Truncated
                | Error::InvalidOpcode(_)
                | Error::UnsupportedVersion
                | Error::UnknownRoster(_)
        )
    }
}
