pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Roster error: {0}")]
    Roster(#[from] roster::Error),
    #[error("No chat key has been received")]
    NoKey,
    #[error("The sender is not a current member of the group")]
    NotPermitted,
    #[error("The message could not be decrypted")]
    DecryptionFailed,
    #[error("Unknown chat opcode: {0:#04x}")]
    InvalidOpcode(u8),
    #[error("This message was already received")]
    Replayed,
    #[error("Invalid signature on chat entry")]
    SignatureInvalid,
    #[error("A rekey can address at most 65535 members")]
    TooManyMembers,
    #[error("An encrypted message can be at most 65535 bytes long")]
    MessageTooLong,
    #[error("The message text is not valid UTF-8")]
    InvalidText,
}
