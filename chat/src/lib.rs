//! An encrypted chat log for the members of a group roster.
//!
//! Any agent of a member roster can rekey the chat by masking a fresh key to
//! every participant that advertised a share. Messages are signed by their
//! sender and sealed with the current key.
pub mod chatlog;
pub mod error;
pub mod key;
pub mod operation;

#[cfg(test)]
pub mod tests;

pub use chatlog::{ChatLog, ChatMessage};
pub use error::{ChatError, Result};
pub use key::ChatKey;
pub use operation::ChatOpcode;
