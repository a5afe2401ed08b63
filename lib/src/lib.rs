pub mod codec;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod operation;
pub mod policy;
pub mod roster;
pub mod util;

pub use config::RosterConfig;
pub use error::{Error, Result};
pub use identity::{
    Identified, Identifier, Identity, PrivateEntity, PublicEntity, PublicIdentity, Share,
};
pub use policy::{Policy, Privilege};
pub use roster::{cache::CacheEntry, registry::RosterRegistry, Roster, RosterKind};
