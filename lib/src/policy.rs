//! Membership privileges and the rules for changing them.
//!
//! A [`Policy`] is a set drawn from three [`Privilege`]s:
//!  - `member`: the subject belongs to the roster.
//!  - `add`: the subject may raise the privileges of others, but only to
//!    privileges it holds itself.
//!  - `remove`: the subject may clear any privileges of others.
//!
//! On the wire a policy is one byte, `(member << 0) | (add << 1) | (remove << 2)`.
//! The top two bits are reserved and must be zero.
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MEMBER_BIT: u8 = 1 << 0;
const ADD_BIT: u8 = 1 << 1;
const REMOVE_BIT: u8 = 1 << 2;
const RESERVED_BITS: u8 = 0b1100_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    Member,
    Add,
    Remove,
}

impl Privilege {
    pub const ALL: [Privilege; 3] = [Privilege::Member, Privilege::Add, Privilege::Remove];
}

impl Display for Privilege {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Privilege::Member => "member",
            Privilege::Add => "add",
            Privilege::Remove => "remove",
        })
    }
}

/// An immutable set of privileges. Two policies are equal exactly when they
/// hold the same privileges.
#[allow(clippy::struct_excessive_bools)]
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Policy {
    member: bool,
    add: bool,
    remove: bool,
}

impl Policy {
    pub const ADMIN: Policy = Policy::new(true, true, true);
    pub const USER: Policy = Policy::new(true, true, false);
    pub const OBSERVER: Policy = Policy::new(true, false, false);
    pub const NONE: Policy = Policy::new(false, false, false);

    pub const fn new(member: bool, add: bool, remove: bool) -> Self {
        Self {
            member,
            add,
            remove,
        }
    }

    pub fn from_privileges<I: IntoIterator<Item = Privilege>>(privileges: I) -> Self {
        privileges
            .into_iter()
            .fold(Policy::NONE, |mut policy, privilege| {
                match privilege {
                    Privilege::Member => policy.member = true,
                    Privilege::Add => policy.add = true,
                    Privilege::Remove => policy.remove = true,
                }
                policy
            })
    }

    pub fn has(&self, privilege: Privilege) -> bool {
        match privilege {
            Privilege::Member => self.member,
            Privilege::Add => self.add,
            Privilege::Remove => self.remove,
        }
    }

    pub fn privileges(&self) -> impl Iterator<Item = Privilege> {
        let policy = *self;
        Privilege::ALL.into_iter().filter(move |p| policy.has(*p))
    }

    #[inline]
    pub fn is_member(&self) -> bool {
        self.member
    }

    #[inline]
    pub fn can_add(&self) -> bool {
        self.add
    }

    pub fn is_empty(&self) -> bool {
        *self == Policy::NONE
    }

    pub fn encode(&self) -> u8 {
        let mut byte = 0;
        if self.member {
            byte |= MEMBER_BIT;
        }
        if self.add {
            byte |= ADD_BIT;
        }
        if self.remove {
            byte |= REMOVE_BIT;
        }
        byte
    }

    /// Bits 3 to 5 are ignored, the top two bits must be clear.
    pub fn decode(byte: u8) -> Result<Self> {
        if byte & RESERVED_BITS != 0 {
            return Err(Error::UnsupportedVersion);
        }

        Ok(Policy::new(
            byte & MEMBER_BIT != 0,
            byte & ADD_BIT != 0,
            byte & REMOVE_BIT != 0,
        ))
    }

    /// Every privilege in `other` is also in `self`.
    pub fn subsumes(&self, other: &Policy) -> bool {
        (self.member || !other.member) && (self.add || !other.add) && (self.remove || !other.remove)
    }

    /// Whether a holder of this policy may move someone else from `old` to `new`.
    ///
    /// `add` alone can only grow a policy, and the result must include
    /// `member`. `remove` alone can only shrink it. Nobody can hand out a
    /// privilege they do not hold, and a change to the same policy is refused.
    pub fn can_change(&self, old: &Policy, new: &Policy) -> bool {
        if old == new || !self.subsumes(new) {
            return false;
        }

        (self.add && self.remove)
            || (self.remove && old.subsumes(new))
            || (self.add && new.subsumes(old) && new.member)
    }
}

impl Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("Policy(none)");
        }

        let names: Vec<String> = self.privileges().map(|p| p.to_string()).collect();
        write!(f, "Policy({})", names.join(", "))
    }
}

impl From<Policy> for u8 {
    fn from(value: Policy) -> Self {
        value.encode()
    }
}

impl TryFrom<u8> for Policy {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Policy::decode(value)
    }
}
