use crate::error::Result;
use crate::identity::{Identified, Identifier, PublicEntity, PublicIdentity, Share};
use crate::policy::Policy;
use crate::roster::Roster;

/// What a roster currently knows about one of its members.
///
/// Only members are cached: a change that clears `member` drops the entry
/// along with any share it advertised.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    subject: PublicIdentity,
    policy: Policy,
    roster: Option<Roster>,
}

impl CacheEntry {
    pub(crate) fn for_identity(subject: Identifier, policy: Policy) -> Self {
        Self {
            subject: PublicIdentity::new(subject),
            policy,
            roster: None,
        }
    }

    pub(crate) fn for_roster(roster: Roster, policy: Policy) -> Self {
        Self {
            subject: PublicIdentity::new(roster.identifier()),
            policy,
            roster: Some(roster),
        }
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// The member roster, for entries of a group roster.
    pub fn roster(&self) -> Option<&Roster> {
        self.roster.as_ref()
    }

    pub fn subject(&self) -> &PublicIdentity {
        &self.subject
    }

    pub(crate) fn set_policy(&mut self, policy: Policy) {
        self.policy = policy;
    }

    pub(crate) fn set_share(&mut self, share: Share) {
        self.subject.set_share(share);
    }
}

impl Identified for CacheEntry {
    fn identifier(&self) -> Identifier {
        self.subject.identifier()
    }
}

impl PublicEntity for CacheEntry {
    fn share(&self) -> Result<Share> {
        self.subject.share()
    }

    fn to_public(&self) -> PublicIdentity {
        self.subject.clone()
    }
}
