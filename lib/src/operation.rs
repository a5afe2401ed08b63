//! Roster log entries and their wire format.
//!
//! ```text
//! [opcode:1][fields][actor:32][previous hash][signature:64]
//!
//! CHANGE         fields = [subject:32][policy:1]
//! SHARE          fields = [share:32]
//! CHANGE_ROSTER  fields = [subject roster:32][policy:1][actor roster:32]
//! ```
//!
//! The signature covers every byte before it, opcode included. Nothing is
//! length-prefixed: entry boundaries follow from the opcode and
//! [`FieldLengths`].
use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::Parser;
use crate::constants::{
    IDENTIFIER_LENGTH, OPCODE_LENGTH, POLICY_LENGTH, SHARE_LENGTH, SIGNATURE_LENGTH,
};
use crate::error::{Error, Result};
use crate::identity::{Identified, Identifier, PrivateEntity, PublicEntity, PublicIdentity, Share};
use crate::policy::Policy;
use crate::roster::registry::RosterRegistry;
use crate::roster::Roster;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Change = 0,
    Share = 1,
    ChangeRoster = 2,
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Opcode::Change),
            1 => Ok(Opcode::Share),
            2 => Ok(Opcode::ChangeRoster),
            other => Err(Error::InvalidOpcode(other)),
        }
    }
}

/// Sizes of the fixed-width fields of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLengths {
    pub opcode: usize,
    pub identifier: usize,
    pub share: usize,
    pub policy: usize,
    pub hash: usize,
    pub signature: usize,
}

impl FieldLengths {
    pub fn new(hash: usize) -> Self {
        Self {
            opcode: OPCODE_LENGTH,
            identifier: IDENTIFIER_LENGTH,
            share: SHARE_LENGTH,
            policy: POLICY_LENGTH,
            hash,
            signature: SIGNATURE_LENGTH,
        }
    }

    /// Length of the opcode specific fields.
    pub fn fields(&self, opcode: Opcode) -> usize {
        match opcode {
            Opcode::Change => self.identifier + self.policy,
            Opcode::Share => self.share,
            Opcode::ChangeRoster => self.identifier + self.policy + self.identifier,
        }
    }

    pub fn entry(&self, opcode: Opcode) -> usize {
        self.opcode + self.fields(opcode) + self.identifier + self.hash + self.signature
    }

    /// Offset of the previous hash within an entry.
    pub fn previous_hash_offset(&self, opcode: Opcode) -> usize {
        self.opcode + self.fields(opcode) + self.identifier
    }
}

/// A proposed or decoded roster entry.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Sets the policy of `subject`.
    Change {
        actor: PublicIdentity,
        subject: PublicIdentity,
        policy: Policy,
    },
    /// Advertises the actor's key exchange share.
    Share { actor: PublicIdentity },
    /// Sets the policy of the `subject` roster. The actor acts on behalf of
    /// `actor_roster`, which is absent only in the first entry.
    ChangeRoster {
        actor: PublicIdentity,
        actor_roster: Option<Roster>,
        subject: Roster,
        policy: Policy,
    },
}

/// An operation read from a log, with the bytes it came from.
#[derive(Debug, Clone)]
pub struct DecodedEntry {
    pub operation: Operation,
    pub previous_hash: Bytes,
    pub encoded: Bytes,
}

impl Operation {
    pub fn opcode(&self) -> Opcode {
        match self {
            Operation::Change { .. } => Opcode::Change,
            Operation::Share { .. } => Opcode::Share,
            Operation::ChangeRoster { .. } => Opcode::ChangeRoster,
        }
    }

    pub fn actor(&self) -> &PublicIdentity {
        match self {
            Operation::Change { actor, .. }
            | Operation::Share { actor }
            | Operation::ChangeRoster { actor, .. } => actor,
        }
    }

    /// Whose cache entry the operation touches.
    pub fn subject(&self) -> Identifier {
        match self {
            Operation::Change { subject, .. } => subject.identifier(),
            Operation::Share { actor } => actor.identifier(),
            Operation::ChangeRoster { subject, .. } => subject.identifier(),
        }
    }

    pub fn policy(&self) -> Option<Policy> {
        match self {
            Operation::Change { policy, .. } | Operation::ChangeRoster { policy, .. } => {
                Some(*policy)
            }
            Operation::Share { .. } => None,
        }
    }

    /// Serializes the operation chained to `previous_hash` and signs it.
    /// `signer` must be the actor.
    pub fn encode<S: PrivateEntity + ?Sized>(
        &self,
        signer: &S,
        previous_hash: &[u8],
        lengths: &FieldLengths,
    ) -> Result<Bytes> {
        let actor = self.actor().identifier();
        if signer.identifier() != actor {
            return Err(Error::SignerMismatch);
        }
        if previous_hash.len() != lengths.hash {
            return Err(Error::InvalidLength);
        }

        let mut buf = BytesMut::with_capacity(lengths.entry(self.opcode()));
        buf.put_u8(self.opcode().into());
        match self {
            Operation::Change {
                subject, policy, ..
            } => {
                buf.put_slice(subject.identifier().as_ref());
                buf.put_u8(policy.encode());
            }
            Operation::Share { actor } => buf.put_slice(actor.share()?.as_ref()),
            Operation::ChangeRoster {
                actor_roster,
                subject,
                policy,
                ..
            } => {
                let actor_roster = actor_roster
                    .as_ref()
                    .map_or(Identifier::ZERO, Identified::identifier);
                buf.put_slice(subject.identifier().as_ref());
                buf.put_u8(policy.encode());
                buf.put_slice(actor_roster.as_ref());
            }
        }
        buf.put_slice(actor.as_ref());
        buf.put_slice(previous_hash);

        let signature = signer.sign(&buf);
        buf.put_slice(&signature);

        Ok(buf.freeze())
    }

    /// Reads one entry and checks its signature. Roster references are
    /// resolved through `registry` once the signature is known to be good.
    pub async fn decode(
        parser: &mut Parser,
        lengths: &FieldLengths,
        registry: &RosterRegistry,
    ) -> Result<DecodedEntry> {
        let start = parser.position();
        let opcode = Opcode::try_from(parser.next_u8()?)?;
        let mut fields = Parser::new(parser.next(lengths.fields(opcode))?);
        let actor = Identifier::try_from(parser.next(lengths.identifier)?.as_ref())?;
        let previous_hash = parser.next(lengths.hash)?;
        let signed = parser.since(start);
        let signature = parser.next(lengths.signature)?;

        let actor = PublicIdentity::new(actor);
        if !actor.verify(&signature, &signed) {
            return Err(Error::SignatureInvalid);
        }

        let operation = match opcode {
            Opcode::Change => {
                let subject = Identifier::try_from(fields.next(lengths.identifier)?.as_ref())?;
                let policy = Policy::decode(fields.next_u8()?)?;
                Operation::Change {
                    actor,
                    subject: PublicIdentity::new(subject),
                    policy,
                }
            }
            Opcode::Share => {
                let share = Share::try_from(fields.next(lengths.share)?.as_ref())?;
                Operation::Share {
                    actor: PublicIdentity::with_share(actor.identifier(), share),
                }
            }
            Opcode::ChangeRoster => {
                let subject = Identifier::try_from(fields.next(lengths.identifier)?.as_ref())?;
                let policy = Policy::decode(fields.next_u8()?)?;
                let actor_roster =
                    Identifier::try_from(fields.next(lengths.identifier)?.as_ref())?;

                let subject = registry.lookup(&subject).await?;
                let actor_roster = if actor_roster.is_zero() {
                    None
                } else {
                    Some(registry.lookup(&actor_roster).await?)
                };

                Operation::ChangeRoster {
                    actor,
                    actor_roster,
                    subject,
                    policy,
                }
            }
        };

        Ok(DecodedEntry {
            operation,
            previous_hash,
            encoded: parser.since(start),
        })
    }
}
