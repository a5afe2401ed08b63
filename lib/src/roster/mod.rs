//! The append-only, hash-chained membership log.
//!
//! Every entry carries the digest of the entry before it and the actor's
//! signature, so a log can be handed to anyone holding the registry and
//! replayed into the same membership state. Appends on one roster are
//! serialized through the chain tail: the next append sees the effects of the
//! previous one, and an append that fails leaves the roster refusing every
//! later append.
pub mod cache;
pub mod registry;


use std::collections::{BTreeMap, HashSet};
use std::fmt::{Debug, Display};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::sync::{Mutex, RwLock};

use self::cache::CacheEntry;
use self::registry::RosterRegistry;
use crate::codec::Parser;
use crate::config::RosterConfig;
use crate::crypto::CryptoProvider;
use crate::error::{Error, Result};
use crate::identity::{
    Identified, Identifier, Identity, PrivateEntity, PublicEntity, PublicIdentity, Share,
};
use crate::operation::{DecodedEntry, FieldLengths, Opcode, Operation};
use crate::policy::Policy;

/// Agent rosters list identities and their shares. Group rosters list other
/// rosters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RosterKind {
    Agent,
    Group,
}

impl RosterKind {
    pub fn accepts(self, opcode: Opcode) -> bool {
        matches!(
            (self, opcode),
            (RosterKind::Agent, Opcode::Change | Opcode::Share)
                | (RosterKind::Group, Opcode::ChangeRoster)
        )
    }
}

struct ChainTail {
    last_hash: Bytes,
    entries: usize,
    poisoned: bool,
}

#[derive(Default)]
struct Ledger {
    log: Vec<Bytes>,
    cache: BTreeMap<Identifier, CacheEntry>,
}

impl Ledger {
    fn policy_of(&self, identifier: &Identifier) -> Policy {
        self.cache
            .get(identifier)
            .map_or(Policy::NONE, CacheEntry::policy)
    }

    /// Leaves the cache untouched when it fails.
    fn apply(&mut self, operation: &Operation) -> Result<()> {
        match operation {
            Operation::Change {
                subject, policy, ..
            } => self.set_policy(CacheEntry::for_identity(subject.identifier(), *policy)),
            Operation::ChangeRoster {
                subject, policy, ..
            } => self.set_policy(CacheEntry::for_roster(subject.clone(), *policy)),
            Operation::Share { actor } => {
                let share = actor.share()?;
                self.cache
                    .get_mut(&actor.identifier())
                    .ok_or(Error::NotAMember)?
                    .set_share(share);
            }
        }
        Ok(())
    }

    fn set_policy(&mut self, entry: CacheEntry) {
        let identifier = entry.identifier();
        let policy = entry.policy();

        if !policy.is_member() {
            self.cache.remove(&identifier);
        } else if let Some(existing) = self.cache.get_mut(&identifier) {
            existing.set_policy(policy);
        } else {
            self.cache.insert(identifier, entry);
        }
    }
}

/// Where the bytes of an entry come from.
enum EntrySource<'a> {
    /// Built here and signed by the actor at append time.
    Local(&'a dyn PrivateEntity),
    /// Read from a log; signature already checked.
    Decoded {
        previous_hash: Bytes,
        encoded: Bytes,
    },
}

struct RosterInner {
    kind: RosterKind,
    identity: Identifier,
    provider: Arc<dyn CryptoProvider>,
    lengths: FieldLengths,
    tail: Mutex<ChainTail>,
    ledger: RwLock<Ledger>,
}

/// A handle to a roster. Clones refer to the same log.
#[derive(Clone)]
pub struct Roster {
    inner: Arc<RosterInner>,
}

impl PartialEq for Roster {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Roster {}

impl Debug for Roster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Roster")
            .field("kind", &self.inner.kind)
            .field("identity", &self.inner.identity)
            .finish_non_exhaustive()
    }
}

impl Display for Roster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Roster({})", self.inner.identity.to_base64())
    }
}

impl Identified for Roster {
    fn identifier(&self) -> Identifier {
        self.inner.identity
    }
}

fn check_bootstrap_policy(policy: Policy) -> Result<()> {
    if policy.is_member() && policy.can_add() {
        Ok(())
    } else {
        Err(Error::InsufficientPrivilege)
    }
}

/// Rosters built here must be the only ones under their identity, or
/// entries naming them would resolve to the other roster.
async fn register_new(registry: &RosterRegistry, roster: &Roster) -> Result<()> {
    if registry.register(roster).await {
        Ok(())
    } else {
        log::warn!("{roster}: identity is already taken in this registry");
        Err(Error::AlreadyRegistered(roster.identifier()))
    }
}

impl Roster {
    fn empty(config: &RosterConfig, kind: RosterKind, identity: Identifier) -> Self {
        let provider = config.provider.clone();
        let tail = ChainTail {
            last_hash: provider.hash().zero(),
            entries: 0,
            poisoned: false,
        };

        Self {
            inner: Arc::new(RosterInner {
                kind,
                identity,
                lengths: config.field_lengths(),
                provider,
                tail: Mutex::new(tail),
                ledger: RwLock::new(Ledger::default()),
            }),
        }
    }

    /// Starts an agent roster whose identity is `actor`, with `subject` as
    /// its first member. When `actor` is the subject its share is advertised
    /// straight away.
    pub async fn create(
        registry: &RosterRegistry,
        actor: &impl PrivateEntity,
        subject: &impl Identified,
        policy: Policy,
    ) -> Result<Roster> {
        check_bootstrap_policy(policy)?;

        let roster = Roster::empty(registry.config(), RosterKind::Agent, actor.identifier());
        let operation = Operation::Change {
            actor: PublicIdentity::new(actor.identifier()),
            subject: PublicIdentity::new(subject.identifier()),
            policy,
        };
        roster.append(operation, EntrySource::Local(actor)).await?;
        register_new(registry, &roster).await?;

        if actor.identifier() == subject.identifier() {
            roster.share(actor).await?;
        }

        Ok(roster)
    }

    /// `actor` creates a roster holding only themselves, as an admin.
    pub async fn create_admin(
        registry: &RosterRegistry,
        actor: &impl PrivateEntity,
    ) -> Result<Roster> {
        Roster::create(registry, actor, actor, Policy::ADMIN).await
    }

    /// Starts an agent roster signed by a throwaway identity, then has
    /// `first_user` advertise its share. The roster's identity is that of
    /// the throwaway, so it never collides with a user's own identity.
    pub async fn bootstrap(
        registry: &RosterRegistry,
        first_user: &impl PrivateEntity,
        policy: Policy,
    ) -> Result<Roster> {
        let initiator = Identity::generate();
        let roster = Roster::create(registry, &initiator, first_user, policy).await?;
        roster.share(first_user).await?;

        Ok(roster)
    }

    /// Starts a group roster whose identity is `actor`, with `first_member`
    /// as its first member roster.
    pub async fn create_group(
        registry: &RosterRegistry,
        actor: &impl PrivateEntity,
        first_member: &Roster,
        policy: Policy,
    ) -> Result<Roster> {
        check_bootstrap_policy(policy)?;

        let roster = Roster::empty(registry.config(), RosterKind::Group, actor.identifier());
        let operation = Operation::ChangeRoster {
            actor: PublicIdentity::new(actor.identifier()),
            actor_roster: None,
            subject: first_member.clone(),
            policy,
        };
        roster.append(operation, EntrySource::Local(actor)).await?;
        register_new(registry, &roster).await?;

        Ok(roster)
    }

    /// Like [`Roster::create_group`], with the first entry signed by a
    /// throwaway identity.
    pub async fn bootstrap_group(
        registry: &RosterRegistry,
        first_member: &Roster,
        policy: Policy,
    ) -> Result<Roster> {
        Roster::create_group(registry, &Identity::generate(), first_member, policy).await
    }

    /// `actor` sets the policy of `subject`.
    pub async fn change(
        &self,
        actor: &impl PrivateEntity,
        subject: &impl Identified,
        policy: Policy,
    ) -> Result<()> {
        let operation = Operation::Change {
            actor: PublicIdentity::new(actor.identifier()),
            subject: PublicIdentity::new(subject.identifier()),
            policy,
        };
        self.append(operation, EntrySource::Local(actor)).await
    }

    /// `actor`, a member of `actor_roster`, sets the policy of the `subject`
    /// roster in this group. Authorization uses the policy that
    /// `actor_roster` holds here.
    pub async fn change_roster(
        &self,
        actor: &impl PrivateEntity,
        actor_roster: &Roster,
        subject: &Roster,
        policy: Policy,
    ) -> Result<()> {
        let operation = Operation::ChangeRoster {
            actor: PublicIdentity::new(actor.identifier()),
            actor_roster: Some(actor_roster.clone()),
            subject: subject.clone(),
            policy,
        };
        self.append(operation, EntrySource::Local(actor)).await
    }

    /// Advertises the share of `actor`, who must be a member.
    pub async fn share(&self, actor: &impl PrivateEntity) -> Result<()> {
        let operation = Operation::Share {
            actor: actor.to_public(),
        };
        self.append(operation, EntrySource::Local(actor)).await
    }

    pub fn kind(&self) -> RosterKind {
        self.inner.kind
    }

    pub async fn find(&self, entity: &impl Identified) -> Option<CacheEntry> {
        self.inner
            .ledger
            .read()
            .await
            .cache
            .get(&entity.identifier())
            .cloned()
    }

    /// [`Policy::NONE`] for anyone who is not a member.
    pub async fn find_policy(&self, entity: &impl Identified) -> Policy {
        self.inner
            .ledger
            .read()
            .await
            .policy_of(&entity.identifier())
    }

    pub async fn find_share(&self, entity: &impl Identified) -> Option<Share> {
        self.find(entity)
            .await
            .and_then(|entry| entry.share().ok())
    }

    /// Shares of every member that advertised one.
    pub async fn all_shares(&self) -> HashSet<Share> {
        self.inner
            .ledger
            .read()
            .await
            .cache
            .values()
            .filter_map(|entry| entry.share().ok())
            .collect()
    }

    pub async fn members(&self) -> Vec<CacheEntry> {
        self.inner
            .ledger
            .read()
            .await
            .cache
            .values()
            .cloned()
            .collect()
    }

    /// Member rosters of a group roster.
    pub async fn users(&self) -> Vec<Roster> {
        self.inner
            .ledger
            .read()
            .await
            .cache
            .values()
            .filter_map(|entry| entry.roster().cloned())
            .collect()
    }

    /// Members of an agent roster, or the members of every member roster of
    /// a group roster.
    pub async fn agents(&self) -> Vec<CacheEntry> {
        match self.inner.kind {
            RosterKind::Agent => self.members().await,
            RosterKind::Group => {
                let mut agents = Vec::new();
                for user in self.users().await {
                    agents.extend(user.members().await);
                }
                agents
            }
        }
    }

    /// Agents that advertised a share, i.e. everyone a key can be sent to.
    pub async fn participants(&self) -> Vec<CacheEntry> {
        self.agents()
            .await
            .into_iter()
            .filter(|entry| entry.share().is_ok())
            .collect()
    }

    /// Number of entries in the log.
    pub async fn len(&self) -> usize {
        self.inner.ledger.read().await.log.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn entries(&self) -> Vec<Bytes> {
        self.inner.ledger.read().await.log.clone()
    }

    pub async fn is_poisoned(&self) -> bool {
        self.inner.tail.lock().await.poisoned
    }

    /// The whole log, entries concatenated in append order.
    pub async fn encode(&self) -> Bytes {
        let ledger = self.inner.ledger.read().await;
        let mut buf = BytesMut::with_capacity(ledger.log.iter().map(Bytes::len).sum());
        for entry in &ledger.log {
            buf.extend_from_slice(entry);
        }
        buf.freeze()
    }

    /// Rebuilds a roster from its encoded log, checking every hash and
    /// signature and replaying every authorization decision. Any bad entry
    /// fails the whole decode. The roster is registered only once the whole
    /// log has been accepted.
    pub async fn decode<B: Into<Bytes>>(
        registry: &RosterRegistry,
        kind: RosterKind,
        data: B,
    ) -> Result<Roster> {
        let lengths = registry.config().field_lengths();
        let mut parser = Parser::new(data);
        if parser.is_empty() {
            return Err(Error::Truncated);
        }

        let first = Operation::decode(&mut parser, &lengths, registry).await?;
        let roster = Roster::empty(registry.config(), kind, first.operation.actor().identifier());
        roster.append_decoded(first).await?;

        while !parser.is_empty() {
            let entry = Operation::decode(&mut parser, &lengths, registry).await?;
            roster.append_decoded(entry).await?;
        }

        // A roster known under this identity stays registered.
        registry.register(&roster).await;
        Ok(roster)
    }

    async fn append_decoded(&self, entry: DecodedEntry) -> Result<()> {
        let DecodedEntry {
            operation,
            previous_hash,
            encoded,
        } = entry;
        self.append(
            operation,
            EntrySource::Decoded {
                previous_hash,
                encoded,
            },
        )
        .await
    }

    async fn append(&self, operation: Operation, source: EntrySource<'_>) -> Result<()> {
        let mut tail = self.inner.tail.lock().await;
        if tail.poisoned {
            return Err(Error::RosterPoisoned);
        }

        let result = self.commit(&mut tail, &operation, source).await;
        if let Err(err) = &result {
            tail.poisoned = true;
            log::warn!(
                "{self}: {:?} entry rejected, no further entries will be accepted: {err}",
                operation.opcode()
            );
        }
        result
    }

    /// Validate, encode, apply, then advance the tail. Called with the tail
    /// locked.
    async fn commit(
        &self,
        tail: &mut ChainTail,
        operation: &Operation,
        source: EntrySource<'_>,
    ) -> Result<()> {
        let first = tail.entries == 0;

        if let EntrySource::Decoded { previous_hash, .. } = &source {
            if *previous_hash != tail.last_hash {
                return Err(Error::ChainBroken);
            }
        }

        self.validate(operation, first).await?;

        let encoded = match source {
            EntrySource::Local(signer) => {
                operation.encode(signer, &tail.last_hash, &self.inner.lengths)?
            }
            EntrySource::Decoded { encoded, .. } => encoded,
        };

        {
            let mut ledger = self.inner.ledger.write().await;
            ledger.apply(operation)?;
            ledger.log.push(encoded.clone());
        }

        tail.last_hash = self.inner.provider.hash().digest(&encoded);
        tail.entries += 1;
        log::debug!(
            "{self}: appended {:?} entry #{} for {}",
            operation.opcode(),
            tail.entries,
            operation.subject()
        );

        Ok(())
    }

    async fn validate(&self, operation: &Operation, first: bool) -> Result<()> {
        if !self.inner.kind.accepts(operation.opcode()) {
            return Err(Error::InvalidOperation);
        }

        if first {
            return self.validate_first(operation);
        }

        match operation {
            Operation::Change {
                actor,
                subject,
                policy,
            } => {
                self.check_change(&actor.identifier(), &subject.identifier(), *policy)
                    .await
            }
            Operation::Share { actor } => {
                if self.find_policy(actor).await.is_member() {
                    Ok(())
                } else {
                    Err(Error::NotAMember)
                }
            }
            Operation::ChangeRoster {
                actor,
                actor_roster,
                subject,
                policy,
            } => {
                let actor_roster = actor_roster.as_ref().ok_or(Error::NotAMember)?;
                if actor_roster.find(actor).await.is_none() {
                    return Err(Error::NotAMember);
                }

                self.check_change(&actor_roster.identifier(), &subject.identifier(), *policy)
                    .await
            }
        }
    }

    /// The first entry is not authorized against anything, but it decides
    /// the roster's identity and must give its subject room to add others.
    fn validate_first(&self, operation: &Operation) -> Result<()> {
        if operation.actor().identifier() != self.inner.identity {
            return Err(Error::InvalidOperation);
        }

        match operation.policy() {
            Some(policy) => check_bootstrap_policy(policy),
            // A share has nobody to belong to yet.
            None => Err(Error::NotAMember),
        }
    }

    async fn check_change(
        &self,
        actor: &Identifier,
        subject: &Identifier,
        proposed: Policy,
    ) -> Result<()> {
        let ledger = self.inner.ledger.read().await;
        let old = ledger.policy_of(subject);

        let allowed = if actor == subject {
            // Leaving is always possible, rejoining is not.
            !old.is_empty() && old.subsumes(&proposed)
        } else {
            ledger.policy_of(actor).can_change(&old, &proposed)
        };

        if allowed {
            Ok(())
        } else {
            Err(Error::ChangeForbidden)
        }
    }
}
