use std::collections::HashSet;
use std::fmt::Debug;

use bytes::{Bytes, BytesMut};
use roster::codec::Parser;
use roster::{
    Identified, Identifier, Identity, PrivateEntity, PublicEntity, Roster, RosterRegistry, Share,
};
use tokio::sync::Mutex;

use crate::error::{ChatError, Result};
use crate::key::ChatKey;
use crate::operation::{next_entry, ChatOpcode, Message, Rekey};

/// A message that was accepted into the chat log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: Identifier,
    pub sender_roster: Identifier,
    pub text: String,
    /// The sender's number for this message. With the sender it fixes the
    /// nonce, so peers agree on it whatever order entries arrive in.
    pub sequence: u64,
}

#[derive(Default)]
struct ChatState {
    log: Vec<Bytes>,
    key: Option<ChatKey>,
    /// Senders and sequence numbers accepted under the current key.
    seen: HashSet<(Identifier, u64)>,
    messages: Vec<ChatMessage>,
}

impl ChatState {
    fn set_key(&mut self, key: Option<ChatKey>) {
        self.key = key;
        self.seen.clear();
    }

    /// The log length, or past the last number `sender` used under this
    /// key if a peer's log placed one of its messages further along.
    fn next_sequence(&self, sender: &Identifier) -> u64 {
        self.seen
            .iter()
            .filter(|(seen, _)| seen == sender)
            .map(|(_, sequence)| sequence + 1)
            .fold(self.log.len() as u64, u64::max)
    }
}

/// One agent's view of the chat of a group roster.
///
/// Messages carry their sender and the sender's sequence number in the
/// clear. An agent numbers its messages by the length of its own log and
/// never reuses a number under one key, so no two messages share a nonce.
pub struct ChatLog {
    registry: RosterRegistry,
    group: Roster,
    user: Roster,
    agent: Identity,
    state: Mutex<ChatState>,
}

impl Debug for ChatLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatLog")
            .field("group", &self.group)
            .field("user", &self.user)
            .field("agent", &self.agent.identifier())
            .finish_non_exhaustive()
    }
}

impl ChatLog {
    /// Opens the chat of `group` for `agent`, who must be a member of
    /// `user`, which in turn must be a member of `group`.
    pub async fn new(
        registry: &RosterRegistry,
        group: &Roster,
        user: &Roster,
        agent: &Identity,
    ) -> Result<Self> {
        if group.find(user).await.is_none() || user.find(agent).await.is_none() {
            return Err(ChatError::NotPermitted);
        }

        Ok(Self {
            registry: registry.clone(),
            group: group.clone(),
            user: user.clone(),
            agent: agent.clone(),
            state: Mutex::new(ChatState::default()),
        })
    }

    /// Replays a concatenated chat log. Entries that cannot be read, such as
    /// messages sent before this agent received a key, stay in the log and
    /// are skipped. A log that cannot be split into entries is rejected as a
    /// whole.
    pub async fn decode<B: Into<Bytes>>(
        registry: &RosterRegistry,
        group: &Roster,
        user: &Roster,
        agent: &Identity,
        data: B,
    ) -> Result<Self> {
        let chat = ChatLog::new(registry, group, user, agent).await?;
        let key_size = chat.provider().aead().key_size();

        let mut parser = Parser::new(data);
        let mut entries = Vec::new();
        while !parser.is_empty() {
            entries.push(next_entry(&mut parser, key_size)?);
        }
        for entry in entries {
            // Unreadable entries are logged by receive.
            let _ = chat.receive(entry).await;
        }

        Ok(chat)
    }

    fn provider(&self) -> &dyn roster::crypto::CryptoProvider {
        self.registry.config().provider()
    }

    /// Checks that `actor` is a member of `actor_roster` that advertised a
    /// share, and that `actor_roster` is a member of the group.
    async fn check_sender(&self, actor: &Identifier, actor_roster: &Identifier) -> Result<Share> {
        let roster = self
            .registry
            .lookup(actor_roster)
            .await
            .map_err(|_| ChatError::NotPermitted)?;
        if self.group.find(&roster).await.is_none() {
            return Err(ChatError::NotPermitted);
        }

        roster
            .find(actor)
            .await
            .and_then(|entry| entry.share().ok())
            .ok_or(ChatError::NotPermitted)
    }

    /// Generates a fresh key and masks it to every participant of the group.
    /// Returns the entry to hand to the other participants.
    pub async fn rekey(&self) -> Result<Bytes> {
        let mut state = self.state.lock().await;
        self.check_sender(&self.agent.identifier(), &self.user.identifier())
            .await?;

        let key = ChatKey::generate(self.provider(), &self.agent.identifier())?;
        let recipients: Vec<_> = self
            .group
            .participants()
            .await
            .iter()
            .map(PublicEntity::to_public)
            .collect();
        let entry = Rekey::encode(
            &self.agent,
            self.user.identifier(),
            &key,
            &recipients,
            self.provider(),
        )?;

        log::info!(
            "ChatLog: {} rekeyed {} for {} participants",
            self.agent.identifier(),
            self.group,
            recipients.len()
        );
        state.log.push(entry.clone());
        state.set_key(Some(key));
        Ok(entry)
    }

    /// Seals `text` under the current key. Returns the entry to hand to the
    /// other participants.
    pub async fn send(&self, text: &str) -> Result<Bytes> {
        let mut state = self.state.lock().await;
        let key = state.key.clone().ok_or(ChatError::NoKey)?;
        self.check_sender(&self.agent.identifier(), &self.user.identifier())
            .await?;

        let sender = self.agent.identifier();
        let sequence = state.next_sequence(&sender);
        state.seen.insert((sender, sequence));
        let entry = Message::seal(
            &self.agent,
            self.user.identifier(),
            sequence,
            text,
            &key,
            self.provider(),
        )?;

        state.log.push(entry.clone());
        state.messages.push(ChatMessage {
            sender,
            sender_roster: self.user.identifier(),
            text: text.to_string(),
            sequence,
        });
        Ok(entry)
    }

    /// Appends an entry written by another participant. A message is
    /// returned once it has been decrypted and its sender checked. Well
    /// formed entries stay in the log even when they are rejected.
    pub async fn receive(&self, entry: Bytes) -> Result<Option<ChatMessage>> {
        let mut state = self.state.lock().await;
        let position = state.log.len();

        let mut parser = Parser::new(entry.clone());
        let framed = next_entry(&mut parser, self.provider().aead().key_size());
        match framed {
            Ok(_) if parser.is_empty() => {}
            Ok(_) => return Err(roster::Error::InvalidLength.into()),
            Err(err) => {
                log::warn!("ChatLog: dropping malformed entry: {err}");
                return Err(err);
            }
        }
        state.log.push(entry.clone());

        let result = self.process(&mut state, entry).await;
        if let Err(err) = &result {
            log::warn!("ChatLog: rejected entry {position}: {err}");
        }
        result
    }

    async fn process(
        &self,
        state: &mut ChatState,
        entry: Bytes,
    ) -> Result<Option<ChatMessage>> {
        let opcode = entry.first().copied().ok_or(roster::Error::Truncated)?;
        match ChatOpcode::try_from(opcode)? {
            ChatOpcode::Rekey => {
                let rekey = Rekey::decode(entry, self.provider().aead().key_size())?;
                let share = self.check_sender(&rekey.actor, &rekey.actor_roster).await?;

                let key = match rekey.piece_for(&self.agent.identifier()) {
                    Some(piece) => {
                        let raw = self.agent.mask_key(self.provider().kdf(), &share, piece)?;
                        Some(ChatKey::from_raw(
                            self.provider(),
                            &rekey.actor,
                            Bytes::from(raw),
                        )?)
                    }
                    None => {
                        log::info!(
                            "ChatLog: {} was left out of a rekey by {}",
                            self.agent.identifier(),
                            rekey.actor
                        );
                        None
                    }
                };
                state.set_key(key);
                Ok(None)
            }
            ChatOpcode::Message => {
                let key = state.key.as_ref().ok_or(ChatError::NoKey)?;
                let message = Message::open(entry, key, self.provider())?;
                self.check_sender(&message.sender, &message.sender_roster)
                    .await?;
                if !state.seen.insert((message.sender, message.sequence)) {
                    return Err(ChatError::Replayed);
                }

                let message = ChatMessage {
                    sender: message.sender,
                    sender_roster: message.sender_roster,
                    text: message.text,
                    sequence: message.sequence,
                };
                log::debug!(
                    "ChatLog: accepted message {} from {}",
                    message.sequence,
                    message.sender
                );
                state.messages.push(message.clone());
                Ok(Some(message))
            }
        }
    }

    /// Messages accepted so far, in log order.
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().await.messages.clone()
    }

    pub async fn has_key(&self) -> bool {
        self.state.lock().await.key.is_some()
    }

    /// Number of entries in the log, readable or not.
    pub async fn len(&self) -> usize {
        self.state.lock().await.log.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// The whole log, entries concatenated in order.
    pub async fn encode(&self) -> Bytes {
        let state = self.state.lock().await;
        let mut buf = BytesMut::with_capacity(state.log.iter().map(Bytes::len).sum());
        for entry in &state.log {
            buf.extend_from_slice(entry);
        }
        buf.freeze()
    }
}
