//! Chat log entries and their wire format.
use bytes::{BufMut, Bytes, BytesMut};
use roster::codec::Parser;
use roster::constants::{IDENTIFIER_LENGTH, OPCODE_LENGTH, SIGNATURE_LENGTH};
use roster::{Identified, Identifier, PrivateEntity, PublicEntity, PublicIdentity};

use crate::error::{ChatError, Result};
use crate::key::ChatKey;

const COUNT_LENGTH: usize = 2;
const SEQUENCE_LENGTH: usize = 8;
/// `[opcode][sender][sequence]`, sent in the clear and bound as additional data.
const MESSAGE_HEADER_LENGTH: usize = OPCODE_LENGTH + IDENTIFIER_LENGTH + SEQUENCE_LENGTH;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChatOpcode {
    Rekey = 0,
    Message = 1,
}

impl From<ChatOpcode> for u8 {
    fn from(value: ChatOpcode) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for ChatOpcode {
    type Error = ChatError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ChatOpcode::Rekey),
            1 => Ok(ChatOpcode::Message),
            other => Err(ChatError::InvalidOpcode(other)),
        }
    }
}

/// Splits the next entry off a concatenated chat log.
pub fn next_entry(parser: &mut Parser, key_size: usize) -> Result<Bytes> {
    let start = parser.position();
    match ChatOpcode::try_from(parser.next_u8()?)? {
        ChatOpcode::Rekey => {
            parser.next(2 * IDENTIFIER_LENGTH)?;
            let count = usize::from(parser.next_u16()?);
            parser.next(count * (IDENTIFIER_LENGTH + key_size))?;
            parser.next(SIGNATURE_LENGTH)?;
        }
        ChatOpcode::Message => {
            parser.next(IDENTIFIER_LENGTH + SEQUENCE_LENGTH)?;
            let length = usize::from(parser.next_u16()?);
            parser.next(length)?;
        }
    }

    Ok(parser.since(start))
}

fn read_identifier(parser: &mut Parser) -> Result<Identifier> {
    Ok(Identifier::from_bytes(parser.next_array()?))
}

fn check_signature(signer: &Identifier, signature: &[u8], signed: &[u8]) -> Result<()> {
    if PublicIdentity::new(*signer).verify(signature, signed) {
        Ok(())
    } else {
        Err(ChatError::SignatureInvalid)
    }
}

/// A fresh chat key, masked once for every recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rekey {
    pub actor: Identifier,
    pub actor_roster: Identifier,
    pub pieces: Vec<(Identifier, Bytes)>,
}

impl Rekey {
    /// Masks `key` toward every recipient and signs the result. Recipients
    /// without a share are skipped.
    pub fn encode(
        actor: &impl PrivateEntity,
        actor_roster: Identifier,
        key: &ChatKey,
        recipients: &[PublicIdentity],
        provider: &dyn roster::crypto::CryptoProvider,
    ) -> Result<Bytes> {
        let mut pieces = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let Ok(share) = recipient.share() else {
                continue;
            };
            let piece = actor.mask_key(provider.kdf(), &share, key.raw())?;
            pieces.push((recipient.identifier(), piece));
        }
        let count = u16::try_from(pieces.len()).map_err(|_| ChatError::TooManyMembers)?;

        let mut buf = BytesMut::new();
        buf.put_u8(ChatOpcode::Rekey.into());
        buf.put_slice(actor.identifier().as_ref());
        buf.put_slice(actor_roster.as_ref());
        buf.put_u16(count);
        for (member, masked) in &pieces {
            buf.put_slice(member.as_ref());
            buf.put_slice(masked);
        }
        let signature = actor.sign(&buf);
        buf.put_slice(&signature);

        Ok(buf.freeze())
    }

    /// Parses a rekey entry and checks its signature. Whether the actor may
    /// rekey is up to the caller.
    pub fn decode(entry: Bytes, key_size: usize) -> Result<Self> {
        let mut parser = Parser::new(entry);
        let opcode = parser.next_u8()?;
        if opcode != u8::from(ChatOpcode::Rekey) {
            return Err(ChatError::InvalidOpcode(opcode));
        }

        let actor = read_identifier(&mut parser)?;
        let actor_roster = read_identifier(&mut parser)?;
        let count = parser.next_u16()?;
        let mut pieces = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let member = read_identifier(&mut parser)?;
            pieces.push((member, parser.next(key_size)?));
        }

        let signed = parser.since(0);
        let signature = parser.next(SIGNATURE_LENGTH)?;
        if !parser.is_empty() {
            return Err(roster::Error::InvalidLength.into());
        }
        check_signature(&actor, &signature, &signed)?;

        Ok(Self {
            actor,
            actor_roster,
            pieces,
        })
    }

    pub fn piece_for(&self, member: &Identifier) -> Option<&Bytes> {
        self.pieces
            .iter()
            .find(|(identifier, _)| identifier == member)
            .map(|(_, masked)| masked)
    }
}

/// A signed chat message, sealed under the current chat key.
///
/// ```text
/// [1][sender:32][sequence:8][len:2][ciphertext]
/// plaintext = [sender roster:32][text][signature:64]
/// ```
///
/// The header is the additional data, together with the key id. The
/// signature covers the header, the sender roster and the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: Identifier,
    pub sender_roster: Identifier,
    /// Chosen by the sender, unique per sender under one key.
    pub sequence: u64,
    pub text: String,
}

impl Message {
    fn header(sender: &Identifier, sequence: u64) -> BytesMut {
        let mut header = BytesMut::with_capacity(MESSAGE_HEADER_LENGTH);
        header.put_u8(ChatOpcode::Message.into());
        header.put_slice(sender.as_ref());
        header.put_u64(sequence);
        header
    }

    fn additional_data(header: &[u8], key: &ChatKey) -> Vec<u8> {
        let mut additional_data = Vec::with_capacity(header.len() + key.id().len());
        additional_data.extend_from_slice(header);
        additional_data.extend_from_slice(key.id());
        additional_data
    }

    pub fn seal(
        sender: &impl PrivateEntity,
        sender_roster: Identifier,
        sequence: u64,
        text: &str,
        key: &ChatKey,
        provider: &dyn roster::crypto::CryptoProvider,
    ) -> Result<Bytes> {
        let sender_id = sender.identifier();
        let header = Self::header(&sender_id, sequence);

        let mut signed = header.clone();
        signed.put_slice(sender_roster.as_ref());
        signed.put_slice(text.as_bytes());
        let signature = sender.sign(&signed);

        let mut plaintext = signed.split_off(MESSAGE_HEADER_LENGTH);
        plaintext.put_slice(&signature);
        let ciphertext = key.seal(
            provider,
            &sender_id,
            sequence,
            &Self::additional_data(&header, key),
            &plaintext,
        )?;
        let length = u16::try_from(ciphertext.len()).map_err(|_| ChatError::MessageTooLong)?;

        let mut buf = header;
        buf.reserve(COUNT_LENGTH + ciphertext.len());
        buf.put_u16(length);
        buf.put_slice(&ciphertext);
        Ok(buf.freeze())
    }

    /// Decrypts a message entry and checks the sender's signature.
    pub fn open(
        entry: Bytes,
        key: &ChatKey,
        provider: &dyn roster::crypto::CryptoProvider,
    ) -> Result<Self> {
        let mut parser = Parser::new(entry);
        let opcode = parser.next_u8()?;
        if opcode != u8::from(ChatOpcode::Message) {
            return Err(ChatError::InvalidOpcode(opcode));
        }
        let sender = read_identifier(&mut parser)?;
        let sequence = u64::from_be_bytes(parser.next_array()?);
        let header = parser.since(0);
        let length = usize::from(parser.next_u16()?);
        let ciphertext = parser.next(length)?;
        if !parser.is_empty() {
            return Err(roster::Error::InvalidLength.into());
        }

        let plaintext = key.open(
            provider,
            &sender,
            sequence,
            &Self::additional_data(&header, key),
            &ciphertext,
        )?;
        let text_length = plaintext
            .len()
            .checked_sub(IDENTIFIER_LENGTH + SIGNATURE_LENGTH)
            .ok_or(roster::Error::Truncated)?;

        let mut parser = Parser::new(plaintext);
        let sender_roster = read_identifier(&mut parser)?;
        let text = parser.next(text_length)?;
        let body = parser.since(0);
        let signature = parser.rest();

        let mut signed = Vec::with_capacity(header.len() + body.len());
        signed.extend_from_slice(&header);
        signed.extend_from_slice(&body);
        check_signature(&sender, &signature, &signed)?;

        let text = String::from_utf8(text.to_vec()).map_err(|_| ChatError::InvalidText)?;
        Ok(Self {
            sender,
            sender_roster,
            sequence,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster::crypto::{CryptoProvider, RustCryptoProvider};
    use roster::Identity;

    #[test]
    fn opcodes() {
        assert_eq!(ChatOpcode::try_from(0), Ok(ChatOpcode::Rekey), "rekey");
        assert_eq!(ChatOpcode::try_from(1), Ok(ChatOpcode::Message), "message");
        assert_eq!(
            ChatOpcode::try_from(7),
            Err(ChatError::InvalidOpcode(7)),
            "unknown opcode"
        );
    }

    #[test]
    fn rekey_pieces_unmask_for_each_recipient() {
        let provider = RustCryptoProvider::default();
        let alice = Identity::generate();
        let bob = Identity::generate();
        let roster_id = Identity::generate().identifier();
        let key = ChatKey::generate(&provider, &alice.identifier()).expect("key");

        let recipients = vec![
            alice.to_public(),
            bob.to_public(),
            PublicIdentity::new(roster_id),
        ];
        let entry =
            Rekey::encode(&alice, roster_id, &key, &recipients, &provider).expect("encoded");
        assert_eq!(
            entry.len(),
            OPCODE_LENGTH
                + 2 * IDENTIFIER_LENGTH
                + COUNT_LENGTH
                + 2 * (IDENTIFIER_LENGTH + 16)
                + SIGNATURE_LENGTH,
            "one piece per recipient with a share"
        );

        let rekey = Rekey::decode(entry.clone(), 16).expect("valid rekey");
        assert_eq!(rekey.actor, alice.identifier(), "actor");
        assert_eq!(rekey.actor_roster, roster_id, "actor roster");
        assert!(rekey.piece_for(&roster_id).is_none(), "no share, no piece");

        let piece = rekey.piece_for(&bob.identifier()).expect("bob has a piece");
        let unmasked = bob
            .mask_key(provider.kdf(), &alice.share().expect("share"), piece)
            .expect("unmasked");
        assert_eq!(unmasked, key.raw(), "bob recovers the key");

        let mut parser = Parser::new(entry.clone());
        assert_eq!(next_entry(&mut parser, 16), Ok(entry), "framing");
        assert!(parser.is_empty(), "whole entry consumed");
    }

    #[test]
    fn rekey_signature_covers_pieces() {
        let provider = RustCryptoProvider::default();
        let alice = Identity::generate();
        let key = ChatKey::generate(&provider, &alice.identifier()).expect("key");
        let recipients = vec![alice.to_public()];
        let entry = Rekey::encode(&alice, Identifier::ZERO, &key, &recipients, &provider)
            .expect("encoded");

        let mut tampered = entry.to_vec();
        tampered[OPCODE_LENGTH + 2 * IDENTIFIER_LENGTH + COUNT_LENGTH + IDENTIFIER_LENGTH] ^= 1;
        assert_eq!(
            Rekey::decode(Bytes::from(tampered), 16),
            Err(ChatError::SignatureInvalid),
            "masked key was altered"
        );
    }

    #[test]
    fn message_seal_and_open() {
        let provider = RustCryptoProvider::default();
        let alice = Identity::generate();
        let roster_id = Identity::generate().identifier();
        let key = ChatKey::generate(&provider, &alice.identifier()).expect("key");

        let entry = Message::seal(&alice, roster_id, 3, "hello", &key, &provider).expect("sealed");
        assert_eq!(&entry[1..33], alice.identifier().as_ref(), "sender in the clear");
        let message = Message::open(entry.clone(), &key, &provider).expect("opened");
        assert_eq!(
            message,
            Message {
                sender: alice.identifier(),
                sender_roster: roster_id,
                sequence: 3,
                text: "hello".to_string(),
            },
            "contents survive"
        );

        let mut renumbered = entry.to_vec();
        renumbered[MESSAGE_HEADER_LENGTH - 1] ^= 1;
        assert_eq!(
            Message::open(Bytes::from(renumbered), &key, &provider),
            Err(ChatError::DecryptionFailed),
            "the sequence number is bound to the ciphertext"
        );

        let mut tampered = entry.to_vec();
        let last = tampered.len() - 1;
        tampered[last] ^= 1;
        assert_eq!(
            Message::open(Bytes::from(tampered), &key, &provider),
            Err(ChatError::DecryptionFailed),
            "tag no longer matches"
        );

        let mut parser = Parser::new(entry.clone());
        assert_eq!(next_entry(&mut parser, 16), Ok(entry), "framing");
    }

    #[test]
    fn same_sequence_from_two_senders_uses_two_keystreams() {
        let provider = RustCryptoProvider::default();
        let alice = Identity::generate();
        let bob = Identity::generate();
        let key = ChatKey::generate(&provider, &alice.identifier()).expect("key");

        let from_alice =
            Message::seal(&alice, Identifier::ZERO, 1, "same text", &key, &provider).expect("sealed");
        let from_bob =
            Message::seal(&bob, Identifier::ZERO, 1, "same text", &key, &provider).expect("sealed");

        let body = MESSAGE_HEADER_LENGTH + COUNT_LENGTH;
        assert_ne!(
            from_alice[body..body + IDENTIFIER_LENGTH],
            from_bob[body..body + IDENTIFIER_LENGTH],
            "equal plaintext prefixes encrypt differently"
        );
        assert_eq!(
            Message::open(from_bob, &key, &provider).map(|message| message.sender),
            Ok(bob.identifier()),
            "bob's message opens"
        );
        assert_eq!(
            Message::open(from_alice, &key, &provider).map(|message| message.sender),
            Ok(alice.identifier()),
            "alice's message opens"
        );
    }

    #[test]
    fn message_signature_binds_sender() {
        let provider = RustCryptoProvider::default();
        let alice = Identity::generate();
        let mallory = Identity::generate();
        let key = ChatKey::generate(&provider, &alice.identifier()).expect("key");

        // Signed by mallory while claiming to come from alice.
        let header = Message::header(&alice.identifier(), 0);
        let mut signed = header.to_vec();
        signed.extend_from_slice(Identifier::ZERO.as_ref());
        signed.extend_from_slice(b"hi");
        let signature = mallory.sign(&signed);
        let mut plaintext = signed[MESSAGE_HEADER_LENGTH..].to_vec();
        plaintext.extend_from_slice(&signature);

        let ciphertext = key
            .seal(
                &provider,
                &alice.identifier(),
                0,
                &Message::additional_data(&header, &key),
                &plaintext,
            )
            .expect("sealed");
        let mut entry = header.to_vec();
        entry.extend_from_slice(&u16::try_from(ciphertext.len()).expect("short").to_be_bytes());
        entry.extend_from_slice(&ciphertext);

        assert_eq!(
            Message::open(Bytes::from(entry), &key, &provider),
            Err(ChatError::SignatureInvalid),
            "forged sender"
        );
    }
}
