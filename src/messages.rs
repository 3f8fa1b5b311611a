/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Messages delivered to the [synchronizer](crate::synchronizer) by the node's message-processing
//! actor.
//!
//! Every message travels inside an [`Envelope`]: a type tag and the Borsh serialization of the
//! message. A receiver checks the tag before decoding, so that a payload is never decoded as the
//! wrong message type.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    block_set::BlockSet,
    blocks::Entry,
    data_types::{BlockHeight, CryptoHash},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum MessageType {
    Ack,
    CommitEntry,
    RevealEntry,
    DBState,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Envelope {
    pub msg_type: MessageType,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn db_state(msg: &DBStateMessage) -> std::io::Result<Envelope> {
        Ok(Envelope {
            msg_type: MessageType::DBState,
            payload: msg.try_to_vec()?,
        })
    }

    /// Decode the payload as a [`DBStateMessage`].
    pub fn open_db_state(&self) -> Result<DBStateMessage, EnvelopeError> {
        if self.msg_type != MessageType::DBState {
            return Err(EnvelopeError::UnexpectedMessageType {
                expected: MessageType::DBState,
                found: self.msg_type,
            });
        }
        DBStateMessage::try_from_slice(&self.payload).map_err(EnvelopeError::MalformedPayload)
    }
}

#[derive(Debug)]
pub enum EnvelopeError {
    UnexpectedMessageType {
        expected: MessageType,
        found: MessageType,
    },
    MalformedPayload(std::io::Error),
}

/// One full [`BlockSet`] for one height, as sent by a peer.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DBStateMessage {
    pub block_set: BlockSet,
}

impl DBStateMessage {
    pub fn new(block_set: BlockSet) -> DBStateMessage {
        DBStateMessage { block_set }
    }

    /// Height of the carried directory block, or `None` if the message carries none.
    pub fn height(&self) -> Option<BlockHeight> {
        self.block_set.height()
    }
}

/// A message that spends entry credits on an entry, or reveals the entry itself.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum EntryMessage {
    CommitEntry {
        entry_hash: CryptoHash,
        ec_public_key: [u8; 32],
        credits: u8,
    },
    RevealEntry {
        entry: Entry,
    },
}

/// Acknowledgement that places an [`EntryMessage`] at a position in the block being built.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Ack {
    pub dblock_height: BlockHeight,
    pub minute: u8,
    pub message_hash: CryptoHash,
    pub serial: u32,
}
