/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits for pluggable block store persistence.

use std::fmt::{self, Display};

use borsh::BorshDeserialize;

use crate::{
    chain_state::ChainState,
    types::{
        blocks::{AdminBlock, DirectoryBlock, Entry, EntryBlock, EntryCreditBlock, FactoidBlock},
        data_types::{BlockHeight, CryptoHash},
    },
};

use super::variables::{self, concat};

/// A key-value store with atomic, batched writes.
///
/// `write` must be all-or-nothing: either every change in the batch becomes visible, or (if it
/// returns an error) none does.
pub trait KVStore: KVGet + Clone + Send + 'static {
    type WriteBatch: WriteBatch;
    type Snapshot<'a>: 'a + KVGet;

    fn write(&mut self, wb: Self::WriteBatch) -> Result<(), KVWriteError>;
    fn snapshot<'b>(&'b self) -> Self::Snapshot<'_>;
}

pub trait KVGet {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /* ↓↓↓ Directory Blocks ↓↓↓ */

    fn dblock(&self, key_mr: &CryptoHash) -> Result<Option<DirectoryBlock>, KVGetError> {
        deserialize_value(
            self.get(&concat(&variables::DBLOCKS, &key_mr.bytes())),
            Key::DBlock { key_mr: *key_mr },
        )
    }

    fn dblock_key_mr_at_height(
        &self,
        height: BlockHeight,
    ) -> Result<Option<CryptoHash>, KVGetError> {
        deserialize_value(
            self.get(&concat(&variables::DBLOCK_AT_HEIGHT, &height.to_le_bytes())),
            Key::DBlockAtHeight { height },
        )
    }

    fn dblock_at_height(&self, height: BlockHeight) -> Result<Option<DirectoryBlock>, KVGetError> {
        match self.dblock_key_mr_at_height(height)? {
            None => Ok(None),
            Some(key_mr) => self
                .dblock(&key_mr)?
                .ok_or(KVGetError::ValueExpectedButNotFound {
                    key: Key::DBlock { key_mr },
                })
                .map(Some),
        }
    }

    /// Get the most recently persisted directory block.
    fn dblock_head(&self) -> Result<Option<DirectoryBlock>, KVGetError> {
        let head: Option<CryptoHash> =
            deserialize_value(self.get(&variables::DBLOCK_HEAD), Key::DBlockHead)?;
        match head {
            None => Ok(None),
            Some(key_mr) => self
                .dblock(&key_mr)?
                .ok_or(KVGetError::ValueExpectedButNotFound {
                    key: Key::DBlock { key_mr },
                })
                .map(Some),
        }
    }

    /* ↓↓↓ Sub-blocks ↓↓↓ */

    fn admin_block(&self, hash: &CryptoHash) -> Result<Option<AdminBlock>, KVGetError> {
        deserialize_value(
            self.get(&concat(&variables::ADMIN_BLOCKS, &hash.bytes())),
            Key::AdminBlock { hash: *hash },
        )
    }

    fn factoid_block(&self, key_mr: &CryptoHash) -> Result<Option<FactoidBlock>, KVGetError> {
        deserialize_value(
            self.get(&concat(&variables::FACTOID_BLOCKS, &key_mr.bytes())),
            Key::FactoidBlock { key_mr: *key_mr },
        )
    }

    fn entry_credit_block(
        &self,
        hash: &CryptoHash,
    ) -> Result<Option<EntryCreditBlock>, KVGetError> {
        deserialize_value(
            self.get(&concat(&variables::ENTRY_CREDIT_BLOCKS, &hash.bytes())),
            Key::EntryCreditBlock { hash: *hash },
        )
    }

    fn entry_block(&self, key_mr: &CryptoHash) -> Result<Option<EntryBlock>, KVGetError> {
        deserialize_value(
            self.get(&concat(&variables::ENTRY_BLOCKS, &key_mr.bytes())),
            Key::EntryBlock { key_mr: *key_mr },
        )
    }

    /* ↓↓↓ Entries ↓↓↓ */

    fn entry(&self, hash: &CryptoHash) -> Result<Option<Entry>, KVGetError> {
        deserialize_value(
            self.get(&concat(&variables::ENTRIES, &hash.bytes())),
            Key::Entry { hash: *hash },
        )
    }

    fn entry_chain_head(&self, chain_id: &CryptoHash) -> Result<Option<CryptoHash>, KVGetError> {
        deserialize_value(
            self.get(&concat(&variables::ENTRY_CHAIN_HEAD, &chain_id.bytes())),
            Key::EntryChainHead {
                chain_id: *chain_id,
            },
        )
    }

    /* ↓↓↓ Chain State Checkpoint ↓↓↓ */

    fn chain_state_checkpoint(&self) -> Result<Option<ChainState>, KVGetError> {
        deserialize_value(
            self.get(&variables::CHAIN_STATE_CHECKPOINT),
            Key::ChainStateCheckpoint,
        )
    }
}

fn deserialize_value<T: BorshDeserialize>(
    bytes: Option<Vec<u8>>,
    key: Key,
) -> Result<Option<T>, KVGetError> {
    match bytes {
        None => Ok(None),
        Some(bytes) => T::deserialize(&mut bytes.as_slice())
            .map(Some)
            .map_err(|err| KVGetError::DeserializeValueError { key, source: err }),
    }
}

pub trait WriteBatch {
    fn new() -> Self;

    /// Stage `value` at `key`. An implementation may refuse the change (for example, because the batch
    /// has grown too large), in which case the whole batch should be discarded by the caller.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), BatchAppendError>;
}

/// Error when trying to read a value corresponding to a given key from the [key value store][KVStore].
/// The error may arise in the following circumstances:
/// 1. The value corresponding to a given key cannot be deserialized into its expected type,
/// 2. The value corresponding to a given key cannot be found, even though another stored value
///    references it.
#[derive(Debug)]
pub enum KVGetError {
    DeserializeValueError { key: Key, source: std::io::Error },
    ValueExpectedButNotFound { key: Key },
}

/// Error when trying to stage a value into a [`WriteBatch`].
#[derive(Debug)]
pub enum KVSetError {
    SerializeValueError { key: Key, source: std::io::Error },
    AppendRejected { key: Key, source: BatchAppendError },
}

/// Returned by [`WriteBatch::set`] when the batch refuses a change.
#[derive(Debug)]
pub struct BatchAppendError {
    pub reason: String,
}

/// Returned by [`KVStore::write`] when a batch could not be committed. Nothing in the batch was
/// written.
#[derive(Debug)]
pub struct KVWriteError {
    pub reason: String,
}

#[derive(Debug)]
pub enum Key {
    DBlock { key_mr: CryptoHash },
    DBlockAtHeight { height: BlockHeight },
    DBlockHead,
    AdminBlock { hash: CryptoHash },
    FactoidBlock { key_mr: CryptoHash },
    EntryCreditBlock { hash: CryptoHash },
    EntryBlock { key_mr: CryptoHash },
    Entry { hash: CryptoHash },
    EntryChainHead { chain_id: CryptoHash },
    ChainStateCheckpoint,
}

impl Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::DBlock { key_mr } => write!(f, "Directory Block {}", key_mr),
            Key::DBlockAtHeight { height } => write!(f, "Directory Block at height {}", height),
            Key::DBlockHead => write!(f, "Directory Block Head"),
            Key::AdminBlock { hash } => write!(f, "Admin Block {}", hash),
            Key::FactoidBlock { key_mr } => write!(f, "Factoid Block {}", key_mr),
            Key::EntryCreditBlock { hash } => write!(f, "Entry Credit Block {}", hash),
            Key::EntryBlock { key_mr } => write!(f, "Entry Block {}", key_mr),
            Key::Entry { hash } => write!(f, "Entry {}", hash),
            Key::EntryChainHead { chain_id } => write!(f, "Entry Chain Head for chain {}", chain_id),
            Key::ChainStateCheckpoint => write!(f, "Chain State Checkpoint"),
        }
    }
}
