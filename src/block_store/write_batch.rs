/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! [`BlockSetWriteBatch`]: typed appends of block set components into one atomic write.

use borsh::BorshSerialize;

use crate::{
    chain_state::ChainState,
    types::blocks::{AdminBlock, DirectoryBlock, Entry, EntryBlock, EntryCreditBlock, FactoidBlock},
};

use super::{
    pluggables::{KVSetError, Key, WriteBatch},
    variables::{self, concat},
};

/// A [`WriteBatch`] that knows where each block store variable lives.
///
/// Get one from [`BlockStore::begin_batch`](super::BlockStore::begin_batch), append components to it,
/// then either [commit](super::BlockStore::commit_batch) or [abort](super::BlockStore::abort_batch) it.
/// Nothing appended becomes visible before the commit.
pub struct BlockSetWriteBatch<W: WriteBatch>(pub(super) W);

impl<W: WriteBatch> BlockSetWriteBatch<W> {
    pub(crate) fn new() -> BlockSetWriteBatch<W> {
        BlockSetWriteBatch(W::new())
    }

    /* ↓↓↓ Directory Block ↓↓↓ */

    /// Stage `dblock`, index it by height, and make it the directory block head.
    pub fn append_dblock(&mut self, dblock: &DirectoryBlock) -> Result<(), KVSetError> {
        let key_mr = dblock.key_mr();
        self.set(
            &concat(&variables::DBLOCKS, &key_mr.bytes()),
            dblock,
            || Key::DBlock { key_mr },
        )?;
        self.set(
            &concat(&variables::DBLOCK_AT_HEIGHT, &dblock.height.to_le_bytes()),
            &key_mr,
            || Key::DBlockAtHeight {
                height: dblock.height,
            },
        )?;
        self.set(&variables::DBLOCK_HEAD, &key_mr, || Key::DBlockHead)
    }

    /* ↓↓↓ Sub-blocks ↓↓↓ */

    pub fn append_admin_block(&mut self, admin_block: &AdminBlock) -> Result<(), KVSetError> {
        let hash = admin_block.hash();
        self.set(
            &concat(&variables::ADMIN_BLOCKS, &hash.bytes()),
            admin_block,
            || Key::AdminBlock { hash },
        )
    }

    pub fn append_factoid_block(&mut self, factoid_block: &FactoidBlock) -> Result<(), KVSetError> {
        let key_mr = factoid_block.key_mr();
        self.set(
            &concat(&variables::FACTOID_BLOCKS, &key_mr.bytes()),
            factoid_block,
            || Key::FactoidBlock { key_mr },
        )
    }

    pub fn append_entry_credit_block(
        &mut self,
        entry_credit_block: &EntryCreditBlock,
    ) -> Result<(), KVSetError> {
        let hash = entry_credit_block.hash();
        self.set(
            &concat(&variables::ENTRY_CREDIT_BLOCKS, &hash.bytes()),
            entry_credit_block,
            || Key::EntryCreditBlock { hash },
        )
    }

    /// Stage `entry_block` and make it the head of its entry chain.
    pub fn append_entry_block(&mut self, entry_block: &EntryBlock) -> Result<(), KVSetError> {
        let key_mr = entry_block.key_mr();
        let chain_id = entry_block.chain_id;
        self.set(
            &concat(&variables::ENTRY_BLOCKS, &key_mr.bytes()),
            entry_block,
            || Key::EntryBlock { key_mr },
        )?;
        self.set(
            &concat(&variables::ENTRY_CHAIN_HEAD, &chain_id.bytes()),
            &key_mr,
            || Key::EntryChainHead { chain_id },
        )
    }

    /* ↓↓↓ Entries ↓↓↓ */

    pub fn append_entry(&mut self, entry: &Entry) -> Result<(), KVSetError> {
        let hash = entry.hash();
        self.set(
            &concat(&variables::ENTRIES, &hash.bytes()),
            entry,
            || Key::Entry { hash },
        )
    }

    /* ↓↓↓ Chain State Checkpoint ↓↓↓ */

    pub fn set_chain_state_checkpoint(&mut self, chain_state: &ChainState) -> Result<(), KVSetError> {
        self.set(
            &variables::CHAIN_STATE_CHECKPOINT,
            chain_state,
            || Key::ChainStateCheckpoint,
        )
    }

    fn set<T: BorshSerialize>(
        &mut self,
        key: &[u8],
        value: &T,
        key_name: impl Fn() -> Key,
    ) -> Result<(), KVSetError> {
        let bytes = value
            .try_to_vec()
            .map_err(|err| KVSetError::SerializeValueError {
                key: key_name(),
                source: err,
            })?;
        self.0
            .set(key, &bytes)
            .map_err(|err| KVSetError::AppendRejected {
                key: key_name(),
                source: err,
            })
    }
}
