/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Reads one height's [`BlockSet`] back out of the [block store](crate::block_store).
//!
//! The assembler reads from a single [snapshot](crate::block_store::pluggables::KVStore::snapshot),
//! so a block set is never stitched together from two different versions of the store.
//!
//! ## Failures
//!
//! A height with no directory block is not an error: [`assemble_at`] returns an empty `BlockSet`.
//! Everything else that goes wrong aborts the assembly and is returned to the caller:
//! - [`AssembleError::BlockStore`]: a value could not be read or decoded.
//! - [`AssembleError::BlockExpectedButNotFound`]: the directory block lists a block that the store
//!   does not have.
//! - [`AssembleError::EntryExpectedButNotFound`]: an entry block of a special chain lists an entry
//!   that the store does not have. The store is corrupt.

use crate::{
    block_store::{pluggables::KVGet, BlockStoreError},
    types::{
        block_set::BlockSet,
        blocks::{is_special_chain, ChainKind},
        data_types::{BlockHeight, CryptoHash},
    },
};

/// Assemble the block set at `height` from `store`.
pub fn assemble_at<S: KVGet>(store: &S, height: BlockHeight) -> Result<BlockSet, AssembleError> {
    let mut block_set = BlockSet::default();

    let dblock = match store.dblock_at_height(height).map_err(BlockStoreError::from)? {
        Some(dblock) => dblock,
        None => return Ok(block_set),
    };

    for dblock_entry in &dblock.entries {
        let key_mr = dblock_entry.key_mr;
        let chain_id = dblock_entry.chain_id;
        let missing = || AssembleError::BlockExpectedButNotFound { chain_id, key_mr };

        match ChainKind::of(&chain_id) {
            ChainKind::Admin => {
                let admin_block = store
                    .admin_block(&key_mr)
                    .map_err(BlockStoreError::from)?
                    .ok_or_else(missing)?;
                block_set.admin_block = Some(admin_block);
            }
            ChainKind::EntryCredit => {
                let entry_credit_block = store
                    .entry_credit_block(&key_mr)
                    .map_err(BlockStoreError::from)?
                    .ok_or_else(missing)?;
                block_set.entry_credit_block = Some(entry_credit_block);
            }
            ChainKind::Factoid => {
                let factoid_block = store
                    .factoid_block(&key_mr)
                    .map_err(BlockStoreError::from)?
                    .ok_or_else(missing)?;
                block_set.factoid_block = Some(factoid_block);
            }
            ChainKind::Entry => {
                let entry_block = store
                    .entry_block(&key_mr)
                    .map_err(BlockStoreError::from)?
                    .ok_or_else(missing)?;

                if is_special_chain(&entry_block.chain_id) {
                    for entry_hash in entry_block
                        .entry_hashes
                        .iter()
                        .filter(|hash| !hash.is_minute_marker())
                    {
                        let entry = store
                            .entry(entry_hash)
                            .map_err(BlockStoreError::from)?
                            .ok_or(AssembleError::EntryExpectedButNotFound {
                                entry_block: key_mr,
                                entry: *entry_hash,
                            })?;
                        block_set.entries.push(entry);
                    }
                }

                block_set.entry_blocks.push(entry_block);
            }
        }
    }

    block_set.dblock = Some(dblock);
    Ok(block_set)
}

#[derive(Debug)]
pub enum AssembleError {
    BlockStore(BlockStoreError),

    /// The directory block lists `key_mr` for `chain_id`, but the block is not in the store.
    BlockExpectedButNotFound {
        chain_id: CryptoHash,
        key_mr: CryptoHash,
    },

    /// `entry_block` lists `entry`, but the entry is not in the store.
    EntryExpectedButNotFound {
        entry_block: CryptoHash,
        entry: CryptoHash,
    },
}

impl From<BlockStoreError> for AssembleError {
    fn from(value: BlockStoreError) -> Self {
        AssembleError::BlockStore(value)
    }
}
