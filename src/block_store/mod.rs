/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The persistent store of directory blocks, the blocks and entries they reference, and chain state
//! checkpoints.
//!
//! # Pluggable persistence
//!
//! - The block store is kept in persistent storage, most probably in the host's filesystem.
//! - Library users get to choose how exactly this is done.
//! - This crate merely requires that whatever the user provides as a persistence mechanism implements
//!   the abstract functionality of a key-value store with atomic, batched writes.
//! - This abstract functionality is made concrete by the traits defined in the [`pluggables`] module.
//!
//! # Batches
//!
//! Block sets are persisted through a [`BlockSetWriteBatch`]. The protocol is:
//! 1. [`BlockStore::begin_batch`].
//! 2. One `append_*` call per component.
//! 3. [`BlockStore::commit_batch`] if every append succeeded, [`BlockStore::abort_batch`] otherwise.
//!
//! A batch is only ever written with a single [`KVStore::write`], so a height is either fully
//! persisted or not persisted at all.

pub mod pluggables;

pub mod variables;

pub mod write_batch;

use crate::chain_state::ChainState;

use self::{
    pluggables::{KVGet, KVGetError, KVSetError, KVStore, KVWriteError},
    write_batch::BlockSetWriteBatch,
};

/// Read and write handle into the block store.
pub struct BlockStore<K: KVStore>(K);

impl<K: KVStore> BlockStore<K> {
    pub fn new(kv_store: K) -> Self {
        BlockStore(kv_store)
    }

    /// Get a consistent, read-only view of the block store.
    pub fn snapshot(&self) -> K::Snapshot<'_> {
        self.0.snapshot()
    }

    pub fn begin_batch(&self) -> BlockSetWriteBatch<K::WriteBatch> {
        BlockSetWriteBatch::new()
    }

    /// Atomically write the changes in `write_batch` into the block store.
    pub fn commit_batch(
        &mut self,
        write_batch: BlockSetWriteBatch<K::WriteBatch>,
    ) -> Result<(), BlockStoreError> {
        Ok(self.0.write(write_batch.0)?)
    }

    /// Discard `write_batch` without writing anything.
    pub fn abort_batch(&mut self, write_batch: BlockSetWriteBatch<K::WriteBatch>) {
        drop(write_batch)
    }

    /// Persist `chain_state` as the checkpoint that [`Catchup`](crate::synchronizer) resumes from.
    pub fn save_chain_state(&mut self, chain_state: &ChainState) -> Result<(), BlockStoreError> {
        let mut wb = self.begin_batch();
        wb.set_chain_state_checkpoint(chain_state)?;
        self.commit_batch(wb)
    }

    pub fn load_chain_state(&self) -> Result<Option<ChainState>, BlockStoreError> {
        Ok(self.0.chain_state_checkpoint()?)
    }
}

/// Error when reading from or writing into the [`BlockStore`].
#[derive(Debug)]
pub enum BlockStoreError {
    /// A value could not be read or decoded.
    KVGetError(KVGetError),

    /// A value could not be staged into a batch.
    KVSetError(KVSetError),

    /// A batch could not be committed. Nothing in it was written.
    KVWriteError(KVWriteError),
}

impl From<KVGetError> for BlockStoreError {
    fn from(value: KVGetError) -> Self {
        BlockStoreError::KVGetError(value)
    }
}

impl From<KVSetError> for BlockStoreError {
    fn from(value: KVSetError) -> Self {
        BlockStoreError::KVSetError(value)
    }
}

impl From<KVWriteError> for BlockStoreError {
    fn from(value: KVWriteError) -> Self {
        BlockStoreError::KVWriteError(value)
    }
}
