/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! [`BlockSet`]: everything the chain gained at one height.

use borsh::{BorshDeserialize, BorshSerialize};

use super::{
    blocks::{AdminBlock, DirectoryBlock, Entry, EntryBlock, EntryCreditBlock, FactoidBlock},
    data_types::BlockHeight,
};

/// A directory block together with the blocks it references and the entries of special chains.
///
/// A `BlockSet` is rebuilt per height, either by the [assembler](crate::assembler) from storage or by a
/// peer that sends it inside a [`DBStateMessage`](crate::messages::DBStateMessage). It is never
/// persisted as a whole.
///
/// An assembled `BlockSet` is *empty* (every field `None` or empty) if storage had no directory block at
/// the requested height.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BlockSet {
    pub dblock: Option<DirectoryBlock>,
    pub admin_block: Option<AdminBlock>,
    pub factoid_block: Option<FactoidBlock>,
    pub entry_credit_block: Option<EntryCreditBlock>,
    /// In the order they are listed in the directory block.
    pub entry_blocks: Vec<EntryBlock>,
    pub entries: Vec<Entry>,
}

impl BlockSet {
    /// Height of the directory block, or `None` if this set is empty.
    pub fn height(&self) -> Option<BlockHeight> {
        self.dblock.as_ref().map(|dblock| dblock.height)
    }

    pub fn is_empty(&self) -> bool {
        self.dblock.is_none()
    }
}
