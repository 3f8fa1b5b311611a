/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Byte-prefixes that specify where each block store variable is stored in the user-provided key-value
//! store.
//!
//! # List of variables
//!
//! |Variable|Type|Description|
//! |---|---|---|
//! |Directory Blocks|[`CryptoHash`] -> [`DirectoryBlock`](crate::types::blocks::DirectoryBlock)|Directory blocks by key Merkle root.|
//! |Directory Block at Height|[`BlockHeight`] -> [`CryptoHash`]|Key Merkle root of the directory block at each persisted height.|
//! |Directory Block Head|[`CryptoHash`]|Key Merkle root of the most recently persisted directory block.|
//! |Admin Blocks|[`CryptoHash`] -> [`AdminBlock`](crate::types::blocks::AdminBlock)|Admin blocks by hash.|
//! |Factoid Blocks|[`CryptoHash`] -> [`FactoidBlock`](crate::types::blocks::FactoidBlock)|Factoid blocks by key Merkle root.|
//! |Entry Credit Blocks|[`CryptoHash`] -> [`EntryCreditBlock`](crate::types::blocks::EntryCreditBlock)|Entry credit blocks by hash.|
//! |Entry Blocks|[`CryptoHash`] -> [`EntryBlock`](crate::types::blocks::EntryBlock)|Entry blocks by key Merkle root.|
//! |Entries|[`CryptoHash`] -> [`Entry`](crate::types::blocks::Entry)|Entries by entry hash.|
//! |Entry Chain Head|[`CryptoHash`] -> [`CryptoHash`]|Key Merkle root of the newest entry block of each entry chain.|
//! |Chain State Checkpoint|[`ChainState`](crate::chain_state::ChainState)|The last saved chain state.|
//!
//! Every value is Borsh-serialized. Single values sit at their one-byte constant key; mappings of the
//! form "`A` -> `B`" sit at the concatenation of the variable's one-byte prefix and the bytes of `A`
//! (for heights, its little-endian representation).
//!
//! [`CryptoHash`]: crate::types::data_types::CryptoHash
//! [`BlockHeight`]: crate::types::data_types::BlockHeight

pub const DBLOCKS: [u8; 1] = [0];
pub const DBLOCK_AT_HEIGHT: [u8; 1] = [1];
pub const DBLOCK_HEAD: [u8; 1] = [2];
pub const ADMIN_BLOCKS: [u8; 1] = [3];
pub const FACTOID_BLOCKS: [u8; 1] = [4];
pub const ENTRY_CREDIT_BLOCKS: [u8; 1] = [5];
pub const ENTRY_BLOCKS: [u8; 1] = [6];
pub const ENTRIES: [u8; 1] = [7];
pub const ENTRY_CHAIN_HEAD: [u8; 1] = [8];
pub const CHAIN_STATE_CHECKPOINT: [u8; 1] = [9];

/// Concatenate two byteslices into one vector.
pub fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut res = Vec::with_capacity(a.len() + b.len());
    res.extend_from_slice(a);
    res.extend_from_slice(b);
    res
}
