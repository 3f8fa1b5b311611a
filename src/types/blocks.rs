/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The ledger objects that make up one height of the chain.
//!
//! The internal byte layout of these objects is owned by the ledger itself. This module only models
//! what synchronization needs: the identifiers that link blocks together and let a directory block's
//! entries be classified, and an opaque `body` for everything else.
//!
//! # Reserved chain identifiers
//!
//! Three chain identifiers are reserved. Each is all zero bytes except the final byte:
//!
//! |Chain|Final byte|
//! |---|---|
//! |Admin|`0x0a`|
//! |Entry credit|`0x0c`|
//! |Factoid|`0x0f`|
//!
//! Any other chain identifier in a directory block's entry list names a generic entry chain.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};

use super::data_types::{BlockHeight, CryptoHash};

pub const ADMIN_CHAIN_ID: CryptoHash = reserved_chain_id(0x0a);
pub const ENTRY_CREDIT_CHAIN_ID: CryptoHash = reserved_chain_id(0x0c);
pub const FACTOID_CHAIN_ID: CryptoHash = reserved_chain_id(0x0f);

/// The identity registration chain. Entries in this chain are carried alongside their entry blocks
/// when a block set is assembled.
pub const IDENTITY_CHAIN_ID: CryptoHash = CryptoHash::new([
    0x88, 0x88, 0x88, 0x00, 0x17, 0x50, 0xed, 0xe0, 0xef, 0xf4, 0xb0, 0x5f, 0x0c, 0x3f, 0x55, 0x78,
    0x90, 0xb2, 0x56, 0x45, 0x0c, 0xab, 0xbb, 0x84, 0xca, 0xda, 0x93, 0x7f, 0x9c, 0x25, 0x83, 0x27,
]);

const fn reserved_chain_id(last: u8) -> CryptoHash {
    let mut bytes = [0u8; 32];
    bytes[31] = last;
    CryptoHash::new(bytes)
}

/// Whether entries of `chain_id` must travel with their entry blocks.
pub fn is_special_chain(chain_id: &CryptoHash) -> bool {
    *chain_id == IDENTITY_CHAIN_ID
}

/// What a directory block entry refers to, decided purely by its chain identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainKind {
    Admin,
    EntryCredit,
    Factoid,
    Entry,
}

impl ChainKind {
    pub fn of(chain_id: &CryptoHash) -> ChainKind {
        match *chain_id {
            ADMIN_CHAIN_ID => ChainKind::Admin,
            ENTRY_CREDIT_CHAIN_ID => ChainKind::EntryCredit,
            FACTOID_CHAIN_ID => ChainKind::Factoid,
            _ => ChainKind::Entry,
        }
    }
}

/// One line of a directory block: a chain and the key of that chain's block at this height.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DirectoryBlockEntry {
    pub chain_id: CryptoHash,
    pub key_mr: CryptoHash,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct DirectoryBlock {
    pub network_id: u32,
    pub height: BlockHeight,
    pub prev_key_mr: CryptoHash,
    /// Minutes since the Unix Epoch.
    pub timestamp: u32,
    pub entries: Vec<DirectoryBlockEntry>,
}

impl DirectoryBlock {
    pub fn key_mr(&self) -> CryptoHash {
        hash_of(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AdminBlock {
    pub height: BlockHeight,
    pub prev_hash: CryptoHash,
    pub body: Vec<u8>,
}

impl AdminBlock {
    pub fn hash(&self) -> CryptoHash {
        hash_of(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct FactoidBlock {
    pub height: BlockHeight,
    pub prev_key_mr: CryptoHash,
    pub body: Vec<u8>,
}

impl FactoidBlock {
    pub fn key_mr(&self) -> CryptoHash {
        hash_of(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct EntryCreditBlock {
    pub height: BlockHeight,
    pub prev_hash: CryptoHash,
    pub body: Vec<u8>,
}

impl EntryCreditBlock {
    pub fn hash(&self) -> CryptoHash {
        hash_of(self)
    }
}

/// The block of one entry chain at one directory block height.
///
/// `entry_hashes` lists the chain's entries in order, interleaved with
/// [minute markers](CryptoHash::is_minute_marker).
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct EntryBlock {
    pub chain_id: CryptoHash,
    pub sequence: u32,
    pub height: BlockHeight,
    pub prev_key_mr: CryptoHash,
    pub entry_hashes: Vec<CryptoHash>,
}

impl EntryBlock {
    pub fn key_mr(&self) -> CryptoHash {
        hash_of(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Entry {
    pub chain_id: CryptoHash,
    pub ext_ids: Vec<Vec<u8>>,
    pub content: Vec<u8>,
}

impl Entry {
    pub fn hash(&self) -> CryptoHash {
        hash_of(self)
    }
}

fn hash_of<T: BorshSerialize>(value: &T) -> CryptoHash {
    let mut hasher = Sha256::new();
    // Writing into a hasher never fails.
    let _ = value.serialize(&mut hasher);
    CryptoHash::new(hasher.finalize().into())
}
