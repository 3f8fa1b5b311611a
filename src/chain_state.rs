/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! [`ChainState`]: the node's cumulative view of the ledger at some height.
//!
//! A `ChainState` only ever moves forward, one [`BlockSet`] at a time, through
//! [`process_block_set`](ChainState::process_block_set). Either the whole block set is applied or (if
//! it returns an error) the state is left exactly as it was.
//!
//! # Genesis
//!
//! A freshly created state (see [`ChainState::genesis`]) is at height 0 with the all-zero hash as its
//! directory block head. This pair means "nothing applied yet": the next block set it accepts is the
//! one at height 0, whose `prev_key_mr` must be the zero hash. After that, every block set must be at
//! `height + 1` and link to the current head.

use std::collections::{BTreeMap, BTreeSet};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    block_set::BlockSet,
    blocks::{
        is_special_chain, ChainKind, ADMIN_CHAIN_ID, ENTRY_CREDIT_CHAIN_ID, FACTOID_CHAIN_ID,
    },
    data_types::{BlockHeight, CryptoHash},
};

/// Which network a node follows. Each variant has its own genesis state and network id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum NetworkVariant {
    MainNet,
    TestNet,
    LocalNet,
}

impl NetworkVariant {
    /// The id carried by every directory block of this network.
    pub const fn network_id(&self) -> u32 {
        match self {
            NetworkVariant::MainNet => 0xFA92E5A2,
            NetworkVariant::TestNet => 0xFA92E5A3,
            NetworkVariant::LocalNet => 0xFA92E5A4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ChainState {
    network: NetworkVariant,
    dblock_height: BlockHeight,
    dblock_head: CryptoHash,
    admin_head: CryptoHash,
    factoid_head: CryptoHash,
    entry_credit_head: CryptoHash,
    entry_chain_heads: BTreeMap<CryptoHash, CryptoHash>,
    special_entries: BTreeSet<CryptoHash>,
}

impl ChainState {
    /// Create the state a node of `network` starts from before any block set is applied.
    pub fn genesis(network: NetworkVariant) -> ChainState {
        ChainState {
            network,
            dblock_height: BlockHeight::new(0),
            dblock_head: CryptoHash::zero(),
            admin_head: CryptoHash::zero(),
            factoid_head: CryptoHash::zero(),
            entry_credit_head: CryptoHash::zero(),
            entry_chain_heads: BTreeMap::new(),
            special_entries: BTreeSet::new(),
        }
    }

    pub fn network(&self) -> NetworkVariant {
        self.network
    }

    pub fn dblock_height(&self) -> BlockHeight {
        self.dblock_height
    }

    /// Key Merkle root of the last applied directory block, or the zero hash if none was applied.
    pub fn dblock_head(&self) -> CryptoHash {
        self.dblock_head
    }

    /// Whether no block set has been applied yet.
    pub fn is_empty(&self) -> bool {
        self.dblock_head.is_zero()
    }

    pub fn admin_head(&self) -> CryptoHash {
        self.admin_head
    }

    pub fn factoid_head(&self) -> CryptoHash {
        self.factoid_head
    }

    pub fn entry_credit_head(&self) -> CryptoHash {
        self.entry_credit_head
    }

    /// Key Merkle root of the newest entry block of `chain_id`.
    pub fn entry_chain_head(&self, chain_id: &CryptoHash) -> Option<CryptoHash> {
        self.entry_chain_heads.get(chain_id).copied()
    }

    /// Whether an entry of a special chain with `hash` has been applied.
    pub fn contains_special_entry(&self, hash: &CryptoHash) -> bool {
        self.special_entries.contains(hash)
    }

    /// Apply `block_set` on top of this state.
    ///
    /// The block set must:
    /// 1. Carry a directory block of this state's network.
    /// 2. Be the next height (see [genesis](self#genesis)) and link to the current head.
    /// 3. Carry exactly the admin, factoid, entry-credit and entry blocks its directory block lists, in
    ///    the listed order, with every entry block linking to its chain's previous head.
    /// 4. Only carry entries of special chains.
    ///
    /// Nothing is changed if any of these does not hold.
    pub fn process_block_set(&mut self, block_set: &BlockSet) -> Result<(), ChainStateError> {
        let dblock = block_set
            .dblock
            .as_ref()
            .ok_or(ChainStateError::MissingDirectoryBlock)?;

        if dblock.network_id != self.network.network_id() {
            return Err(ChainStateError::WrongNetwork {
                expected: self.network.network_id(),
                found: dblock.network_id,
            });
        }

        let expected_height = if self.is_empty() {
            BlockHeight::new(0)
        } else {
            self.dblock_height + 1
        };
        if dblock.height != expected_height {
            return Err(ChainStateError::UnexpectedHeight {
                expected: expected_height,
                found: dblock.height,
            });
        }
        if dblock.prev_key_mr != self.dblock_head {
            return Err(ChainStateError::BrokenLink {
                chain_id: None,
                expected_prev: self.dblock_head,
                found_prev: dblock.prev_key_mr,
            });
        }

        let mut admin_head = None;
        let mut factoid_head = None;
        let mut entry_credit_head = None;
        let mut entry_chain_heads = Vec::new();
        let mut entry_blocks = block_set.entry_blocks.iter();

        for dblock_entry in &dblock.entries {
            let chain_id = dblock_entry.chain_id;
            let found = match ChainKind::of(&chain_id) {
                ChainKind::Admin => {
                    let hash = block_set.admin_block.as_ref().map(|block| block.hash());
                    admin_head = hash;
                    hash
                }
                ChainKind::Factoid => {
                    let key_mr = block_set.factoid_block.as_ref().map(|block| block.key_mr());
                    factoid_head = key_mr;
                    key_mr
                }
                ChainKind::EntryCredit => {
                    let hash = block_set
                        .entry_credit_block
                        .as_ref()
                        .map(|block| block.hash());
                    entry_credit_head = hash;
                    hash
                }
                ChainKind::Entry => match entry_blocks.next() {
                    Some(entry_block) if entry_block.chain_id == chain_id => {
                        let prev = self
                            .entry_chain_heads
                            .get(&chain_id)
                            .copied()
                            .unwrap_or(CryptoHash::zero());
                        if entry_block.prev_key_mr != prev {
                            return Err(ChainStateError::BrokenLink {
                                chain_id: Some(chain_id),
                                expected_prev: prev,
                                found_prev: entry_block.prev_key_mr,
                            });
                        }
                        let key_mr = entry_block.key_mr();
                        entry_chain_heads.push((chain_id, key_mr));
                        Some(key_mr)
                    }
                    _ => None,
                },
            };

            match found {
                None => return Err(ChainStateError::MissingComponent { chain_id }),
                Some(found) if found != dblock_entry.key_mr => {
                    return Err(ChainStateError::ComponentMismatch {
                        chain_id,
                        expected: dblock_entry.key_mr,
                        found,
                    })
                }
                Some(_) => (),
            }
        }

        if let Some(extra) = entry_blocks.next() {
            return Err(ChainStateError::UnlistedEntryBlock {
                chain_id: extra.chain_id,
            });
        }
        for (chain_id, head) in [
            (ADMIN_CHAIN_ID, admin_head),
            (FACTOID_CHAIN_ID, factoid_head),
            (ENTRY_CREDIT_CHAIN_ID, entry_credit_head),
        ] {
            if head.is_none() {
                return Err(ChainStateError::MissingComponent { chain_id });
            }
        }
        if let Some(entry) = block_set
            .entries
            .iter()
            .find(|entry| !is_special_chain(&entry.chain_id))
        {
            return Err(ChainStateError::UnexpectedEntry {
                chain_id: entry.chain_id,
                entry: entry.hash(),
            });
        }

        self.dblock_height = dblock.height;
        self.dblock_head = dblock.key_mr();
        self.admin_head = admin_head.unwrap_or(self.admin_head);
        self.factoid_head = factoid_head.unwrap_or(self.factoid_head);
        self.entry_credit_head = entry_credit_head.unwrap_or(self.entry_credit_head);
        self.entry_chain_heads.extend(entry_chain_heads);
        self.special_entries
            .extend(block_set.entries.iter().map(|entry| entry.hash()));

        Ok(())
    }
}

/// Why a [`BlockSet`] could not be applied to a [`ChainState`].
#[derive(Debug, PartialEq, Eq)]
pub enum ChainStateError {
    MissingDirectoryBlock,
    WrongNetwork {
        expected: u32,
        found: u32,
    },
    UnexpectedHeight {
        expected: BlockHeight,
        found: BlockHeight,
    },
    /// A block does not link to the head of its chain. `chain_id` is `None` for the directory block
    /// chain.
    BrokenLink {
        chain_id: Option<CryptoHash>,
        expected_prev: CryptoHash,
        found_prev: CryptoHash,
    },
    /// The directory block lists `chain_id`, but the block set does not carry its block.
    MissingComponent {
        chain_id: CryptoHash,
    },
    ComponentMismatch {
        chain_id: CryptoHash,
        expected: CryptoHash,
        found: CryptoHash,
    },
    UnlistedEntryBlock {
        chain_id: CryptoHash,
    },
    UnexpectedEntry {
        chain_id: CryptoHash,
        entry: CryptoHash,
    },
}
