//! Generator of block sets that link up into a valid chain.

use std::collections::HashMap;

use dbstate_sync::{
    chain_state::NetworkVariant,
    messages::{DBStateMessage, Envelope},
    types::{
        block_set::BlockSet,
        blocks::{
            AdminBlock, DirectoryBlock, DirectoryBlockEntry, Entry, EntryBlock, EntryCreditBlock,
            FactoidBlock, ADMIN_CHAIN_ID, ENTRY_CREDIT_CHAIN_ID, FACTOID_CHAIN_ID,
            IDENTITY_CHAIN_ID,
        },
        data_types::{BlockHeight, CryptoHash},
    },
};

/// A generic, non-special entry chain that every generated block set extends.
pub(crate) const GENERIC_CHAIN_ID: CryptoHash = CryptoHash::new([0x42; 32]);

pub(crate) struct ChainBuilder {
    network: NetworkVariant,
    height: u64,
    prev_dblock: CryptoHash,
    prev_admin: CryptoHash,
    prev_factoid: CryptoHash,
    prev_entry_credit: CryptoHash,
    entry_chain_heads: HashMap<CryptoHash, CryptoHash>,
}

impl ChainBuilder {
    pub(crate) fn new(network: NetworkVariant) -> ChainBuilder {
        ChainBuilder {
            network,
            height: 0,
            prev_dblock: CryptoHash::zero(),
            prev_admin: CryptoHash::zero(),
            prev_factoid: CryptoHash::zero(),
            prev_entry_credit: CryptoHash::zero(),
            entry_chain_heads: HashMap::new(),
        }
    }

    /// Build the block set at the next height, carrying an admin, factoid and entry-credit block, one
    /// entry block of the identity chain with two entries, and one entry block of a generic chain.
    pub(crate) fn next_block_set(&mut self) -> BlockSet {
        let height = BlockHeight::new(self.height);

        let admin_block = AdminBlock {
            height,
            prev_hash: self.prev_admin,
            body: format!("admin {}", self.height).into_bytes(),
        };
        let factoid_block = FactoidBlock {
            height,
            prev_key_mr: self.prev_factoid,
            body: format!("factoid {}", self.height).into_bytes(),
        };
        let entry_credit_block = EntryCreditBlock {
            height,
            prev_hash: self.prev_entry_credit,
            body: format!("entry credit {}", self.height).into_bytes(),
        };

        let entries: Vec<Entry> = (0..2)
            .map(|i| Entry {
                chain_id: IDENTITY_CHAIN_ID,
                ext_ids: vec![b"identity".to_vec()],
                content: format!("identity entry {} at {}", i, self.height).into_bytes(),
            })
            .collect();
        let mut minute_marker = [0u8; 32];
        minute_marker[31] = 1;
        let identity_block = self.entry_block(
            IDENTITY_CHAIN_ID,
            height,
            vec![
                entries[0].hash(),
                CryptoHash::new(minute_marker),
                entries[1].hash(),
            ],
        );
        let generic_block = self.entry_block(
            GENERIC_CHAIN_ID,
            height,
            vec![CryptoHash::digest(format!("generic {}", self.height).as_bytes())],
        );

        let dblock = DirectoryBlock {
            network_id: self.network.network_id(),
            height,
            prev_key_mr: self.prev_dblock,
            timestamp: 27_000_000 + 10 * self.height as u32,
            entries: vec![
                DirectoryBlockEntry {
                    chain_id: ADMIN_CHAIN_ID,
                    key_mr: admin_block.hash(),
                },
                DirectoryBlockEntry {
                    chain_id: ENTRY_CREDIT_CHAIN_ID,
                    key_mr: entry_credit_block.hash(),
                },
                DirectoryBlockEntry {
                    chain_id: FACTOID_CHAIN_ID,
                    key_mr: factoid_block.key_mr(),
                },
                DirectoryBlockEntry {
                    chain_id: IDENTITY_CHAIN_ID,
                    key_mr: identity_block.key_mr(),
                },
                DirectoryBlockEntry {
                    chain_id: GENERIC_CHAIN_ID,
                    key_mr: generic_block.key_mr(),
                },
            ],
        };

        self.height += 1;
        self.prev_dblock = dblock.key_mr();
        self.prev_admin = admin_block.hash();
        self.prev_factoid = factoid_block.key_mr();
        self.prev_entry_credit = entry_credit_block.hash();
        self.entry_chain_heads
            .insert(IDENTITY_CHAIN_ID, identity_block.key_mr());
        self.entry_chain_heads
            .insert(GENERIC_CHAIN_ID, generic_block.key_mr());

        BlockSet {
            dblock: Some(dblock),
            admin_block: Some(admin_block),
            factoid_block: Some(factoid_block),
            entry_credit_block: Some(entry_credit_block),
            entry_blocks: vec![identity_block, generic_block],
            entries,
        }
    }

    fn entry_block(
        &self,
        chain_id: CryptoHash,
        height: BlockHeight,
        entry_hashes: Vec<CryptoHash>,
    ) -> EntryBlock {
        EntryBlock {
            chain_id,
            sequence: self.height as u32,
            height,
            prev_key_mr: self
                .entry_chain_heads
                .get(&chain_id)
                .copied()
                .unwrap_or(CryptoHash::zero()),
            entry_hashes,
        }
    }
}

/// Generate the block sets of heights `0..len`.
pub(crate) fn generate_chain(network: NetworkVariant, len: usize) -> Vec<BlockSet> {
    let mut builder = ChainBuilder::new(network);
    (0..len).map(|_| builder.next_block_set()).collect()
}

pub(crate) fn db_state_envelope(block_set: &BlockSet) -> Envelope {
    Envelope::db_state(&DBStateMessage::new(block_set.clone())).unwrap()
}
