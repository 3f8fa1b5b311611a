//! Integration tests of [`assemble_at`] over a block store filled through [`BlockStore`] batches.

mod common;

use dbstate_sync::{
    assembler::{assemble_at, AssembleError},
    block_store::{
        pluggables::{KVGetError, KVStore},
        variables::{self, concat},
        BlockStore, BlockStoreError,
    },
    chain_state::NetworkVariant,
    types::{
        block_set::BlockSet,
        blocks::{FACTOID_CHAIN_ID, IDENTITY_CHAIN_ID},
        data_types::BlockHeight,
    },
};

use common::{chain::generate_chain, mem_db::MemDB};

/// Persist every component of `block_sets`, one batch per height.
fn persist(kv_store: &MemDB, block_sets: &[BlockSet]) {
    let mut block_store = BlockStore::new(kv_store.clone());
    for block_set in block_sets {
        let mut wb = block_store.begin_batch();
        wb.append_dblock(block_set.dblock.as_ref().unwrap()).unwrap();
        wb.append_admin_block(block_set.admin_block.as_ref().unwrap())
            .unwrap();
        wb.append_factoid_block(block_set.factoid_block.as_ref().unwrap())
            .unwrap();
        wb.append_entry_credit_block(block_set.entry_credit_block.as_ref().unwrap())
            .unwrap();
        for entry_block in &block_set.entry_blocks {
            wb.append_entry_block(entry_block).unwrap();
        }
        for entry in &block_set.entries {
            wb.append_entry(entry).unwrap();
        }
        block_store.commit_batch(wb).unwrap();
    }
}

#[test]
fn assembles_what_was_persisted() {
    let kv_store = MemDB::new();
    let chain = generate_chain(NetworkVariant::TestNet, 3);
    persist(&kv_store, &chain);

    for (height, block_set) in chain.iter().enumerate() {
        let assembled = assemble_at(&kv_store.snapshot(), BlockHeight::new(height as u64)).unwrap();
        assert_eq!(assembled, *block_set);
    }
}

#[test]
fn only_entries_of_special_chains_are_carried() {
    let kv_store = MemDB::new();
    let chain = generate_chain(NetworkVariant::TestNet, 1);
    persist(&kv_store, &chain);

    let assembled = assemble_at(&kv_store, BlockHeight::new(0)).unwrap();

    assert_eq!(assembled.entry_blocks.len(), 2);
    assert_eq!(assembled.entries.len(), 2);
    assert!(assembled
        .entries
        .iter()
        .all(|entry| entry.chain_id == IDENTITY_CHAIN_ID));
}

#[test]
fn height_without_directory_block_is_empty() {
    let kv_store = MemDB::new();
    persist(&kv_store, &generate_chain(NetworkVariant::TestNet, 2));

    let assembled = assemble_at(&kv_store, BlockHeight::new(2)).unwrap();

    assert!(assembled.is_empty());
    assert_eq!(assembled, BlockSet::default());
}

#[test]
fn missing_entry_is_reported_as_corruption() {
    let kv_store = MemDB::new();
    let chain = generate_chain(NetworkVariant::TestNet, 1);
    persist(&kv_store, &chain);
    let lost = chain[0].entries[1].hash();
    kv_store.remove(&concat(&variables::ENTRIES, &lost.bytes()));

    match assemble_at(&kv_store, BlockHeight::new(0)) {
        Err(AssembleError::EntryExpectedButNotFound { entry_block, entry }) => {
            assert_eq!(entry_block, chain[0].entry_blocks[0].key_mr());
            assert_eq!(entry, lost);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn missing_block_is_reported() {
    let kv_store = MemDB::new();
    let chain = generate_chain(NetworkVariant::TestNet, 1);
    persist(&kv_store, &chain);
    let key_mr = chain[0].factoid_block.as_ref().unwrap().key_mr();
    kv_store.remove(&concat(&variables::FACTOID_BLOCKS, &key_mr.bytes()));

    match assemble_at(&kv_store, BlockHeight::new(0)) {
        Err(AssembleError::BlockExpectedButNotFound {
            chain_id,
            key_mr: missing,
        }) => {
            assert_eq!(chain_id, FACTOID_CHAIN_ID);
            assert_eq!(missing, key_mr);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn undecodable_value_is_a_block_store_error() {
    let kv_store = MemDB::new();
    let chain = generate_chain(NetworkVariant::TestNet, 1);
    persist(&kv_store, &chain);
    let key_mr = chain[0].dblock.as_ref().unwrap().key_mr();
    kv_store.insert(&concat(&variables::DBLOCKS, &key_mr.bytes()), &[0xff; 3]);

    assert!(matches!(
        assemble_at(&kv_store, BlockHeight::new(0)),
        Err(AssembleError::BlockStore(BlockStoreError::KVGetError(
            KVGetError::DeserializeValueError { .. }
        )))
    ));
}
