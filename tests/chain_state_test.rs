//! Tests of the validation rules of [`ChainState::process_block_set`].

mod common;

use dbstate_sync::{
    chain_state::{ChainState, ChainStateError, NetworkVariant},
    types::{
        blocks::{Entry, ENTRY_CREDIT_CHAIN_ID},
        data_types::{BlockHeight, CryptoHash},
    },
};

use common::chain::{generate_chain, GENERIC_CHAIN_ID};

const NETWORK: NetworkVariant = NetworkVariant::MainNet;

#[test]
fn genesis_is_empty_at_height_zero() {
    let genesis = ChainState::genesis(NETWORK);

    assert!(genesis.is_empty());
    assert_eq!(genesis.dblock_height(), BlockHeight::new(0));
    assert_eq!(genesis.dblock_head(), CryptoHash::zero());
    assert_eq!(genesis.network().network_id(), 0xFA92E5A2);
}

#[test]
fn applying_a_chain_records_every_head() {
    let chain = generate_chain(NETWORK, 3);
    let mut chain_state = ChainState::genesis(NETWORK);
    for block_set in &chain {
        chain_state.process_block_set(block_set).unwrap();
    }

    let last = &chain[2];
    assert_eq!(chain_state.dblock_height(), BlockHeight::new(2));
    assert_eq!(chain_state.dblock_head(), last.dblock.as_ref().unwrap().key_mr());
    assert_eq!(chain_state.admin_head(), last.admin_block.as_ref().unwrap().hash());
    assert_eq!(
        chain_state.factoid_head(),
        last.factoid_block.as_ref().unwrap().key_mr()
    );
    assert_eq!(
        chain_state.entry_credit_head(),
        last.entry_credit_block.as_ref().unwrap().hash()
    );
    assert_eq!(
        chain_state.entry_chain_head(&GENERIC_CHAIN_ID),
        Some(last.entry_blocks[1].key_mr())
    );
    assert!(chain
        .iter()
        .flat_map(|block_set| block_set.entries.iter())
        .all(|entry| chain_state.contains_special_entry(&entry.hash())));
}

#[test]
fn block_set_must_be_the_next_height() {
    let chain = generate_chain(NETWORK, 3);
    let mut chain_state = ChainState::genesis(NETWORK);

    assert_eq!(
        chain_state.process_block_set(&chain[1]),
        Err(ChainStateError::UnexpectedHeight {
            expected: BlockHeight::new(0),
            found: BlockHeight::new(1),
        })
    );

    chain_state.process_block_set(&chain[0]).unwrap();
    assert_eq!(
        chain_state.process_block_set(&chain[0]),
        Err(ChainStateError::UnexpectedHeight {
            expected: BlockHeight::new(1),
            found: BlockHeight::new(0),
        })
    );
}

#[test]
fn block_set_must_link_to_the_head() {
    let chain = generate_chain(NETWORK, 2);
    let mut chain_state = ChainState::genesis(NETWORK);
    chain_state.process_block_set(&chain[0]).unwrap();
    let before = chain_state.clone();

    let mut forked = chain[1].clone();
    forked.dblock.as_mut().unwrap().prev_key_mr = CryptoHash::digest(b"fork");

    assert!(matches!(
        chain_state.process_block_set(&forked),
        Err(ChainStateError::BrokenLink { chain_id: None, .. })
    ));
    assert_eq!(chain_state, before);
}

#[test]
fn directory_block_of_another_network_is_rejected() {
    let chain = generate_chain(NetworkVariant::TestNet, 1);
    let mut chain_state = ChainState::genesis(NETWORK);

    assert_eq!(
        chain_state.process_block_set(&chain[0]),
        Err(ChainStateError::WrongNetwork {
            expected: NetworkVariant::MainNet.network_id(),
            found: NetworkVariant::TestNet.network_id(),
        })
    );
}

#[test]
fn listed_blocks_must_be_carried() {
    let chain = generate_chain(NETWORK, 1);
    let mut chain_state = ChainState::genesis(NETWORK);

    let mut without_entry_credit = chain[0].clone();
    without_entry_credit.entry_credit_block = None;
    assert_eq!(
        chain_state.process_block_set(&without_entry_credit),
        Err(ChainStateError::MissingComponent {
            chain_id: ENTRY_CREDIT_CHAIN_ID
        })
    );

    let mut without_entry_block = chain[0].clone();
    without_entry_block.entry_blocks.pop();
    assert_eq!(
        chain_state.process_block_set(&without_entry_block),
        Err(ChainStateError::MissingComponent {
            chain_id: GENERIC_CHAIN_ID
        })
    );

    assert!(chain_state.is_empty());
}

#[test]
fn unlisted_entry_blocks_are_rejected() {
    let chain = generate_chain(NETWORK, 1);
    let mut chain_state = ChainState::genesis(NETWORK);
    let mut extra = chain[0].clone();
    let mut stray = extra.entry_blocks[1].clone();
    stray.chain_id = CryptoHash::digest(b"stray");
    extra.entry_blocks.push(stray.clone());

    assert_eq!(
        chain_state.process_block_set(&extra),
        Err(ChainStateError::UnlistedEntryBlock {
            chain_id: stray.chain_id
        })
    );
}

#[test]
fn entries_of_ordinary_chains_are_rejected() {
    let chain = generate_chain(NETWORK, 1);
    let mut chain_state = ChainState::genesis(NETWORK);
    let mut with_entry = chain[0].clone();
    let entry = Entry {
        chain_id: GENERIC_CHAIN_ID,
        ext_ids: Vec::new(),
        content: b"not special".to_vec(),
    };
    with_entry.entries.push(entry.clone());

    assert_eq!(
        chain_state.process_block_set(&with_entry),
        Err(ChainStateError::UnexpectedEntry {
            chain_id: GENERIC_CHAIN_ID,
            entry: entry.hash(),
        })
    );
    assert!(!chain_state.contains_special_entry(&with_entry.entries[0].hash()));
}
