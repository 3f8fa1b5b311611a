/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Chain-height synchronization core of a blockchain full node.
//!
//! - The [synchronizer](synchronizer) applies block sets to the node's [chain state](chain_state) one
//!   height at a time, buffering the ones that arrive early, and persists each height atomically into
//!   a pluggable [block store](block_store).
//! - The [assembler](assembler) reads one height's block set back out of the block store, which the
//!   synchronizer uses to rebuild its state on startup.
//! - The [replay cache](replay) deduplicates timestamped messages by hash within a sliding window of
//!   minutes. It does not depend on the rest of the crate.

pub mod assembler;

pub mod block_producer;

pub mod block_store;

pub mod chain_state;

pub mod logging;

pub mod messages;

pub mod replay;

pub mod synchronizer;

pub mod types;
