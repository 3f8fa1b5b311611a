/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the `log_events` flag of
//! the [synchronizer's](crate::synchronizer::SynchronizerConfiguration) or the
//! [replay cache's](crate::replay::ReplayConfiguration) configuration.
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the event in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how applying the block set at height 12 is printed:
//!
//! ```text
//! ApplyBlockSet, 1701329264, 12, fNGCJyk
//! ```
//!
//! In the snippet, the fourth value is the first seven characters of the Base64 encoding of the key
//! Merkle root of the applied directory block.

use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use log;

use crate::types::data_types::{BlockHeight, CryptoHash};

// Names of each event in PascalCase for printing:
pub const APPLY_BLOCK_SET: &str = "ApplyBlockSet";
pub const BUFFER_BLOCK_SET: &str = "BufferBlockSet";
pub const DISCARD_BLOCK_SET: &str = "DiscardBlockSet";
pub const PERSIST_BLOCK_SET: &str = "PersistBlockSet";
pub const ABORT_BLOCK_SET_BATCH: &str = "AbortBlockSetBatch";
pub const CATCHUP: &str = "Catchup";
pub const SAVE_CHECKPOINT: &str = "SaveCheckpoint";
pub const REBUILD_BLOCK_PRODUCER: &str = "RebuildBlockProducer";
pub const REPLAY_REJECT: &str = "ReplayReject";

pub(crate) fn log_apply_block_set(height: BlockHeight, key_mr: &CryptoHash) {
    log::info!(
        "{}, {}, {}, {}",
        APPLY_BLOCK_SET,
        secs_since_unix_epoch(),
        height,
        first_seven_base64_chars(&key_mr.bytes())
    )
}

pub(crate) fn log_buffer_block_set(height: BlockHeight, current: BlockHeight, pending: usize) {
    log::info!(
        "{}, {}, {}, {}, {}",
        BUFFER_BLOCK_SET,
        secs_since_unix_epoch(),
        height,
        current,
        pending
    )
}

pub(crate) fn log_discard_block_set(height: BlockHeight, current: BlockHeight) {
    log::debug!(
        "{}, {}, {}, {}",
        DISCARD_BLOCK_SET,
        secs_since_unix_epoch(),
        height,
        current
    )
}

pub(crate) fn log_persist_block_set(height: BlockHeight, components: usize) {
    log::info!(
        "{}, {}, {}, {}",
        PERSIST_BLOCK_SET,
        secs_since_unix_epoch(),
        height,
        components
    )
}

pub(crate) fn log_abort_block_set_batch(height: BlockHeight) {
    log::info!(
        "{}, {}, {}",
        ABORT_BLOCK_SET_BATCH,
        secs_since_unix_epoch(),
        height
    )
}

pub(crate) fn log_catchup(start: BlockHeight, end: BlockHeight) {
    log::info!("{}, {}, {}, {}", CATCHUP, secs_since_unix_epoch(), start, end)
}

pub(crate) fn log_save_checkpoint(height: BlockHeight) {
    log::info!("{}, {}, {}", SAVE_CHECKPOINT, secs_since_unix_epoch(), height)
}

pub(crate) fn log_rebuild_block_producer(height: BlockHeight) {
    log::info!(
        "{}, {}, {}",
        REBUILD_BLOCK_PRODUCER,
        secs_since_unix_epoch(),
        height
    )
}

pub(crate) fn log_replay_reject(hash: &CryptoHash, reason: &str) {
    log::debug!(
        "{}, {}, {}, {}",
        REPLAY_REJECT,
        secs_since_unix_epoch(),
        first_seven_base64_chars(&hash.bytes()),
        reason
    )
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
