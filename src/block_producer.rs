/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Trait for the downstream component that builds the next set of blocks.
//!
//! The synchronizer does not build blocks itself. After every successful application of a block set,
//! it throws away its block producer and [rebuilds](BlockProducer::rebuild) a new one on top of a fresh
//! clone of the new [`ChainState`]. The producer therefore never aliases the synchronizer's own state.

use crate::{
    chain_state::ChainState,
    messages::{Ack, EntryMessage},
};

pub trait BlockProducer: Sized {
    /// Error returned when an acknowledged message cannot be included.
    type Error;

    /// Create a producer that builds the block set following `chain_state`.
    fn rebuild(chain_state: ChainState) -> Self;

    /// Include `message`, at the position given by `ack`, in the block set being built.
    fn process_acked_message(&mut self, message: EntryMessage, ack: Ack) -> Result<(), Self::Error>;
}
