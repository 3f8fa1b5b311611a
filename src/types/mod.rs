/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types shared by the synchronizer, the assembler, the block store, and the replay cache.
//!
//! - [`data_types`]: "inert" newtypes following the newtype pattern.
//! - [`blocks`]: the ledger objects that make up one height of the chain.
//! - [`block_set`]: the aggregation of those objects for one height.

pub mod block_set;

pub mod blocks;

pub mod data_types;
