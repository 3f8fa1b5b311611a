/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The chain-height synchronizer: applies block sets to the node's [`ChainState`], one height at a
//! time, in order, no matter in what order they arrive.
//!
//! # Ownership
//!
//! [`DBStateSynchronizer`] exclusively owns the current `ChainState`. Nothing else holds a reference to
//! it for longer than a borrow: the [block producer](crate::block_producer) gets its own clone every
//! time the state advances.
//!
//! # Applying a block set
//!
//! A [`DBStateMessage`] at height `h` is handled as follows, where `next` is `0` if no block set has been
//! applied yet and `current + 1` otherwise:
//! 1. `h < next`: the message is stale and is ignored.
//! 2. `h > next`: the message is from the future. It is buffered in the pending queue.
//! 3. `h == next`: the current state is cloned and the block set is applied to the clone. The block set
//!    is then persisted in a single batch. Only if both steps succeed does the clone replace the current
//!    state.
//!
//! After a successful application, the pending queue is drained: messages that the state has moved past
//! are dropped, and the message at the new `next` height (if any) is applied, repeatedly, until no
//! pending message is at `next`. A pending message that is not a valid block set on top of the current
//! state is discarded, and the next one at the same height is tried. Then a checkpoint of the new state
//! is saved and the block producer is rebuilt on top of it. Both happen even if the drain or the
//! checkpoint fails, so the checkpoint and the block producer never lag behind the applied heights.
//!
//! # Persisting a block set
//!
//! The directory block, admin block, factoid block, entry-credit block, every entry block, and every
//! entry are appended to one [batch](crate::block_store#batches), in that order. If any append fails,
//! the batch is aborted and nothing is written. Otherwise the batch is committed as a single write.
//!
//! # Concurrency
//!
//! All mutating methods take `&mut self`: the synchronizer is meant to be driven by exactly one actor,
//! which serializes the messages it hands over. Persistence is synchronous.

use typed_builder::TypedBuilder;

use crate::{
    assembler::{assemble_at, AssembleError},
    block_producer::BlockProducer,
    block_store::{
        pluggables::{KVGet, KVSetError, KVStore, WriteBatch},
        write_batch::BlockSetWriteBatch,
        BlockStore, BlockStoreError,
    },
    chain_state::{ChainState, ChainStateError, NetworkVariant},
    logging,
    messages::{Ack, DBStateMessage, EntryMessage, Envelope, EnvelopeError},
    types::{block_set::BlockSet, data_types::BlockHeight},
};

/// Stores the user-defined parameters of a [`DBStateSynchronizer`].
///
/// ## Log Events
///
/// If `log_events` is set, the synchronizer logs the events listed in [`logging`](crate::logging)
/// using the [log](https://docs.rs/log/latest/log/) crate.
#[derive(Clone, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [SynchronizerConfiguration]. On the builder call the following methods to construct a valid [SynchronizerConfiguration].

    Optional:
    - `.log_events(...)`
"))]
pub struct SynchronizerConfiguration {
    #[builder(default = true, setter(doc = "Enable logging? Optional, defaults to `true`."))]
    pub log_events: bool,
}

/// What happened to a [`DBStateMessage`] handed to [`DBStateSynchronizer::handle_db_state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The message was applied, along with any pending messages it unblocked. `height` is the height of
    /// the current state afterwards.
    Applied { height: BlockHeight },

    /// The message is ahead of the next height and was buffered.
    Buffered,

    /// The message is at or below a height that has already been applied.
    Ignored,
}

pub struct DBStateSynchronizer<K: KVStore, P: BlockProducer> {
    config: SynchronizerConfiguration,
    current: Option<ChainState>,
    pending: Vec<DBStateMessage>,
    block_store: BlockStore<K>,
    block_producer: Option<P>,
}

impl<K: KVStore, P: BlockProducer> DBStateSynchronizer<K, P> {
    pub fn new(config: SynchronizerConfiguration, kv_store: K) -> Self {
        Self {
            config,
            current: None,
            pending: Vec::new(),
            block_store: BlockStore::new(kv_store),
            block_producer: None,
        }
    }

    /// Install the genesis state of `network`, unless a state is already installed.
    pub fn init_genesis(&mut self, network: NetworkVariant) {
        if self.current.is_none() {
            self.current = Some(ChainState::genesis(network));
        }
    }

    /// Rebuild the current state from the block store on startup.
    ///
    /// If the block store holds a checkpoint that is ahead of the current state, the checkpoint becomes
    /// the current state. Then every height from the one after the current state up to (but excluding)
    /// the height of the stored directory block head is assembled and applied. A checkpoint is saved
    /// and the block producer is rebuilt afterwards, even if one of the heights could not be replayed.
    ///
    /// Returns the height of the current state.
    pub fn catchup(&mut self) -> Result<BlockHeight, SynchronizerError> {
        if let Some(checkpoint) = self.block_store.load_chain_state()? {
            let is_ahead = match &self.current {
                None => true,
                Some(current) => {
                    !checkpoint.is_empty()
                        && (current.is_empty() || checkpoint.dblock_height() > current.dblock_height())
                }
            };
            if is_ahead {
                self.current = Some(checkpoint);
            }
        }

        let current = self
            .current
            .as_mut()
            .ok_or(SynchronizerError::NotInitialized)?;
        let replayed = replay_stored(&self.block_store, current, self.config.log_events);

        let checkpointed = self.save_checkpoint();
        self.rebuild_block_producer();
        replayed?;
        checkpointed?;
        Ok(self.current_height())
    }

    /// Open `envelope` as a [`DBStateMessage`] and [handle](Self::handle_db_state) it.
    pub fn handle_message(&mut self, envelope: &Envelope) -> Result<HandleOutcome, SynchronizerError> {
        let msg = envelope.open_db_state()?;
        self.handle_db_state(msg)
    }

    /// Apply, buffer, or ignore `msg`, as described in [applying a block set](self#applying-a-block-set).
    ///
    /// If this returns [`SynchronizerError::Checkpoint`], every height was applied and persisted, and
    /// only the checkpoint is missing. If it returns any other error, the current state is exactly as it
    /// was before the call, except for the heights that were successfully applied before the failing one.
    pub fn handle_db_state(
        &mut self,
        msg: DBStateMessage,
    ) -> Result<HandleOutcome, SynchronizerError> {
        let height = msg
            .height()
            .ok_or(SynchronizerError::InvalidBlockSet(
                ChainStateError::MissingDirectoryBlock,
            ))?;
        let current = self
            .current
            .as_ref()
            .ok_or(SynchronizerError::NotInitialized)?;
        let next = next_height(current);

        if height < next {
            if self.config.log_events {
                logging::log_discard_block_set(height, current.dblock_height());
            }
            return Ok(HandleOutcome::Ignored);
        }

        if height > next {
            let current_height = current.dblock_height();
            self.pending.push(msg);
            if self.config.log_events {
                logging::log_buffer_block_set(height, current_height, self.pending.len());
            }
            return Ok(HandleOutcome::Buffered);
        }

        self.apply(&msg)?;
        let drained = self.drain_pending();
        let checkpointed = self.save_checkpoint();
        self.rebuild_block_producer();
        drained?;
        checkpointed?;

        Ok(HandleOutcome::Applied {
            height: self.current_height(),
        })
    }

    /// Hand an acknowledged entry message to the block producer.
    pub fn process_acked_message(
        &mut self,
        message: EntryMessage,
        ack: Ack,
    ) -> Result<(), AckedMessageError<P::Error>> {
        self.block_producer
            .as_mut()
            .ok_or(AckedMessageError::NoBlockProducer)?
            .process_acked_message(message, ack)
            .map_err(AckedMessageError::BlockProducer)
    }

    pub fn current(&self) -> Option<&ChainState> {
        self.current.as_ref()
    }

    /// Heights of the buffered messages, in the order they arrived.
    pub fn pending_heights(&self) -> Vec<BlockHeight> {
        self.pending.iter().filter_map(|msg| msg.height()).collect()
    }

    pub fn block_producer(&self) -> Option<&P> {
        self.block_producer.as_ref()
    }

    pub fn block_store(&self) -> &BlockStore<K> {
        &self.block_store
    }

    /// Clone, apply, persist, then swap.
    fn apply(&mut self, msg: &DBStateMessage) -> Result<(), SynchronizerError> {
        let current = self
            .current
            .as_ref()
            .ok_or(SynchronizerError::NotInitialized)?;

        let mut next_state = current.clone();
        next_state.process_block_set(&msg.block_set)?;
        self.save_block_set(&msg.block_set)?;

        if self.config.log_events {
            logging::log_apply_block_set(next_state.dblock_height(), &next_state.dblock_head());
        }
        self.current = Some(next_state);
        Ok(())
    }

    /// Drop pending messages the state has moved past and apply the one at the next height, until none
    /// is at the next height.
    ///
    /// A message that is not a valid block set is discarded. A message that fails to apply for any other
    /// reason is put back where it was, and the drain stops.
    fn drain_pending(&mut self) -> Result<(), SynchronizerError> {
        loop {
            let current = self
                .current
                .as_ref()
                .ok_or(SynchronizerError::NotInitialized)?;
            let next = next_height(current);

            let (obsolete, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
                .into_iter()
                .partition(|msg| msg.height().map_or(true, |height| height < next));
            self.pending = pending;
            if self.config.log_events {
                for msg in &obsolete {
                    if let Some(height) = msg.height() {
                        logging::log_discard_block_set(height, current.dblock_height());
                    }
                }
            }

            let position = match self
                .pending
                .iter()
                .position(|msg| msg.height() == Some(next))
            {
                Some(position) => position,
                None => return Ok(()),
            };

            let msg = self.pending.remove(position);
            match self.apply(&msg) {
                Ok(()) => (),
                Err(SynchronizerError::InvalidBlockSet(_)) => {
                    if self.config.log_events {
                        logging::log_discard_block_set(next, self.current_height());
                    }
                }
                Err(err) => {
                    self.pending.insert(position, msg);
                    return Err(err);
                }
            }
        }
    }

    fn save_block_set(&mut self, block_set: &BlockSet) -> Result<(), SynchronizerError> {
        let height = block_set.height().unwrap_or_default();
        let mut wb = self.block_store.begin_batch();

        match append_block_set(&mut wb, block_set) {
            Ok(components) => {
                self.block_store.commit_batch(wb)?;
                if self.config.log_events {
                    logging::log_persist_block_set(height, components);
                }
                Ok(())
            }
            Err(err) => {
                self.block_store.abort_batch(wb);
                if self.config.log_events {
                    logging::log_abort_block_set_batch(height);
                }
                Err(BlockStoreError::from(err).into())
            }
        }
    }

    fn save_checkpoint(&mut self) -> Result<(), SynchronizerError> {
        if let Some(current) = &self.current {
            self.block_store
                .save_chain_state(current)
                .map_err(SynchronizerError::Checkpoint)?;
            if self.config.log_events {
                logging::log_save_checkpoint(current.dblock_height());
            }
        }
        Ok(())
    }

    fn rebuild_block_producer(&mut self) {
        if let Some(current) = &self.current {
            if self.config.log_events {
                logging::log_rebuild_block_producer(current.dblock_height());
            }
            self.block_producer = Some(P::rebuild(current.clone()));
        }
    }

    fn current_height(&self) -> BlockHeight {
        self.current
            .as_ref()
            .map(|current| current.dblock_height())
            .unwrap_or_default()
    }
}

/// The height of the block set `chain_state` accepts next: 0 if no block set was applied yet (the
/// state's head is the zero hash), `height + 1` otherwise.
fn next_height(chain_state: &ChainState) -> BlockHeight {
    if chain_state.is_empty() {
        BlockHeight::new(0)
    } else {
        chain_state.dblock_height() + 1
    }
}

/// Assemble and apply to `chain_state` every stored height from its next height up to (but excluding) the
/// height of the stored directory block head.
fn replay_stored<K: KVStore>(
    block_store: &BlockStore<K>,
    chain_state: &mut ChainState,
    log_events: bool,
) -> Result<(), SynchronizerError> {
    let start = next_height(chain_state);
    let snapshot = block_store.snapshot();
    let end = match snapshot.dblock_head().map_err(BlockStoreError::from)? {
        Some(dblock_head) => dblock_head.height,
        None => BlockHeight::new(0),
    };
    if log_events {
        logging::log_catchup(start, end);
    }

    // TODO: save a checkpoint every N heights so that an interrupted catchup does not restart from the
    // beginning.
    for height in start.int()..end.int() {
        let block_set = assemble_at(&snapshot, BlockHeight::new(height))?;
        chain_state.process_block_set(&block_set)?;
    }
    Ok(())
}

/// Append every component of `block_set` to `wb`. Returns how many components were appended.
fn append_block_set<W: WriteBatch>(
    wb: &mut BlockSetWriteBatch<W>,
    block_set: &BlockSet,
) -> Result<usize, KVSetError> {
    let mut components = 0;

    if let Some(dblock) = &block_set.dblock {
        wb.append_dblock(dblock)?;
        components += 1;
    }
    if let Some(admin_block) = &block_set.admin_block {
        wb.append_admin_block(admin_block)?;
        components += 1;
    }
    if let Some(factoid_block) = &block_set.factoid_block {
        wb.append_factoid_block(factoid_block)?;
        components += 1;
    }
    if let Some(entry_credit_block) = &block_set.entry_credit_block {
        wb.append_entry_credit_block(entry_credit_block)?;
        components += 1;
    }
    for entry_block in &block_set.entry_blocks {
        wb.append_entry_block(entry_block)?;
        components += 1;
    }
    for entry in &block_set.entries {
        wb.append_entry(entry)?;
        components += 1;
    }

    Ok(components)
}

#[derive(Debug)]
pub enum SynchronizerError {
    /// Neither [`init_genesis`](DBStateSynchronizer::init_genesis) nor a checkpoint has installed a
    /// state yet.
    NotInitialized,

    /// The envelope is not a [`DBStateMessage`], or its payload could not be decoded.
    Envelope(EnvelopeError),

    /// The block set cannot be applied to the current state.
    InvalidBlockSet(ChainStateError),

    /// A block set could not be read out of the block store.
    Assemble(AssembleError),

    /// Reading from or writing into the block store failed.
    BlockStore(BlockStoreError),

    /// The current state advanced and its block sets were persisted, but the checkpoint of it could not
    /// be saved.
    Checkpoint(BlockStoreError),
}

impl From<EnvelopeError> for SynchronizerError {
    fn from(value: EnvelopeError) -> Self {
        SynchronizerError::Envelope(value)
    }
}

impl From<ChainStateError> for SynchronizerError {
    fn from(value: ChainStateError) -> Self {
        SynchronizerError::InvalidBlockSet(value)
    }
}

impl From<AssembleError> for SynchronizerError {
    fn from(value: AssembleError) -> Self {
        SynchronizerError::Assemble(value)
    }
}

impl From<BlockStoreError> for SynchronizerError {
    fn from(value: BlockStoreError) -> Self {
        SynchronizerError::BlockStore(value)
    }
}

#[derive(Debug)]
pub enum AckedMessageError<E> {
    /// No block set has been applied or caught up to yet, so there is no block producer.
    NoBlockProducer,
    BlockProducer(E),
}
