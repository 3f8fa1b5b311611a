//! A [`BlockProducer`] that records what it is given.

use std::cell::Cell;

use dbstate_sync::{
    block_producer::BlockProducer,
    chain_state::ChainState,
    messages::{Ack, EntryMessage},
    types::data_types::BlockHeight,
};

thread_local! {
    static REBUILDS: Cell<usize> = Cell::new(0);
}

/// Number of times [`MockProducer::rebuild`] has been called on this thread.
pub(crate) fn rebuilds() -> usize {
    REBUILDS.with(Cell::get)
}

pub(crate) struct MockProducer {
    pub(crate) chain_state: ChainState,
    pub(crate) processed: Vec<(EntryMessage, Ack)>,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum MockProducerError {
    WrongHeight {
        expected: BlockHeight,
        found: BlockHeight,
    },
}

impl BlockProducer for MockProducer {
    type Error = MockProducerError;

    fn rebuild(chain_state: ChainState) -> Self {
        REBUILDS.with(|rebuilds| rebuilds.set(rebuilds.get() + 1));
        MockProducer {
            chain_state,
            processed: Vec::new(),
        }
    }

    fn process_acked_message(&mut self, message: EntryMessage, ack: Ack) -> Result<(), Self::Error> {
        let expected = if self.chain_state.is_empty() {
            BlockHeight::new(0)
        } else {
            self.chain_state.dblock_height() + 1
        };
        if ack.dblock_height != expected {
            return Err(MockProducerError::WrongHeight {
                expected,
                found: ack.dblock_height,
            });
        }
        self.processed.push((message, ack));
        Ok(())
    }
}
