//! Bounded single-producer/single-consumer FIFOs between the producer and the GS thread.
//!
//! Thin wrappers over [`rtrb`] that pin down the policy of the bus:
//! - `push` never blocks; a full FIFO rejects the value and hands it back.
//! - `pop` on an empty FIFO yields `None`; waiting is the consumer's choice.
//! - Delivery order equals submission order.

use crate::message::{GsCommand, GsReturn};

/// Default depth of the command FIFO. Sized for bursts of vertex traffic.
pub const COMMAND_FIFO_SIZE: usize = 1 << 18;

/// Default depth of the return FIFO. Events are far rarer than commands.
pub const RETURN_FIFO_SIZE: usize = 1024;

pub type CommandProducer = FifoProducer<GsCommand>;
pub type CommandConsumer = FifoConsumer<GsCommand>;
pub type ReturnProducer = FifoProducer<GsReturn>;
pub type ReturnConsumer = FifoConsumer<GsReturn>;

/// Writing end of a FIFO.
pub struct FifoProducer<T> {
    inner: rtrb::Producer<T>,
}

/// Reading end of a FIFO.
pub struct FifoConsumer<T> {
    inner: rtrb::Consumer<T>,
}

/// Creates a FIFO holding at most `capacity` elements.
#[must_use]
pub fn fifo<T>(capacity: usize) -> (FifoProducer<T>, FifoConsumer<T>) {
    let (producer, consumer) = rtrb::RingBuffer::new(capacity);
    (
        FifoProducer { inner: producer },
        FifoConsumer { inner: consumer },
    )
}

impl<T> FifoProducer<T> {
    /// Appends `value`, or gives it back if the FIFO is full.
    ///
    /// # Errors
    /// Returns the rejected value when no slot is free. Entries already queued are untouched.
    pub fn push(&mut self, value: T) -> Result<(), T> {
        self.inner.push(value).map_err(|rtrb::PushError::Full(value)| value)
    }

    /// Number of free slots, as seen from the producer.
    #[must_use]
    pub fn free_slots(&self) -> usize {
        self.inner.slots()
    }

    /// The consuming side has been dropped.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.inner.is_abandoned()
    }
}

impl<T> FifoConsumer<T> {
    pub fn pop(&mut self) -> Option<T> {
        self.inner.pop().ok()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// The producing side has been dropped.
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.inner.is_abandoned()
    }
}
