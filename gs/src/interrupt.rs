//! Interrupt forwarding to the external interrupt controller.
//!
//! The GS only ever *raises* its two lines. Masking, latching and
//! acknowledgement are the interrupt controller's business, so the
//! forwarder is called synchronously, once per command, with no queuing,
//! retry or coalescing on this side.

use std::fmt;

/// GS interrupt lines wired to the interrupt controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterruptLine {
    /// Drawing finished (FINISH event).
    Finish,
    /// Vertical sync.
    Vsync,
}

impl fmt::Display for InterruptLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finish => f.write_str("FINISH"),
            Self::Vsync => f.write_str("VSYNC"),
        }
    }
}

/// Capability to raise a GS interrupt line on the interrupt controller.
///
/// Owned by the GS thread once the bus is spawned, hence the `Send` bound.
pub trait InterruptForwarder: Send {
    fn raise(&mut self, line: InterruptLine);
}

impl<F> InterruptForwarder for F
where
    F: FnMut(InterruptLine) + Send,
{
    fn raise(&mut self, line: InterruptLine) {
        self(line);
    }
}
