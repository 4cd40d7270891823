//! Collaborator traits
//!
//! A node talks to its hardware through three narrow interfaces: a [`Clock`], a [`Transport`] for
//! the CAN peripheral, and the [`Diagnostics`](crate::diagnostics::Diagnostics) sink. The
//! transport calls back into the node through a [`ReceiveHandler`].

use snafu::Snafu;

use crate::cob::{CobKind, CommunicationObject};

/// A monotonic millisecond counter
///
/// Wrap-around is not handled.
pub trait Clock: Sync {
    /// Milliseconds since an arbitrary epoch
    fn now_ms(&self) -> u64;
}

/// A bus error reported by the transport
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Bit stuffing violation
    Stuff,
    /// Fixed-form field violation
    Form,
    /// Transmitted frame was not acknowledged
    Ack,
    /// Monitored bit differed from the transmitted one
    Bit,
    /// Checksum mismatch
    Crc,
    /// Controller entered the bus-off state
    BusOff,
    /// Receive FIFO overflowed in hardware
    Overflow,
    /// Any other controller specific fault
    Other,
}

/// An event delivered to the [`ReceiveHandler`] from interrupt context
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RxEvent<'a> {
    /// A frame arrived in the slot of the given kind. The transport has already copied it out of
    /// the hardware slot.
    Frame(&'a [u8]),
    /// The controller reported an error
    Error(BusError),
}

/// Receives transport events in interrupt context
///
/// Implementations must be short and non-blocking.
pub trait ReceiveHandler: Sync {
    /// Handle an event for the slot holding `kind`
    fn on_receive(&self, kind: CobKind, event: RxEvent<'_>);
}

/// Error returned by a [`Transport`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Snafu)]
pub enum TransportError {
    /// The hardware slot could not be configured
    #[snafu(display("Failed to configure slot {slot}"))]
    SlotConfig {
        /// The slot index
        slot: u8,
    },
    /// The transmit mailbox is full
    TxBusy,
    /// The kind is not a configured transmit object
    #[snafu(display("Slot {slot} is not a transmit slot"))]
    NotTransmit {
        /// The slot index
        slot: u8,
    },
    /// The controller is bus-off or otherwise unable to transmit
    BusOff,
}

/// The CAN peripheral as seen by a node
///
/// The node configures one hardware slot per [`CommunicationObject`] at construction, and
/// afterward only sends by kind. Inbound frames are delivered to the registered
/// [`ReceiveHandler`] with the kind of the slot they arrived in.
pub trait Transport {
    /// Configure the hardware slot for `object`
    fn configure_slot(&mut self, object: &CommunicationObject) -> Result<(), TransportError>;

    /// Transmit `data` on the slot of `kind`
    fn send(&mut self, kind: CobKind, data: &[u8]) -> Result<(), TransportError>;

    /// Register the handler called from the receive interrupt
    fn register_receive_handler(&mut self, handler: &'static dyn ReceiveHandler);

    /// Unmask receive and error interrupts
    fn enable_interrupts(&mut self);

    /// Mask receive and error interrupts
    fn disable_interrupts(&mut self);
}
