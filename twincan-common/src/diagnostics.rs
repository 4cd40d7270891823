//! Diagnostics sink interface
//!
//! A node never fails at runtime. Bus faults, overruns and transmit failures are reported to a
//! [`Diagnostics`] implementation provided by the application, which decides whether to log them,
//! latch them in an error register, or ignore them.

use crate::cob::CobKind;

/// A condition which stays active until it is cleared
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Warning {
    /// The transport reported a bus error. Cleared by the next good frame.
    BusError,
    /// The receive PDO in the given zero-based slot has not been received within its timeout
    RpdoTimeout(usize),
}

/// A one-shot diagnostic event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// A receive PDO arrived before the previous one was consumed. The new frame was dropped.
    RpdoOverrun(usize),
    /// An SDO request arrived while another transaction was outstanding. It was dropped.
    SdoOverrun,
    /// The transport refused a frame of the given kind
    TransmitFailed(CobKind),
}

/// Receives warnings and events from a node
///
/// Methods may be called from interrupt context and from either core, and must not block.
pub trait Diagnostics: Sync {
    /// Mark a warning as active
    fn raise_warning(&self, warning: Warning);
    /// Mark a warning as no longer active
    fn clear_warning(&self, warning: Warning);
    /// Record a one-shot event
    fn push_message(&self, event: Event);
}

/// A sink which discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn raise_warning(&self, _warning: Warning) {}
    fn clear_warning(&self, _warning: Warning) {}
    fn push_message(&self, _event: Event) {}
}
