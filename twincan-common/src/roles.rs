//! Node role and core-count mode
//!
//! Both are fixed for the lifetime of a node and checked once when the node is built.

/// Which side of a node owns the physical bus
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "snake_case"))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// Owns the transport, runs heartbeat and PDOs, and transmits SDO responses
    Primary,
    /// Has no transport. May only own the object dictionary and serve SDO requests.
    Secondary,
}

/// How many cores share the node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "snake_case"))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// A single Primary node performs every step
    SingleCore,
    /// A Primary and a Secondary node split the work through a shared arena
    DualCore,
}
