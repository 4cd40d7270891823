/// The identity of a node on the bus
///
/// Valid node IDs are 1 through 127. Node ID 0 is reserved for broadcast NMT commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u8);

impl NodeId {
    /// The smallest assignable node ID
    pub const MIN: u8 = 1;
    /// The largest assignable node ID
    pub const MAX: u8 = 127;

    /// Create a NodeId, failing if `value` is outside of 1..=127
    pub const fn new(value: u8) -> Result<Self, InvalidNodeIdError> {
        if value >= Self::MIN && value <= Self::MAX {
            Ok(NodeId(value))
        } else {
            Err(InvalidNodeIdError { value })
        }
    }

    /// Get the node ID as an integer
    pub const fn raw(&self) -> u8 {
        self.0
    }
}

/// Error returned when constructing a [`NodeId`] from an out of range value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidNodeIdError {
    /// The rejected value
    pub value: u8,
}

impl core::fmt::Display for InvalidNodeIdError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Invalid node ID {}, must be in 1..=127", self.value)
    }
}
impl core::error::Error for InvalidNodeIdError {}

impl TryFrom<u8> for NodeId {
    type Error = InvalidNodeIdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        NodeId::new(value)
    }
}

impl From<NodeId> for u8 {
    fn from(value: NodeId) -> Self {
        value.raw()
    }
}
