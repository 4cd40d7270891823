//! The Communication-Object table
//!
//! Every frame a node sends or receives belongs to one of sixteen communication object kinds. The
//! bus identifier of each kind is derived from the node ID following the CANopen predefined
//! connection set: some kinds are global (NMT, SYNC, TIME), the rest add the node ID to a fixed
//! function code.
//!
//! The table is also the slot map for the transport: kind `k` is configured in hardware slot
//! `k as u8`, so a receive event reporting a slot index can be turned back into a kind with
//! [`CobKind::try_from`].

use int_enum::IntEnum;

use crate::NodeId;

/// The number of communication object kinds, and of transport slots
pub const NUM_COB_KINDS: usize = 16;
/// The number of transmit and of receive PDOs
pub const NUM_PDOS: usize = 4;

/// Communication object kind
///
/// The discriminant is the transport slot index used for the kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, IntEnum)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum CobKind {
    /// Placeholder slot. Transmit direction with zero length, never used.
    Dummy = 0,
    Nmt = 1,
    Sync = 2,
    Emcy = 3,
    Time = 4,
    Tpdo1 = 5,
    Tpdo2 = 6,
    Tpdo3 = 7,
    Tpdo4 = 8,
    Rpdo1 = 9,
    Rpdo2 = 10,
    Rpdo3 = 11,
    Rpdo4 = 12,
    Tsdo = 13,
    Rsdo = 14,
    Heartbeat = 15,
}

/// Whether a communication object is sent or received by the node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Sent by this node
    Tx,
    /// Received by this node
    Rx,
}

impl CobKind {
    /// All kinds in slot order
    pub const ALL: [CobKind; NUM_COB_KINDS] = [
        CobKind::Dummy,
        CobKind::Nmt,
        CobKind::Sync,
        CobKind::Emcy,
        CobKind::Time,
        CobKind::Tpdo1,
        CobKind::Tpdo2,
        CobKind::Tpdo3,
        CobKind::Tpdo4,
        CobKind::Rpdo1,
        CobKind::Rpdo2,
        CobKind::Rpdo3,
        CobKind::Rpdo4,
        CobKind::Tsdo,
        CobKind::Rsdo,
        CobKind::Heartbeat,
    ];

    /// The transmit PDO kinds, indexed by zero-based slot
    pub const TPDOS: [CobKind; NUM_PDOS] = [
        CobKind::Tpdo1,
        CobKind::Tpdo2,
        CobKind::Tpdo3,
        CobKind::Tpdo4,
    ];

    /// The receive PDO kinds, indexed by zero-based slot
    pub const RPDOS: [CobKind; NUM_PDOS] = [
        CobKind::Rpdo1,
        CobKind::Rpdo2,
        CobKind::Rpdo3,
        CobKind::Rpdo4,
    ];

    /// Get the transmit PDO kind for a zero-based PDO slot
    pub fn tpdo(slot: usize) -> Option<CobKind> {
        Self::TPDOS.get(slot).copied()
    }

    /// Get the receive PDO kind for a zero-based PDO slot
    pub fn rpdo(slot: usize) -> Option<CobKind> {
        Self::RPDOS.get(slot).copied()
    }

    /// If this is a receive PDO, return its zero-based slot
    pub fn rpdo_slot(&self) -> Option<usize> {
        Self::RPDOS.iter().position(|k| k == self)
    }

    /// If this is a transmit PDO, return its zero-based slot
    pub fn tpdo_slot(&self) -> Option<usize> {
        Self::TPDOS.iter().position(|k| k == self)
    }

    /// The transport slot index this kind is configured in
    pub fn slot(&self) -> u8 {
        (*self).into()
    }

    /// The function code base added to the node ID to form the bus identifier
    pub const fn function_code(&self) -> u16 {
        match self {
            CobKind::Dummy => 0x000,
            CobKind::Nmt => 0x000,
            CobKind::Sync => 0x080,
            CobKind::Emcy => 0x080,
            CobKind::Time => 0x100,
            CobKind::Tpdo1 => 0x180,
            CobKind::Rpdo1 => 0x200,
            CobKind::Tpdo2 => 0x280,
            CobKind::Rpdo2 => 0x300,
            CobKind::Tpdo3 => 0x380,
            CobKind::Rpdo3 => 0x400,
            CobKind::Tpdo4 => 0x480,
            CobKind::Rpdo4 => 0x500,
            CobKind::Tsdo => 0x580,
            CobKind::Rsdo => 0x600,
            CobKind::Heartbeat => 0x700,
        }
    }

    /// Returns true if the node ID is added to the function code
    pub const fn is_node_relative(&self) -> bool {
        !matches!(self, CobKind::Nmt | CobKind::Sync | CobKind::Time)
    }

    /// The direction of the object from this node's point of view
    pub const fn direction(&self) -> Direction {
        match self {
            CobKind::Nmt
            | CobKind::Sync
            | CobKind::Time
            | CobKind::Rpdo1
            | CobKind::Rpdo2
            | CobKind::Rpdo3
            | CobKind::Rpdo4
            | CobKind::Rsdo => Direction::Rx,
            CobKind::Dummy
            | CobKind::Emcy
            | CobKind::Tpdo1
            | CobKind::Tpdo2
            | CobKind::Tpdo3
            | CobKind::Tpdo4
            | CobKind::Tsdo
            | CobKind::Heartbeat => Direction::Tx,
        }
    }

    /// The payload length in bytes of frames of this kind
    pub const fn payload_len(&self) -> usize {
        match self {
            CobKind::Dummy => 0,
            CobKind::Nmt => 2,
            CobKind::Sync => 0,
            CobKind::Time => 6,
            CobKind::Heartbeat => 1,
            _ => 8,
        }
    }
}

/// A single row of the [`CobTable`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommunicationObject {
    /// The object kind
    pub kind: CobKind,
    /// The 11-bit bus identifier
    pub bus_id: u16,
    /// Transmit or receive
    pub direction: Direction,
    /// Frame payload length in bytes
    pub payload_len: usize,
}

impl CommunicationObject {
    /// Build the row for `kind` on node `node_id`
    pub const fn new(kind: CobKind, node_id: NodeId) -> Self {
        let bus_id = if kind.is_node_relative() {
            kind.function_code() + node_id.raw() as u16
        } else {
            kind.function_code()
        };
        Self {
            kind,
            bus_id,
            direction: kind.direction(),
            payload_len: kind.payload_len(),
        }
    }
}

/// The sixteen communication objects of a node, indexed by kind
///
/// Computed once from the node ID and never modified afterward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CobTable {
    objects: [CommunicationObject; NUM_COB_KINDS],
}

impl CobTable {
    /// Compute the table for a node
    pub fn new(node_id: NodeId) -> Self {
        let objects = CobKind::ALL.map(|kind| CommunicationObject::new(kind, node_id));
        Self { objects }
    }

    /// Get the object for a kind
    pub fn get(&self, kind: CobKind) -> &CommunicationObject {
        &self.objects[kind.slot() as usize]
    }

    /// Get the bus identifier for a kind
    pub fn bus_id(&self, kind: CobKind) -> u16 {
        self.get(kind).bus_id
    }

    /// Find the receive object whose bus identifier matches `bus_id`
    ///
    /// Only receive objects are considered. Transmit objects carry this node's own frames, so a
    /// frame on one of their identifiers is not for us.
    pub fn lookup(&self, bus_id: u16) -> Option<CobKind> {
        self.objects
            .iter()
            .find(|obj| obj.direction == Direction::Rx && obj.bus_id == bus_id)
            .map(|obj| obj.kind)
    }

    /// Iterate over all objects in slot order
    pub fn iter(&self) -> impl Iterator<Item = &CommunicationObject> {
        self.objects.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(id: u8) -> CobTable {
        CobTable::new(NodeId::new(id).unwrap())
    }

    #[test]
    fn test_bus_ids_for_node_5() {
        let t = table(5);
        assert_eq!(0x000, t.bus_id(CobKind::Nmt));
        assert_eq!(0x080, t.bus_id(CobKind::Sync));
        assert_eq!(0x085, t.bus_id(CobKind::Emcy));
        assert_eq!(0x100, t.bus_id(CobKind::Time));
        assert_eq!(0x185, t.bus_id(CobKind::Tpdo1));
        assert_eq!(0x285, t.bus_id(CobKind::Tpdo2));
        assert_eq!(0x385, t.bus_id(CobKind::Tpdo3));
        assert_eq!(0x485, t.bus_id(CobKind::Tpdo4));
        assert_eq!(0x205, t.bus_id(CobKind::Rpdo1));
        assert_eq!(0x305, t.bus_id(CobKind::Rpdo2));
        assert_eq!(0x405, t.bus_id(CobKind::Rpdo3));
        assert_eq!(0x505, t.bus_id(CobKind::Rpdo4));
        assert_eq!(0x585, t.bus_id(CobKind::Tsdo));
        assert_eq!(0x605, t.bus_id(CobKind::Rsdo));
        assert_eq!(0x705, t.bus_id(CobKind::Heartbeat));
    }

    #[test]
    fn test_table_is_slot_ordered() {
        let t = table(1);
        for (slot, obj) in t.iter().enumerate() {
            assert_eq!(slot as u8, obj.kind.slot());
            assert_eq!(Ok(obj.kind), CobKind::try_from(slot as u8));
        }
        assert!(CobKind::try_from(16).is_err());
    }

    #[test]
    fn test_dummy_is_inert() {
        let t = table(9);
        let dummy = t.get(CobKind::Dummy);
        assert_eq!(Direction::Tx, dummy.direction);
        assert_eq!(0, dummy.payload_len);
    }

    #[test]
    fn test_lookup_only_matches_receive_objects() {
        let t = table(0x22);
        assert_eq!(Some(CobKind::Rsdo), t.lookup(0x622));
        assert_eq!(Some(CobKind::Rpdo3), t.lookup(0x422));
        assert_eq!(Some(CobKind::Nmt), t.lookup(0x000));
        assert_eq!(Some(CobKind::Sync), t.lookup(0x080));
        // Our own TSDO and heartbeat are never delivered back to us
        assert_eq!(None, t.lookup(0x5A2));
        assert_eq!(None, t.lookup(0x722));
        // Another node's RPDO
        assert_eq!(None, t.lookup(0x423));
    }

    #[test]
    fn test_pdo_slot_mapping() {
        assert_eq!(Some(CobKind::Tpdo1), CobKind::tpdo(0));
        assert_eq!(Some(CobKind::Rpdo4), CobKind::rpdo(3));
        assert_eq!(None, CobKind::rpdo(4));
        assert_eq!(Some(2), CobKind::Rpdo3.rpdo_slot());
        assert_eq!(None, CobKind::Tpdo3.rpdo_slot());
        assert_eq!(Some(1), CobKind::Tpdo2.tpdo_slot());
    }
}
