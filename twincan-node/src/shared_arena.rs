//! The region of memory shared by the cores of a node
//!
//! Everything which crosses from the receive interrupt or from one core to the other lives in a
//! [`SharedArena`]. There is exactly one arena per physical bus. On a dual-core part it must be
//! placed in memory visible to both cores, e.g.
//!
//! ```ignore
//! #[link_section = ".shared_ram"]
//! static ARENA: SharedArena = SharedArena::new();
//! ```
//!
//! The arena also records which node has claimed the Primary role and which has claimed the object
//! dictionary, so that a second claim on the same bus fails at construction.
use twincan_common::{cob::NUM_PDOS, sdo::SDO_FRAME_LEN, AtomicCell, Role};

use crate::mailbox::MailboxSlot;

/// Payload capacity of an RPDO slot
pub const PDO_PAYLOAD_LEN: usize = 8;

/// Statically allocatable state shared between the cores of a node
#[allow(missing_debug_implementations)]
pub struct SharedArena {
    rpdos: [MailboxSlot<PDO_PAYLOAD_LEN>; NUM_PDOS],
    rpdo_received_at: [AtomicCell<Option<u64>>; NUM_PDOS],
    sdo_request: MailboxSlot<SDO_FRAME_LEN>,
    sdo_response: MailboxSlot<SDO_FRAME_LEN>,
    primary_claimed: AtomicCell<bool>,
    responder: AtomicCell<Option<Role>>,
}

impl Default for SharedArena {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedArena {
    /// Create an empty arena
    pub const fn new() -> Self {
        Self {
            rpdos: [const { MailboxSlot::new() }; NUM_PDOS],
            rpdo_received_at: [const { AtomicCell::new(None) }; NUM_PDOS],
            sdo_request: MailboxSlot::new(),
            sdo_response: MailboxSlot::new(),
            primary_claimed: AtomicCell::new(false),
            responder: AtomicCell::new(None),
        }
    }

    /// Returns true if the RPDO in `slot` holds an unconsumed payload
    pub fn rpdo_pending(&self, slot: usize) -> bool {
        self.rpdos.get(slot).is_some_and(|r| r.is_pending())
    }

    /// The time the RPDO in `slot` last arrived, if it ever has
    pub fn rpdo_received_at(&self, slot: usize) -> Option<u64> {
        self.rpdo_received_at.get(slot).and_then(|t| t.load())
    }

    /// Returns true if an SDO request is waiting for the responder
    pub fn sdo_request_pending(&self) -> bool {
        self.sdo_request.is_pending()
    }

    /// Returns true if an SDO response is waiting to be transmitted
    pub fn sdo_response_pending(&self) -> bool {
        self.sdo_response.is_pending()
    }

    /// The role of the node serving SDO requests on this bus, if one has been built
    pub fn responder(&self) -> Option<Role> {
        self.responder.load()
    }

    pub(crate) fn rpdo(&self, slot: usize) -> &MailboxSlot<PDO_PAYLOAD_LEN> {
        &self.rpdos[slot]
    }

    pub(crate) fn record_rpdo_arrival(&self, slot: usize, now: u64) {
        self.rpdo_received_at[slot].store(Some(now));
    }

    pub(crate) fn sdo_request(&self) -> &MailboxSlot<SDO_FRAME_LEN> {
        &self.sdo_request
    }

    pub(crate) fn sdo_response(&self) -> &MailboxSlot<SDO_FRAME_LEN> {
        &self.sdo_response
    }

    /// Claim the Primary role. Returns false if it is already taken.
    pub(crate) fn claim_primary(&self) -> bool {
        self.primary_claimed
            .fetch_update(|claimed| (!claimed).then_some(true))
            .is_ok()
    }

    pub(crate) fn release_primary(&self) {
        self.primary_claimed.store(false);
    }

    /// Claim the object dictionary for a node of `role`. Returns false if it is already taken.
    pub(crate) fn claim_responder(&self, role: Role) -> bool {
        self.responder
            .fetch_update(|owner| owner.is_none().then_some(Some(role)))
            .is_ok()
    }

    pub(crate) fn release_responder(&self) {
        self.responder.store(None);
    }
}
