//! Implements the receive side of a node
use defmt_or_log::{debug, trace, warn};
use twincan_common::{
    cob::CobTable,
    diagnostics::{Diagnostics, Event, Warning},
    messages::{CanId, CanMessage, NmtCommand},
    traits::{BusError, Clock, ReceiveHandler, RxEvent},
    AtomicCell, CobKind, NodeId,
};

use crate::shared_arena::SharedArena;

/// A data structure to be shared between the transport receive interrupt and the Primary
/// [`Node`](crate::Node)
///
/// The node registers it with its transport as the [`ReceiveHandler`] during construction.
/// Transports which only know bus identifiers may instead pass frames to
/// [`NodeMbox::store_message`].
///
/// Frames are staged in the [`SharedArena`] and picked up by the next call to
/// [`Node::run`](crate::Node::run). Nothing is staged until a node has been built with this
/// mailbox.
#[allow(missing_debug_implementations)]
pub struct NodeMbox {
    arena: &'static SharedArena,
    clock: &'static dyn Clock,
    diagnostics: &'static dyn Diagnostics,
    node_id: AtomicCell<Option<NodeId>>,
    nmt_mbox: AtomicCell<Option<NmtCommand>>,
    bus_fault: AtomicCell<bool>,
    notify_cb: AtomicCell<Option<&'static (dyn Fn() + Sync)>>,
}

impl NodeMbox {
    /// Create a new NodeMbox
    ///
    /// # Args
    ///
    /// - `arena`: The arena of the bus this mailbox receives for
    /// - `clock`: Used to timestamp RPDO arrivals
    /// - `diagnostics`: Receives bus error warnings and overrun events
    pub const fn new(
        arena: &'static SharedArena,
        clock: &'static dyn Clock,
        diagnostics: &'static dyn Diagnostics,
    ) -> Self {
        Self {
            arena,
            clock,
            diagnostics,
            node_id: AtomicCell::new(None),
            nmt_mbox: AtomicCell::new(None),
            bus_fault: AtomicCell::new(false),
            notify_cb: AtomicCell::new(None),
        }
    }

    /// Set a callback for notification when a message is received and requires processing.
    ///
    /// It must be static. Usually this will be a static fn, but in some circumstances, it may be
    /// desirable to use Box::leak to pass a heap allocated closure instead.
    pub fn set_process_notify_callback(&self, callback: &'static (dyn Fn() + Sync)) {
        self.notify_cb.store(Some(callback));
    }

    fn notify(&self) {
        if let Some(notify_cb) = self.notify_cb.load() {
            notify_cb();
        }
    }

    pub(crate) fn arena(&self) -> &'static SharedArena {
        self.arena
    }

    pub(crate) fn attach(&self, node_id: NodeId) {
        self.node_id.store(Some(node_id));
    }

    pub(crate) fn take_nmt_command(&self) -> Option<NmtCommand> {
        self.nmt_mbox.take()
    }

    /// Returns true while a bus error is latched
    pub fn bus_fault(&self) -> bool {
        self.bus_fault.load()
    }

    /// Store a received CAN message
    ///
    /// Returns the message back if it is not addressed to this node.
    pub fn store_message(&self, msg: CanMessage) -> Result<(), CanMessage> {
        let Some(node_id) = self.node_id.load() else {
            return Err(msg);
        };
        let CanId::Std(id) = msg.id() else {
            return Err(msg);
        };
        match CobTable::new(node_id).lookup(id) {
            Some(kind) => {
                self.on_receive(kind, RxEvent::Frame(msg.data()));
                Ok(())
            }
            None => Err(msg),
        }
    }

    fn handle_error(&self, error: BusError) {
        if !self.bus_fault.swap(true) {
            warn!("CAN bus error: {}", error as u8);
            self.diagnostics.raise_warning(Warning::BusError);
        }
    }

    fn handle_frame(&self, node_id: NodeId, kind: CobKind, data: &[u8]) -> bool {
        if self.bus_fault.swap(false) {
            debug!("CAN bus recovered");
            self.diagnostics.clear_warning(Warning::BusError);
        }

        if let Some(slot) = kind.rpdo_slot() {
            self.arena.record_rpdo_arrival(slot, self.clock.now_ms());
            if self.arena.rpdo(slot).post(data).is_err() {
                warn!("RPDO{} overrun", slot + 1);
                self.diagnostics.push_message(Event::RpdoOverrun(slot));
                return false;
            }
            return true;
        }

        match kind {
            CobKind::Rsdo => {
                if self.arena.responder().is_none() {
                    debug!("Dropping SDO request, no object dictionary");
                    return false;
                }
                // One transaction at a time: the previous response must have been sent too
                if self.arena.sdo_response().is_pending()
                    || self.arena.sdo_request().post(data).is_err()
                {
                    warn!("SDO request overrun");
                    self.diagnostics.push_message(Event::SdoOverrun);
                    return false;
                }
                true
            }
            CobKind::Nmt => match NmtCommand::try_from(data) {
                Ok(cmd) if cmd.addresses(node_id.raw()) => {
                    self.nmt_mbox.store(Some(cmd));
                    true
                }
                Ok(_) => false,
                Err(_) => {
                    debug!("Invalid NMT command");
                    false
                }
            },
            _ => {
                trace!("Ignoring frame in slot {}", kind.slot());
                false
            }
        }
    }
}

impl ReceiveHandler for NodeMbox {
    fn on_receive(&self, kind: CobKind, event: RxEvent<'_>) {
        let Some(node_id) = self.node_id.load() else {
            return;
        };
        let process_required = match event {
            RxEvent::Error(error) => {
                self.handle_error(error);
                false
            }
            RxEvent::Frame(data) => self.handle_frame(node_id, kind, data),
        };
        if process_required {
            self.notify();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::mailbox::Side;
    use twincan_common::messages::NmtCommandCmd;
    use twincan_common::Role;

    struct FixedClock(AtomicCell<u64>);

    impl Clock for FixedClock {
        fn now_ms(&self) -> u64 {
            self.0.load()
        }
    }

    #[derive(Debug, PartialEq)]
    enum Record {
        Raised(Warning),
        Cleared(Warning),
        Event(Event),
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Record>>);

    impl Diagnostics for Recorder {
        fn raise_warning(&self, warning: Warning) {
            self.0.lock().unwrap().push(Record::Raised(warning));
        }
        fn clear_warning(&self, warning: Warning) {
            self.0.lock().unwrap().push(Record::Cleared(warning));
        }
        fn push_message(&self, event: Event) {
            self.0.lock().unwrap().push(Record::Event(event));
        }
    }

    fn setup() -> (&'static NodeMbox, &'static FixedClock, &'static Recorder) {
        let arena: &'static SharedArena = Box::leak(Box::new(SharedArena::new()));
        let clock: &'static FixedClock = Box::leak(Box::new(FixedClock(AtomicCell::new(0))));
        let diag: &'static Recorder = Box::leak(Box::new(Recorder::default()));
        let mbox: &'static NodeMbox = Box::leak(Box::new(NodeMbox::new(arena, clock, diag)));
        mbox.attach(NodeId::new(3).unwrap());
        (mbox, clock, diag)
    }

    #[test]
    fn test_unattached_mailbox_ignores_frames() {
        let arena: &'static SharedArena = Box::leak(Box::new(SharedArena::new()));
        let clock: &'static FixedClock = Box::leak(Box::new(FixedClock(AtomicCell::new(0))));
        let diag: &'static Recorder = Box::leak(Box::new(Recorder::default()));
        let mbox = NodeMbox::new(arena, clock, diag);
        mbox.on_receive(CobKind::Rpdo1, RxEvent::Frame(&[1]));
        assert!(!mbox.arena().rpdo_pending(0));
        let msg = CanMessage::new(CanId::std(0x203), &[1]);
        assert_eq!(Err(msg), mbox.store_message(msg));
    }

    #[test]
    fn test_rpdo_overrun_keeps_first_frame() {
        let (mbox, clock, diag) = setup();
        clock.0.store(10);
        mbox.on_receive(CobKind::Rpdo2, RxEvent::Frame(&[1, 1]));
        clock.0.store(20);
        mbox.on_receive(CobKind::Rpdo2, RxEvent::Frame(&[2, 2]));

        assert_eq!(Some(20), mbox.arena().rpdo_received_at(1));
        let payload = mbox.arena().rpdo(1).consume(Side::Local, |p| p.to_vec());
        assert_eq!(Some(vec![1, 1]), payload);
        assert_eq!(
            vec![Record::Event(Event::RpdoOverrun(1))],
            *diag.0.lock().unwrap()
        );
    }

    #[test]
    fn test_store_message_routes_by_id() {
        let (mbox, _, _) = setup();
        assert_eq!(Ok(()), mbox.store_message(CanMessage::new(CanId::std(0x403), &[7; 8])));
        assert!(mbox.arena().rpdo_pending(2));

        // Another node's RPDO and extended frames are not ours
        let other = CanMessage::new(CanId::std(0x404), &[7; 8]);
        assert_eq!(Err(other), mbox.store_message(other));
        let ext = CanMessage::new(CanId::extended(0x403), &[7; 8]);
        assert_eq!(Err(ext), mbox.store_message(ext));
    }

    #[test]
    fn test_sdo_request_without_responder_is_dropped() {
        let (mbox, _, diag) = setup();
        let req = [0x40, 0x00, 0x10, 0x00, 0, 0, 0, 0];
        for _ in 0..3 {
            mbox.on_receive(CobKind::Rsdo, RxEvent::Frame(&req));
        }
        assert!(!mbox.arena().sdo_request_pending());
        assert!(diag.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_sdo_request_while_response_pending_is_overrun() {
        let (mbox, _, diag) = setup();
        assert!(mbox.arena().claim_responder(Role::Primary));
        let req = [0x40, 0x00, 0x10, 0x00, 0, 0, 0, 0];
        mbox.arena().sdo_response().post(&[0x43; 8]).unwrap();
        mbox.on_receive(CobKind::Rsdo, RxEvent::Frame(&req));
        assert!(!mbox.arena().sdo_request_pending());
        assert_eq!(vec![Record::Event(Event::SdoOverrun)], *diag.0.lock().unwrap());

        mbox.arena().sdo_response().consume(Side::Local, |_| ());
        mbox.on_receive(CobKind::Rsdo, RxEvent::Frame(&req));
        assert!(mbox.arena().sdo_request_pending());
        mbox.on_receive(CobKind::Rsdo, RxEvent::Frame(&req));
        assert_eq!(2, diag.0.lock().unwrap().len());
    }

    #[test]
    fn test_bus_error_raised_once_and_cleared_by_frame() {
        let (mbox, _, diag) = setup();
        mbox.on_receive(CobKind::Dummy, RxEvent::Error(BusError::Crc));
        mbox.on_receive(CobKind::Dummy, RxEvent::Error(BusError::Stuff));
        assert!(mbox.bus_fault());
        mbox.on_receive(CobKind::Sync, RxEvent::Frame(&[]));
        assert!(!mbox.bus_fault());
        assert_eq!(
            vec![
                Record::Raised(Warning::BusError),
                Record::Cleared(Warning::BusError)
            ],
            *diag.0.lock().unwrap()
        );
    }

    #[test]
    fn test_nmt_commands_filtered_by_node() {
        let (mbox, _, _) = setup();
        mbox.on_receive(CobKind::Nmt, RxEvent::Frame(&[1, 4]));
        assert_eq!(None, mbox.take_nmt_command());
        mbox.on_receive(CobKind::Nmt, RxEvent::Frame(&[2, 3]));
        assert_eq!(
            Some(NmtCommand {
                cmd: NmtCommandCmd::Stop,
                node: 3
            }),
            mbox.take_nmt_command()
        );
        mbox.on_receive(CobKind::Nmt, RxEvent::Frame(&[1, 0]));
        assert_eq!(NmtCommandCmd::Start, mbox.take_nmt_command().unwrap().cmd);
    }
}
