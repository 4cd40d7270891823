//! The node composition root
//!
//! A [`Node`] ties together the NMT state machine, the heartbeat and TPDO schedules, the RPDO
//! handlers and the SDO responder, and drives them from [`Node::run`].
//!
//! On a single-core part there is one Primary node which owns the transport and does everything.
//! On a dual-core part, each core builds its own `Node` over the same [`SharedArena`]: the Primary
//! owns the transport, and the Secondary may own the object dictionary, in which case it answers
//! SDO requests staged by the Primary's receive interrupt and hands the responses back for
//! transmission.
use defmt_or_log::{debug, info, warn};
use snafu::Snafu;
use twincan_common::{
    cob::{CobTable, NUM_PDOS},
    diagnostics::{Diagnostics, Event, Warning},
    messages::{Emergency, Heartbeat, NmtCommandCmd, NmtState},
    traits::{Clock, Transport, TransportError},
    CobKind, Mode, NodeId, Role,
};

use crate::{
    mailbox::Side,
    nmt::{HeartbeatSchedule, NmtError, NmtStateMachine},
    node_mbox::NodeMbox,
    object_dict::{ODEntry, ObjectDict, OdError},
    pdo::{RpdoBinding, RpdoHandler, TpdoProducer, TpdoSchedule},
    sdo_server::SdoServer,
    shared_arena::SharedArena,
};

/// Error returned when a node cannot be built
///
/// These are configuration errors and are expected to halt startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Snafu)]
pub enum BuildError {
    /// Secondary nodes only exist in dual-core mode
    #[snafu(display("A secondary node requires dual-core mode"))]
    SecondaryRequiresDualCore,
    /// Only the Primary may own the transport
    #[snafu(display("A secondary node cannot own a transport"))]
    SecondaryWithTransport,
    /// The Primary must own the transport
    #[snafu(display("A primary node requires a transport"))]
    PrimaryWithoutTransport,
    /// The receive mailbox was created over a different arena than the node
    #[snafu(display("The node mailbox belongs to a different arena"))]
    MailboxArenaMismatch,
    /// The arena already has a Primary node
    #[snafu(display("A primary node has already been built on this bus"))]
    PrimaryAlreadyClaimed,
    /// The arena already has a node serving the object dictionary
    #[snafu(display("Another node already serves the object dictionary on this bus"))]
    ResponderAlreadyClaimed,
    /// The object dictionary failed validation
    #[snafu(display("Invalid object dictionary: {error}"))]
    ObjectDict {
        /// The validation failure
        error: OdError,
    },
    /// The transport refused a slot configuration
    #[snafu(display("Transport setup failed: {error}"))]
    Transport {
        /// The transport failure
        error: TransportError,
    },
}

/// Error returned by node operations which are not valid for its role or arguments
#[derive(Clone, Copy, Debug, PartialEq, Eq, Snafu)]
pub enum NodeError {
    /// PDOs and emergencies belong to the Primary
    #[snafu(display("Operation is only available on the primary node"))]
    NotPrimary,
    /// PDO slots are 0..4
    #[snafu(display("Invalid PDO slot {slot}"))]
    InvalidSlot {
        /// The requested slot
        slot: usize,
    },
    /// The transport refused the frame
    #[snafu(display("Transmit failed: {error}"))]
    TransmitFailed {
        /// The transport failure
        error: TransportError,
    },
}

/// The transport and receive mailbox of a Primary node
struct BusLink<'a> {
    transport: &'a mut dyn Transport,
    mbox: &'static NodeMbox,
}

impl BusLink<'_> {
    /// Send a frame, reporting failures to `diagnostics`
    fn transmit(&mut self, kind: CobKind, data: &[u8], diagnostics: &dyn Diagnostics) {
        if self.transport.send(kind, data).is_err() {
            warn!("Failed to transmit slot {}", kind.slot());
            diagnostics.push_message(Event::TransmitFailed(kind));
        }
    }
}

/// Collects the parameters of a [`Node`]
///
/// Created by [`Node::builder`].
#[allow(missing_debug_implementations)]
pub struct NodeBuilder<'a> {
    node_id: NodeId,
    role: Role,
    mode: Mode,
    arena: &'static SharedArena,
    clock: &'static dyn Clock,
    diagnostics: &'static dyn Diagnostics,
    link: Option<BusLink<'a>>,
    od: Option<&'a mut [ODEntry<'a>]>,
    heartbeat_period: u32,
}

impl<'a> NodeBuilder<'a> {
    /// Give the node the transport. Required on the Primary, refused on the Secondary.
    ///
    /// `mbox` is registered with the transport as its receive handler. It must have been created
    /// over the same arena as the node.
    pub fn transport(mut self, transport: &'a mut dyn Transport, mbox: &'static NodeMbox) -> Self {
        self.link = Some(BusLink { transport, mbox });
        self
    }

    /// Give the node the object dictionary, making it the SDO responder of the bus
    ///
    /// The entries are sorted in place and validated by [`build`](Self::build).
    pub fn object_dict(mut self, entries: &'a mut [ODEntry<'a>]) -> Self {
        self.od = Some(entries);
        self
    }

    /// Set the heartbeat period in ms. 0, the default, disables the heartbeat.
    pub fn heartbeat_period(mut self, period: u32) -> Self {
        self.heartbeat_period = period;
        self
    }

    /// Validate the configuration and construct the node
    ///
    /// On success, every transport slot has been configured, the receive handler registered, the
    /// node is PreOperational, and a Primary has sent its boot-up message. Transport interrupts
    /// stay disabled until [`Node::enable`].
    pub fn build(self) -> Result<Node<'a>, BuildError> {
        let NodeBuilder {
            node_id,
            role,
            mode,
            arena,
            clock,
            diagnostics,
            link,
            od,
            heartbeat_period,
        } = self;

        match (role, mode, link.is_some()) {
            (Role::Secondary, Mode::SingleCore, _) => return SecondaryRequiresDualCoreSnafu.fail(),
            (Role::Secondary, _, true) => return SecondaryWithTransportSnafu.fail(),
            (Role::Primary, _, false) => return PrimaryWithoutTransportSnafu.fail(),
            _ => (),
        }
        if let Some(link) = link.as_ref() {
            if !core::ptr::eq(link.mbox.arena(), arena) {
                return MailboxArenaMismatchSnafu.fail();
            }
        }

        let od = match od {
            Some(entries) => {
                Some(ObjectDict::new(entries).map_err(|error| BuildError::ObjectDict { error })?)
            }
            None => None,
        };

        if role == Role::Primary && !arena.claim_primary() {
            return PrimaryAlreadyClaimedSnafu.fail();
        }
        let release_claims = |responder: bool| {
            if role == Role::Primary {
                arena.release_primary();
            }
            if responder {
                arena.release_responder();
            }
        };
        if od.is_some() && !arena.claim_responder(role) {
            release_claims(false);
            return ResponderAlreadyClaimedSnafu.fail();
        }

        let cob_table = CobTable::new(node_id);
        let now = clock.now_ms();
        let mut link = link;

        if let Some(link) = link.as_mut() {
            for object in cob_table.iter() {
                if let Err(error) = link.transport.configure_slot(object) {
                    release_claims(od.is_some());
                    return Err(BuildError::Transport { error });
                }
            }
            link.mbox.attach(node_id);
            link.transport.register_receive_handler(link.mbox);
        }

        let mut nmt = NmtStateMachine::new();
        // Initializing -> PreOperational is always legal
        nmt.transition(NmtState::PreOperational).ok();

        let mut node = Node {
            node_id,
            role,
            mode,
            arena,
            clock,
            diagnostics,
            cob_table,
            link,
            nmt,
            heartbeat: HeartbeatSchedule::new(heartbeat_period, now),
            tpdos: core::array::from_fn(|slot| TpdoSchedule::new(CobKind::TPDOS[slot], now)),
            rpdos: core::array::from_fn(|_| RpdoBinding::new(now)),
            sdo_server: od.map(SdoServer::new),
        };

        node.send_bootup();
        info!(
            "Node {} built, primary: {}, dual core: {}, responder: {}",
            node_id.raw(),
            role == Role::Primary,
            mode == Mode::DualCore,
            node.sdo_server.is_some()
        );
        Ok(node)
    }
}

#[cfg(feature = "std")]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
impl NodeBuilder<'_> {
    /// Start a builder from a loaded [`NodeConfig`](twincan_common::device_config::NodeConfig)
    ///
    /// Applies the node ID, role, mode and heartbeat period. PDO timing is applied when the
    /// application registers its producers and handlers, using
    /// [`tpdo_period`](twincan_common::device_config::NodeConfig::tpdo_period) and
    /// [`rpdo_timeout`](twincan_common::device_config::NodeConfig::rpdo_timeout).
    pub fn from_config(
        config: &twincan_common::device_config::NodeConfig,
        arena: &'static SharedArena,
        clock: &'static dyn Clock,
        diagnostics: &'static dyn Diagnostics,
    ) -> Self {
        Node::builder(
            config.node_id,
            config.role,
            config.mode,
            arena,
            clock,
            diagnostics,
        )
        .heartbeat_period(config.heartbeat_period)
    }
}

/// A fieldbus node
#[allow(missing_debug_implementations)]
pub struct Node<'a> {
    node_id: NodeId,
    role: Role,
    mode: Mode,
    arena: &'static SharedArena,
    clock: &'static dyn Clock,
    diagnostics: &'static dyn Diagnostics,
    cob_table: CobTable,
    link: Option<BusLink<'a>>,
    nmt: NmtStateMachine,
    heartbeat: HeartbeatSchedule,
    tpdos: [TpdoSchedule<'a>; NUM_PDOS],
    rpdos: [RpdoBinding<'a>; NUM_PDOS],
    sdo_server: Option<SdoServer<'a>>,
}

impl<'a> Node<'a> {
    /// Start building a node
    ///
    /// # Args
    ///
    /// - `node_id`: The node's identity on the bus
    /// - `role`: Primary (owns the transport) or Secondary
    /// - `mode`: Single or dual core operation
    /// - `arena`: The arena shared by all nodes of this bus
    /// - `clock`: Millisecond time source
    /// - `diagnostics`: Sink for warnings and events
    pub fn builder(
        node_id: NodeId,
        role: Role,
        mode: Mode,
        arena: &'static SharedArena,
        clock: &'static dyn Clock,
        diagnostics: &'static dyn Diagnostics,
    ) -> NodeBuilder<'a> {
        NodeBuilder {
            node_id,
            role,
            mode,
            arena,
            clock,
            diagnostics,
            link: None,
            od: None,
            heartbeat_period: 0,
        }
    }

    /// The node ID
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// The role of the node
    pub fn role(&self) -> Role {
        self.role
    }

    /// The operating mode of the node
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The current NMT state
    pub fn nmt_state(&self) -> NmtState {
        self.nmt.state()
    }

    /// The communication objects of the node
    pub fn cob_table(&self) -> &CobTable {
        &self.cob_table
    }

    /// The arena the node was built over
    pub fn arena(&self) -> &'static SharedArena {
        self.arena
    }

    /// Returns true if this node answers SDO requests
    pub fn is_sdo_responder(&self) -> bool {
        self.sdo_server.is_some()
    }

    /// The heartbeat period in ms
    pub fn heartbeat_period(&self) -> u32 {
        self.heartbeat.period()
    }

    /// Change the heartbeat period. 0 disables the heartbeat.
    pub fn set_heartbeat_period(&mut self, period: u32) {
        self.heartbeat.set_period(period);
    }

    /// Register the producer of a transmit PDO
    ///
    /// While the node is Operational, `producer` is called every `period` ms, counted from now,
    /// and its payload sent on TPDO `slot + 1`. A period of 0 disables the slot.
    pub fn register_tpdo(
        &mut self,
        slot: usize,
        period: u32,
        producer: TpdoProducer<'a>,
    ) -> Result<(), NodeError> {
        if self.role != Role::Primary {
            return NotPrimarySnafu.fail();
        }
        let now = self.clock.now_ms();
        let tpdo = self
            .tpdos
            .get_mut(slot)
            .ok_or(NodeError::InvalidSlot { slot })?;
        tpdo.register(period, producer, now);
        Ok(())
    }

    /// Register the handler of a receive PDO
    ///
    /// `handler` is called from [`run`](Self::run) with each frame received on RPDO `slot + 1`.
    /// `timeout` is the staleness limit used by [`rpdo_is_stale`](Self::rpdo_is_stale); 0
    /// disables it.
    pub fn register_rpdo(
        &mut self,
        slot: usize,
        timeout: u32,
        handler: RpdoHandler<'a>,
    ) -> Result<(), NodeError> {
        if self.role != Role::Primary {
            return NotPrimarySnafu.fail();
        }
        let now = self.clock.now_ms();
        let rpdo = self
            .rpdos
            .get_mut(slot)
            .ok_or(NodeError::InvalidSlot { slot })?;
        rpdo.register(timeout, handler, now);
        Ok(())
    }

    /// Enter the Operational state and enable transport interrupts
    ///
    /// Legal from PreOperational and Stopped. Enabling an Operational node does nothing.
    pub fn enable(&mut self) -> Result<(), NmtError> {
        if self.nmt.transition(NmtState::Operational)? {
            info!("Node {} operational", self.node_id.raw());
        }
        if let Some(link) = self.link.as_mut() {
            link.transport.enable_interrupts();
        }
        Ok(())
    }

    /// Enter the Stopped state and disable transport interrupts
    ///
    /// Legal from Operational. Disabling a Stopped node does nothing.
    pub fn disable(&mut self) -> Result<(), NmtError> {
        if self.nmt.transition(NmtState::Stopped)? {
            info!("Node {} stopped", self.node_id.raw());
        }
        if let Some(link) = self.link.as_mut() {
            link.transport.disable_interrupts();
        }
        Ok(())
    }

    /// Run one pass of the node
    ///
    /// Must be called periodically from the main loop of each core. Never blocks. On the Primary,
    /// applies a pending NMT command, then sends a heartbeat and TPDOs if due, then dispatches
    /// received RPDOs. The node owning the object dictionary then answers a pending SDO request,
    /// and finally the Primary transmits a pending SDO response.
    pub fn run(&mut self) {
        let now = self.clock.now_ms();
        if self.role == Role::Primary {
            self.apply_nmt_command();
            self.heartbeat_step(now);
            self.tpdo_step(now);
            self.rpdo_step();
        }
        self.sdo_responder_step();
        if self.role == Role::Primary {
            self.sdo_transmit_step();
        }
    }

    /// Returns true if RPDO `slot` has a timeout and has not been received within it
    ///
    /// The node itself never acts on staleness.
    pub fn rpdo_is_stale(&self, slot: usize) -> bool {
        let now = self.clock.now_ms();
        self.rpdos
            .get(slot)
            .is_some_and(|rpdo| rpdo.is_stale(self.arena.rpdo_received_at(slot), now))
    }

    /// Forward RPDO staleness to the diagnostics sink
    ///
    /// Raises [`Warning::RpdoTimeout`] for each slot which has become stale since the last call,
    /// and clears it for each slot which has been received again.
    pub fn report_rpdo_timeouts(&mut self) {
        let now = self.clock.now_ms();
        for (slot, rpdo) in self.rpdos.iter_mut().enumerate() {
            let stale = rpdo.is_stale(self.arena.rpdo_received_at(slot), now);
            match rpdo.update_timed_out(stale) {
                Some(true) => {
                    warn!("RPDO{} timed out", slot + 1);
                    self.diagnostics.raise_warning(Warning::RpdoTimeout(slot));
                }
                Some(false) => self.diagnostics.clear_warning(Warning::RpdoTimeout(slot)),
                None => (),
            }
        }
    }

    /// Transmit an emergency message
    pub fn send_emergency(&mut self, emergency: Emergency) -> Result<(), NodeError> {
        let link = self.link.as_mut().ok_or(NodeError::NotPrimary)?;
        link.transport
            .send(CobKind::Emcy, &emergency.to_bytes())
            .map_err(|error| NodeError::TransmitFailed { error })
    }

    fn send_bootup(&mut self) {
        let bootup = Heartbeat {
            state: NmtState::Initializing,
        };
        if let Some(link) = self.link.as_mut() {
            link.transmit(CobKind::Heartbeat, &bootup.to_bytes(), self.diagnostics);
        }
    }

    fn apply_nmt_command(&mut self) {
        let Some(cmd) = self.link.as_ref().and_then(|link| link.mbox.take_nmt_command()) else {
            return;
        };
        let target = match cmd.cmd {
            NmtCommandCmd::Start => NmtState::Operational,
            NmtCommandCmd::Stop => NmtState::Stopped,
            other => {
                debug!("Ignoring NMT command {}", u8::from(other));
                return;
            }
        };
        match self.nmt.transition(target) {
            Ok(true) => info!(
                "Node {} NMT state {} by remote command",
                self.node_id.raw(),
                u8::from(target)
            ),
            Ok(false) => (),
            Err(_) => debug!("Ignoring illegal NMT command {}", u8::from(cmd.cmd)),
        }
    }

    fn heartbeat_step(&mut self, now: u64) {
        let state = self.nmt.state();
        if !matches!(state, NmtState::PreOperational | NmtState::Operational) {
            return;
        }
        let Some(link) = self.link.as_mut() else {
            return;
        };
        if self.heartbeat.poll(now) {
            let heartbeat = Heartbeat { state };
            link.transmit(CobKind::Heartbeat, &heartbeat.to_bytes(), self.diagnostics);
        }
    }

    fn tpdo_step(&mut self, now: u64) {
        if self.nmt.state() != NmtState::Operational {
            return;
        }
        let Some(link) = self.link.as_mut() else {
            return;
        };
        for tpdo in self.tpdos.iter_mut() {
            if let Some(payload) = tpdo.poll(now) {
                link.transmit(tpdo.kind(), &payload, self.diagnostics);
            }
        }
    }

    fn rpdo_step(&mut self) {
        // PDOs are only exchanged in Operational. Anything staged before is dropped unread.
        let operational = self.nmt.state() == NmtState::Operational;
        for (slot, rpdo) in self.rpdos.iter_mut().enumerate() {
            let delivered = self.arena.rpdo(slot).consume(Side::Local, |payload| {
                operational && rpdo.deliver(payload)
            });
            match delivered {
                Some(false) if !operational => {
                    debug!("Discarded RPDO{} outside Operational", slot + 1)
                }
                Some(false) => debug!("Discarded RPDO{} with no handler", slot + 1),
                _ => (),
            }
        }
    }

    fn sdo_responder_step(&mut self) {
        let Some(server) = self.sdo_server.as_ref() else {
            return;
        };
        // The request flag belongs to the Primary's receive interrupt
        let side = match self.role {
            Role::Primary => Side::Local,
            Role::Secondary => Side::Remote,
        };
        let arena = self.arena;
        let diagnostics = self.diagnostics;
        arena.sdo_request().consume(side, |frame| {
            if let Some(resp) = server.handle_frame(frame) {
                if arena.sdo_response().post(&resp.to_bytes()).is_err() {
                    warn!("SDO response overrun");
                    diagnostics.push_message(Event::SdoOverrun);
                }
            }
        });
    }

    fn sdo_transmit_step(&mut self) {
        // The response flag belongs to the core of the responder
        let side = match self.arena.responder() {
            Some(Role::Secondary) => Side::Remote,
            _ => Side::Local,
        };
        let diagnostics = self.diagnostics;
        let Some(link) = self.link.as_mut() else {
            return;
        };
        self.arena
            .sdo_response()
            .consume(side, |frame| link.transmit(CobKind::Tsdo, frame, diagnostics));
    }
}
