//! A simulated CAN bus
//!
//! The [`SimBus`] plays the part of both the CAN controller and the rest of the network. The node
//! owns a [`SimTransport`] handle to it, while the test keeps the `SimBus` to inject frames and
//! bus errors into the node's receive handler, and uses [`SimBusReceiver`]s to observe what the
//! node transmits.
use std::{cell::RefCell, rc::Rc};

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use twincan_common::{
    cob::NUM_COB_KINDS,
    messages::{CanId, CanMessage},
    traits::{BusError, ReceiveHandler, RxEvent, Transport, TransportError},
    CobKind, CommunicationObject, Direction,
};

#[derive(Default)]
struct BusState {
    slots: [Option<CommunicationObject>; NUM_COB_KINDS],
    handler: Option<&'static dyn ReceiveHandler>,
    interrupts_enabled: bool,
    listeners: Vec<UnboundedSender<CanMessage>>,
    send_failure: Option<TransportError>,
    configure_failure: Option<u8>,
}

/// The test side of a simulated bus
#[derive(Clone, Default)]
pub struct SimBus {
    state: Rc<RefCell<BusState>>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the transport handle to give to a node
    pub fn transport(&self) -> SimTransport {
        SimTransport {
            state: self.state.clone(),
        }
    }

    /// Create a receiver which sees every frame transmitted from now on
    pub fn new_receiver(&self) -> SimBusReceiver {
        let (tx, rx) = unbounded();
        self.state.borrow_mut().listeners.push(tx);
        SimBusReceiver { rx }
    }

    /// Put a frame on the bus as if sent by another node
    ///
    /// Returns true if it matched a configured receive slot and interrupts were enabled.
    pub fn deliver(&self, id: u16, data: &[u8]) -> bool {
        let target = {
            let state = self.state.borrow();
            let kind = state
                .slots
                .iter()
                .flatten()
                .find(|obj| obj.direction == Direction::Rx && obj.bus_id == id)
                .map(|obj| obj.kind);
            match (kind, state.handler, state.interrupts_enabled) {
                (Some(kind), Some(handler), true) => Some((kind, handler)),
                _ => None,
            }
        };
        match target {
            Some((kind, handler)) => {
                handler.on_receive(kind, RxEvent::Frame(data));
                true
            }
            None => false,
        }
    }

    /// Report a controller error to the node
    pub fn deliver_error(&self, error: BusError) -> bool {
        let handler = {
            let state = self.state.borrow();
            state.handler.filter(|_| state.interrupts_enabled)
        };
        match handler {
            Some(handler) => {
                handler.on_receive(CobKind::Dummy, RxEvent::Error(error));
                true
            }
            None => false,
        }
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.state.borrow().interrupts_enabled
    }

    pub fn handler_registered(&self) -> bool {
        self.state.borrow().handler.is_some()
    }

    /// The slots configured by the node, in slot order
    pub fn configured_slots(&self) -> Vec<CommunicationObject> {
        self.state.borrow().slots.iter().flatten().copied().collect()
    }

    /// Make every send fail with `error` until reset with `None`
    pub fn set_send_failure(&self, error: Option<TransportError>) {
        self.state.borrow_mut().send_failure = error;
    }

    /// Make configuration of `slot` fail
    pub fn set_configure_failure(&self, slot: Option<u8>) {
        self.state.borrow_mut().configure_failure = slot;
    }
}

/// The node side of a simulated bus
pub struct SimTransport {
    state: Rc<RefCell<BusState>>,
}

impl Transport for SimTransport {
    fn configure_slot(&mut self, object: &CommunicationObject) -> Result<(), TransportError> {
        let slot = object.kind.slot();
        let mut state = self.state.borrow_mut();
        if state.configure_failure == Some(slot) {
            return Err(TransportError::SlotConfig { slot });
        }
        state.slots[slot as usize] = Some(*object);
        Ok(())
    }

    fn send(&mut self, kind: CobKind, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if let Some(error) = state.send_failure {
            return Err(error);
        }
        let slot = kind.slot();
        let object = match state.slots[slot as usize] {
            Some(obj) if obj.direction == Direction::Tx && obj.payload_len > 0 => obj,
            _ => return Err(TransportError::NotTransmit { slot }),
        };
        let msg = CanMessage::new(CanId::std(object.bus_id), data);
        // Drop listeners whose receiver is gone
        state
            .listeners
            .retain(|listener| listener.unbounded_send(msg).is_ok());
        Ok(())
    }

    fn register_receive_handler(&mut self, handler: &'static dyn ReceiveHandler) {
        self.state.borrow_mut().handler = Some(handler);
    }

    fn enable_interrupts(&mut self) {
        self.state.borrow_mut().interrupts_enabled = true;
    }

    fn disable_interrupts(&mut self) {
        self.state.borrow_mut().interrupts_enabled = false;
    }
}

/// Observes frames transmitted on a [`SimBus`]
pub struct SimBusReceiver {
    rx: UnboundedReceiver<CanMessage>,
}

impl SimBusReceiver {
    /// Get the next transmitted frame, if there is one
    pub fn try_recv(&mut self) -> Option<CanMessage> {
        match self.rx.try_next() {
            Ok(Some(msg)) => Some(msg),
            _ => None,
        }
    }

    /// Get every frame transmitted since the last call
    pub fn drain(&mut self) -> Vec<CanMessage> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Get the frames transmitted since the last call which carry bus identifier `id`
    pub fn drain_id(&mut self, id: u16) -> Vec<CanMessage> {
        self.drain()
            .into_iter()
            .filter(|msg| msg.id() == CanId::std(id))
            .collect()
    }
}
