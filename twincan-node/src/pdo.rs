//! Process Data Object scheduling
//!
//! The four transmit PDOs are periodic: each slot has a period and a producer callback which
//! builds the payload when the slot is due. The four receive PDOs are event driven: the receive
//! interrupt stages each frame in the [`SharedArena`](crate::SharedArena), and the node later
//! passes it to the handler registered for the slot.
use twincan_common::CobKind;

/// Payload of a transmit PDO
pub type PdoPayload = [u8; 8];

/// Builds the payload of a transmit PDO. Must not block.
pub type TpdoProducer<'a> = &'a mut dyn FnMut() -> PdoPayload;

/// Consumes the payload of a receive PDO. Must not block or re-enter the transport.
pub type RpdoHandler<'a> = &'a mut dyn FnMut(&[u8]);

/// Transmit timing of one TPDO slot
pub(crate) struct TpdoSchedule<'a> {
    kind: CobKind,
    period: u32,
    last_sent_at: u64,
    producer: Option<TpdoProducer<'a>>,
}

impl<'a> TpdoSchedule<'a> {
    pub fn new(kind: CobKind, now: u64) -> Self {
        Self {
            kind,
            period: 0,
            last_sent_at: now,
            producer: None,
        }
    }

    pub fn kind(&self) -> CobKind {
        self.kind
    }

    pub fn register(&mut self, period: u32, producer: TpdoProducer<'a>, now: u64) {
        self.period = period;
        self.producer = Some(producer);
        self.last_sent_at = now;
    }

    /// If the slot is due at `now`, produce its payload and restart the period
    pub fn poll(&mut self, now: u64) -> Option<PdoPayload> {
        if self.period == 0 {
            return None;
        }
        let producer = self.producer.as_mut()?;
        if now.saturating_sub(self.last_sent_at) < self.period as u64 {
            return None;
        }
        self.last_sent_at = now;
        Some(producer())
    }
}

/// Application side of one RPDO slot
pub(crate) struct RpdoBinding<'a> {
    timeout: u32,
    registered_at: u64,
    timed_out: bool,
    handler: Option<RpdoHandler<'a>>,
}

impl<'a> RpdoBinding<'a> {
    pub fn new(now: u64) -> Self {
        Self {
            timeout: 0,
            registered_at: now,
            timed_out: false,
            handler: None,
        }
    }

    pub fn register(&mut self, timeout: u32, handler: RpdoHandler<'a>, now: u64) {
        self.timeout = timeout;
        self.registered_at = now;
        self.timed_out = false;
        self.handler = Some(handler);
    }

    /// Pass a payload to the handler. Returns false if no handler is registered.
    pub fn deliver(&mut self, payload: &[u8]) -> bool {
        match self.handler.as_mut() {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }

    /// Returns true if the slot has a timeout and nothing arrived within it
    ///
    /// `received_at` is the last arrival time recorded by the receive interrupt. Until the first
    /// arrival after registration, the registration time is used instead.
    pub fn is_stale(&self, received_at: Option<u64>, now: u64) -> bool {
        if self.timeout == 0 || self.handler.is_none() {
            return false;
        }
        let last = received_at.map_or(self.registered_at, |t| t.max(self.registered_at));
        now.saturating_sub(last) > self.timeout as u64
    }

    /// Latch the timeout state. Returns the new state if it changed.
    pub fn update_timed_out(&mut self, stale: bool) -> Option<bool> {
        if stale == self.timed_out {
            None
        } else {
            self.timed_out = stale;
            Some(stale)
        }
    }
}
