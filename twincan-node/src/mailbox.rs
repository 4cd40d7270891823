//! Cross-core signalling
//!
//! A [`Mailbox`] is a single flag guarding one piece of data handed from a producer to a consumer.
//! The flag has an owning side (the core, or interrupt, that produces the data). The owner uses the
//! [`LocalView`] to set, check and reset it; the other core uses the [`RemoteView`] to check and
//! acknowledge it. On a single-core part both views resolve to the same flag and the consumer
//! simply uses the local view.
//!
//! [`MailboxSlot`] pairs a flag with a payload buffer. The buffer is not locked: the producer only
//! writes it while the flag is clear, and the consumer only reads it while the flag is set.
use core::cell::UnsafeCell;
use core::sync::atomic::{fence, Ordering};

use heapless::Vec;
use twincan_common::AtomicCell;

/// Which view of a mailbox flag a consumer uses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    /// The consumer runs on the core owning the flag
    Local,
    /// The consumer runs on the other core
    Remote,
}

/// A single cross-core signal flag
#[derive(Debug)]
pub struct Mailbox {
    flag: AtomicCell<bool>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    /// Create a cleared mailbox
    pub const fn new() -> Self {
        Self {
            flag: AtomicCell::new(false),
        }
    }

    /// The view used by the owning side
    pub fn local(&self) -> LocalView<'_> {
        LocalView(self)
    }

    /// The view used by the other core
    pub fn remote(&self) -> RemoteView<'_> {
        RemoteView(self)
    }

    /// Check the flag through the given view
    pub fn check(&self, side: Side) -> bool {
        match side {
            Side::Local => self.local().check(),
            Side::Remote => self.remote().check(),
        }
    }

    /// Clear the flag through the given view
    pub fn clear(&self, side: Side) {
        match side {
            Side::Local => self.local().reset(),
            Side::Remote => self.remote().acknowledge(),
        }
    }
}

/// Owner side access to a [`Mailbox`]
#[derive(Debug, Clone, Copy)]
pub struct LocalView<'a>(&'a Mailbox);

impl LocalView<'_> {
    /// Raise the flag
    ///
    /// Returns false if it was already raised.
    pub fn set(&self) -> bool {
        self.0.flag.fetch_update(|set| (!set).then_some(true)).is_ok()
    }

    /// Returns true if the flag is raised
    pub fn check(&self) -> bool {
        self.0.flag.load()
    }

    /// Lower the flag
    pub fn reset(&self) {
        self.0.flag.store(false);
    }
}

/// Access to a [`Mailbox`] from the core which does not own it
#[derive(Debug, Clone, Copy)]
pub struct RemoteView<'a>(&'a Mailbox);

impl RemoteView<'_> {
    /// Returns true if the owner has raised the flag
    pub fn check(&self) -> bool {
        self.0.flag.load()
    }

    /// Tell the owner the data has been consumed
    pub fn acknowledge(&self) {
        self.0.flag.store(false);
    }
}

/// Returned when posting to a [`MailboxSlot`] whose previous payload has not been consumed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Overrun;

/// A payload buffer guarded by a [`Mailbox`]
///
/// Each slot must have exactly one producer, which calls [`post`](Self::post), and one consumer,
/// which calls [`consume`](Self::consume).
#[allow(missing_debug_implementations)]
pub struct MailboxSlot<const N: usize> {
    mailbox: Mailbox,
    buffer: UnsafeCell<Vec<u8, N>>,
}

// Safety: buffer access is serialized by the mailbox flag
unsafe impl<const N: usize> Sync for MailboxSlot<N> {}

impl<const N: usize> Default for MailboxSlot<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MailboxSlot<N> {
    /// Create an empty slot
    pub const fn new() -> Self {
        Self {
            mailbox: Mailbox::new(),
            buffer: UnsafeCell::new(Vec::new()),
        }
    }

    /// Returns true if a payload is waiting to be consumed
    pub fn is_pending(&self) -> bool {
        self.mailbox.local().check()
    }

    /// Copy `data` into the slot and raise the flag
    ///
    /// Bytes beyond the slot capacity are dropped. If the previous payload has not been consumed,
    /// it is kept and `data` is discarded.
    pub fn post(&self, data: &[u8]) -> Result<(), Overrun> {
        if self.mailbox.local().check() {
            return Err(Overrun);
        }
        // Safety: the flag is clear, so the consumer is not reading the buffer, and there is only
        // one producer
        let buffer = unsafe { &mut *self.buffer.get() };
        buffer.clear();
        // Cannot fail after truncation to capacity
        buffer.extend_from_slice(&data[..data.len().min(N)]).ok();
        fence(Ordering::Release);
        self.mailbox.local().set();
        Ok(())
    }

    /// If a payload is pending, pass it to `f` and then clear the flag through `side`
    ///
    /// Returns `None` without calling `f` when nothing is pending.
    pub fn consume<R>(&self, side: Side, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
        if !self.mailbox.check(side) {
            return None;
        }
        fence(Ordering::Acquire);
        // Safety: the flag is set, so the producer will not touch the buffer until it is cleared
        let result = f(unsafe { &*self.buffer.get() });
        fence(Ordering::Release);
        self.mailbox.clear(side);
        Some(result)
    }
}
