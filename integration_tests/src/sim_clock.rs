use twincan_common::{traits::Clock, AtomicCell};

/// A clock which only moves when the test moves it
#[derive(Debug, Default)]
pub struct SimClock {
    now: AtomicCell<u64>,
}

impl SimClock {
    pub const fn new() -> Self {
        Self {
            now: AtomicCell::new(0),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now);
    }

    pub fn advance(&self, ms: u64) {
        self.now.store(self.now.load() + ms);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now.load()
    }
}
