//! Test support for exercising twincan nodes without hardware
pub mod diagnostics_log;
pub mod sim_bus;
pub mod sim_clock;

use twincan_node::{NodeMbox, SharedArena};

use diagnostics_log::DiagnosticsLog;
use sim_clock::SimClock;

/// Move a value to the heap and leak it, to stand in for a static
pub fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

/// The statics an application would declare for one bus
pub struct TestStatics {
    pub arena: &'static SharedArena,
    pub clock: &'static SimClock,
    pub diag: &'static DiagnosticsLog,
    pub mbox: &'static NodeMbox,
}

impl TestStatics {
    pub fn new() -> Self {
        let arena = leak(SharedArena::new());
        let clock = leak(SimClock::new());
        let diag = leak(DiagnosticsLog::new());
        let mbox = leak(NodeMbox::new(arena, clock, diag));
        Self {
            arena,
            clock,
            diag,
            mbox,
        }
    }
}

impl Default for TestStatics {
    fn default() -> Self {
        Self::new()
    }
}
