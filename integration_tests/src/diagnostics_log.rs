use std::sync::Mutex;

use twincan_common::diagnostics::{Diagnostics, Event, Warning};

/// One call made to a [`DiagnosticsLog`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagRecord {
    Raised(Warning),
    Cleared(Warning),
    Message(Event),
}

/// A diagnostics sink which records every call
#[derive(Debug, Default)]
pub struct DiagnosticsLog {
    records: Mutex<Vec<DiagRecord>>,
}

impl DiagnosticsLog {
    pub const fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, record: DiagRecord) {
        self.records.lock().unwrap().push(record);
    }

    /// All calls, in order
    pub fn records(&self) -> Vec<DiagRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Only the one-shot events, in order
    pub fn events(&self) -> Vec<Event> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                DiagRecord::Message(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Returns true if `warning` was raised and not cleared since
    pub fn is_active(&self, warning: Warning) -> bool {
        let mut active = false;
        for record in self.records() {
            match record {
                DiagRecord::Raised(w) if w == warning => active = true,
                DiagRecord::Cleared(w) if w == warning => active = false,
                _ => (),
            }
        }
        active
    }
}

impl Diagnostics for DiagnosticsLog {
    fn raise_warning(&self, warning: Warning) {
        self.push(DiagRecord::Raised(warning));
    }

    fn clear_warning(&self, warning: Warning) {
        self.push(DiagRecord::Cleared(warning));
    }

    fn push_message(&self, event: Event) {
        self.push(DiagRecord::Message(event));
    }
}
