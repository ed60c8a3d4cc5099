//! Deferred-execution hand-off between interrupt context and the loop.
//!
//! Button click handlers run in true interrupt context and timer expiry
//! handlers run under the restricted context; neither may touch storage
//! or the display. Work that needs those rights is parked here as a
//! [`DeferredAction`] and executed by the main loop, exactly once.
//!
//! Each trigger source gets its own single slot. Registering a new
//! action overwrites the previous one — last write wins. This is
//! deliberate: the operator is a single human, and a second click
//! before the loop serviced the first means they changed their mind.

use log::debug;

/// Asynchronous trigger sources, one slot each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickSlot {
    Single,
    Double,
}

/// Work executed later under full main-loop rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    /// Consume the pending recoverable fill fault and allow one retry.
    Rearm,
    /// Request a controller restart (non-recoverable fault escape hatch).
    Restart,
}

/// The two single-slot queues.
#[derive(Debug, Default)]
pub struct Handoff {
    single: Option<DeferredAction>,
    double: Option<DeferredAction>,
}

impl Handoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `action` in the slot, overwriting whatever was pending.
    pub fn defer(&mut self, slot: ClickSlot, action: DeferredAction) {
        let cell = match slot {
            ClickSlot::Single => &mut self.single,
            ClickSlot::Double => &mut self.double,
        };
        if let Some(prev) = cell.replace(action) {
            debug!("handoff: {:?} slot overwrote pending {:?}", slot, prev);
        }
    }

    /// Drain the slot, resetting it to empty.
    pub fn take(&mut self, slot: ClickSlot) -> Option<DeferredAction> {
        match slot {
            ClickSlot::Single => self.single.take(),
            ClickSlot::Double => self.double.take(),
        }
    }

    pub fn is_pending(&self, slot: ClickSlot) -> bool {
        match slot {
            ClickSlot::Single => self.single.is_some(),
            ClickSlot::Double => self.double.is_some(),
        }
    }
}
