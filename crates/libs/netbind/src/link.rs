//! Link state for one bound interface.

use std::sync::{Mutex, PoisonError};

use crate::stack::{NetifId, SharedStack};

#[derive(Debug, Default, Clone, Copy)]
struct LinkFlags {
    link_up: bool,
    dhcp_enabled: bool,
    dhcp_started: bool,
}

/// The only path allowed to drive link state for one interface.
///
/// A link-down implicitly tears down the stack's DHCP client, so
/// `dhcp_started` is cleared inside the same critical section as every down
/// (and up) transition. Bypassing this type with direct stack calls would let
/// the armed flag drift from the stack's actual DHCP state.
pub struct LinkController {
    stack: SharedStack,
    id: NetifId,
    flags: Mutex<LinkFlags>,
}

impl LinkController {
    pub(crate) fn new(stack: SharedStack, id: NetifId) -> Self {
        Self { stack, id, flags: Mutex::new(LinkFlags::default()) }
    }

    pub fn id(&self) -> NetifId {
        self.id
    }

    fn lock_flags(&self) -> std::sync::MutexGuard<'_, LinkFlags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tells the stack the link is connected. Idempotent.
    pub fn set_link_up(&self) {
        let mut flags = self.lock_flags();
        flags.dhcp_started = false;
        flags.link_up = true;
        self.stack.set_up(self.id);
        self.stack.set_link_up(self.id);
    }

    /// Tells the stack the link is disconnected. Idempotent.
    pub fn set_link_down(&self) {
        let mut flags = self.lock_flags();
        flags.dhcp_started = false;
        flags.link_up = false;
        self.stack.set_link_down(self.id);
        self.stack.set_down(self.id);
    }

    /// The last state asserted through this controller, not a live hardware
    /// read.
    pub fn is_link_up(&self) -> bool {
        self.lock_flags().link_up
    }

    /// Asks the stack to begin DHCP negotiation. Idempotent; repeated calls
    /// issue exactly one underlying start request.
    pub fn start_dhcp(&self) {
        let mut flags = self.lock_flags();
        if flags.dhcp_started {
            return;
        }

        flags.dhcp_started = true;
        self.stack.dhcp_start(self.id);
    }

    /// Cancels DHCP negotiation. Idempotent.
    pub fn stop_dhcp(&self) {
        let mut flags = self.lock_flags();
        if !flags.dhcp_started {
            return;
        }

        flags.dhcp_started = false;
        self.stack.dhcp_stop(self.id);
    }

    pub fn dhcp_started(&self) -> bool {
        self.lock_flags().dhcp_started
    }

    pub fn dhcp_enabled(&self) -> bool {
        self.lock_flags().dhcp_enabled
    }

    pub(crate) fn set_dhcp_enabled(&self, enabled: bool) {
        self.lock_flags().dhcp_enabled = enabled;
    }
}
