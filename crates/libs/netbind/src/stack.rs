//! Boundary to the IP stack netbind binds interfaces into.
//!
//! The stack side identifies interfaces by an opaque [`NetifId`] handed out at
//! registration; callbacks and every later operation go through that id, never
//! through raw pointers recovered from foreign memory. Outbound traffic flows
//! through an [`OutputHandler`] registered alongside the interface record.

use std::fmt;
use std::sync::{Arc, OnceLock};

use netbind_addr::{RawIpv4, RawMac};

/// Opaque id for one interface record inside the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetifId(u64);

impl NetifId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NetifId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "netif#{}", self.0)
    }
}

/// Error codes at the stack boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StackError {
    /// The interface layer rejected the operation.
    #[error("interface error")]
    Interface,

    #[error("out of memory")]
    Memory,
}

/// Registration-time description of one interface record.
#[derive(Debug, Clone)]
pub struct RawNetifConfig {
    pub hostname: String,
    pub hwaddr: RawMac,
    pub mtu: u32,
    pub ip: RawIpv4,
    pub netmask: RawIpv4,
    pub gateway: RawIpv4,
}

/// Handler the stack invokes to transmit one outbound frame. The frame may be
/// split across several read-only segments.
pub type OutputHandler = Arc<dyn Fn(&[&[u8]]) -> Result<(), StackError> + Send + Sync>;

/// Operations netbind consumes from the IP stack.
///
/// Implementations must be callable from any thread; netbind invokes them from
/// port event callbacks, the monitoring task, and public accessors.
pub trait IpStack: Send + Sync {
    /// One-time global initialization. Invoked at most once per stack, through
    /// [`SharedStack::ensure_initialized`].
    fn init(&self);

    fn add_interface(
        &self,
        config: RawNetifConfig,
        output: OutputHandler,
    ) -> Result<NetifId, StackError>;

    fn remove_interface(&self, id: NetifId);

    /// Current (ip, netmask, gateway) triple of the record.
    fn addresses(&self, id: NetifId) -> (RawIpv4, RawIpv4, RawIpv4);

    /// Reconfigures ip, netmask, and gateway in one call.
    fn set_addresses(&self, id: NetifId, ip: RawIpv4, netmask: RawIpv4, gateway: RawIpv4);

    fn hwaddr(&self, id: NetifId) -> RawMac;
    fn set_hwaddr(&self, id: NetifId, hwaddr: RawMac);

    fn set_up(&self, id: NetifId);
    fn set_down(&self, id: NetifId);
    fn set_link_up(&self, id: NetifId);
    fn set_link_down(&self, id: NetifId);

    fn default_interface(&self) -> Option<NetifId>;
    fn set_default(&self, id: NetifId);

    fn dhcp_start(&self, id: NetifId);
    fn dhcp_stop(&self, id: NetifId);
    /// Whether the current DHCP negotiation has supplied an address.
    fn dhcp_supplied(&self, id: NetifId) -> bool;

    /// Injects one inbound frame into the stack's input path. On error the
    /// frame buffer is dropped by the caller.
    fn input(&self, id: NetifId, frame: Vec<u8>) -> Result<(), StackError>;
}

/// Shared handle to one stack plus its init-once guard.
///
/// Every interface bound into the same stack clones the same `SharedStack`, so
/// the guard covers concurrent first `open` calls.
#[derive(Clone)]
pub struct SharedStack {
    inner: Arc<dyn IpStack>,
    init: Arc<OnceLock<()>>,
}

impl SharedStack {
    pub fn new(stack: Arc<dyn IpStack>) -> Self {
        Self { inner: stack, init: Arc::new(OnceLock::new()) }
    }

    /// Runs the stack's global init exactly once, even when several interfaces
    /// open concurrently.
    pub fn ensure_initialized(&self) {
        self.init.get_or_init(|| self.inner.init());
    }
}

impl std::ops::Deref for SharedStack {
    type Target = dyn IpStack;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}
