//! Boundary to the physical Ethernet port an interface is bound to.
//!
//! The port raises its events from driver context; handlers must be cheap and
//! must not block. Subscriptions are token-based so a re-`open` can replace
//! them without leaking the old ones.

use std::io::IoSlice;
use std::sync::Arc;

use netbind_addr::MacAddr;

/// Error codes at the port boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("port is not open")]
    NotOpen,

    #[error("send failed")]
    Send,

    /// An inbound frame was not accepted by the receiver.
    #[error("inbound frame rejected")]
    Rejected,
}

/// Token returned by event subscription; pass back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handler for received Ethernet frames. The result is observable by the port
/// layer; it must never panic out of the dispatch path.
pub type FrameHandler = Arc<dyn Fn(&[u8]) -> Result<(), PortError> + Send + Sync>;

/// Handler for connection/disconnection events.
pub type LinkEventHandler = Arc<dyn Fn() + Send + Sync>;

pub trait EthernetPort: Send + Sync {
    /// Begins physical-layer activity using the given hardware address.
    fn open(&self, mac: MacAddr) -> Result<(), PortError>;

    /// Transmits one frame, possibly split across segments.
    fn send(&self, segments: &[IoSlice<'_>]) -> Result<(), PortError>;

    fn subscribe_frames(&self, handler: FrameHandler) -> SubscriptionId;
    fn subscribe_connection(&self, handler: LinkEventHandler) -> SubscriptionId;
    fn subscribe_disconnection(&self, handler: LinkEventHandler) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}
