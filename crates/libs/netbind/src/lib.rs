//! # netbind
//!
//! Binds Ethernet ports into a lightweight IP stack: per-interface lifecycle,
//! link up/down tracking, address configuration, and automatic DHCP
//! acquisition with static-IP fallback.
//!
//! The stack itself and the physical port are collaborators behind the
//! [`stack::IpStack`] and [`port::EthernetPort`] traits; netbind owns the
//! concurrency-sensitive middle: a [`NetifHandle`] per interface with its
//! monitoring task, a [`link::LinkController`] that keeps the DHCP-armed flag
//! consistent with the stack's link state, and a [`NetifRegistry`] that pins
//! handle lifetimes by name.
//!
//! Three execution contexts meet here — port driver callbacks, the
//! per-interface monitoring task, and whatever thread calls the public
//! surface. `shutdown` is the single synchronization barrier: it waits for
//! the monitoring task to acknowledge exit before the stack record is
//! released, so no late callback or poll iteration can touch a freed record.

mod cache;
pub mod config;
pub mod error;
pub mod link;
pub mod monitor;
mod netif;
pub mod port;
pub mod registry;
pub mod stack;

pub use config::NetifConfig;
pub use error::NetifError;
pub use monitor::{DhcpRetryPolicy, MonitorConfig};
pub use netif::NetifHandle;
pub use port::{EthernetPort, FrameHandler, LinkEventHandler, PortError, SubscriptionId};
pub use registry::NetifRegistry;
pub use stack::{IpStack, NetifId, OutputHandler, RawNetifConfig, SharedStack, StackError};
