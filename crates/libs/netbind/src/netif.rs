//! One Ethernet port bound into the IP stack as a live interface.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use netbind_addr::{MacAddr, RawIpv4, RawMac};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::cache::AddressCache;
use crate::error::NetifError;
use crate::link::LinkController;
use crate::monitor::{self, MonitorConfig};
use crate::port::{EthernetPort, PortError, SubscriptionId};
use crate::stack::{OutputHandler, RawNetifConfig, SharedStack, StackError};

/// State shared between the handle, the monitoring task, and the port event
/// callbacks. The task and the callbacks hold this `Arc` (or a `Weak` to it),
/// never the handle itself, so teardown cannot be kept alive by its own task.
pub(crate) struct NetifShared {
    pub(crate) name: String,
    pub(crate) stack: SharedStack,
    cache: Mutex<AddressCache>,
    pub(crate) link: OnceLock<LinkController>,
    port: Mutex<Option<Arc<dyn EthernetPort>>>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    disposed: AtomicBool,
    pub(crate) cancel: CancellationToken,
    monitor_started: AtomicBool,
    pub(crate) monitor_exited: Notify,
    torn_down: CancellationToken,
}

impl NetifShared {
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst) || self.cancel.is_cancelled()
    }

    pub(crate) fn lock_cache(&self) -> MutexGuard<'_, AddressCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_port(&self) -> MutexGuard<'_, Option<Arc<dyn EthernetPort>>> {
        self.port.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscriptions(&self) -> MutexGuard<'_, Vec<SubscriptionId>> {
        self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inbound path: wraps one received frame and feeds the stack. A stack
    /// refusal drops the wrapped buffer and surfaces as a port-level code.
    fn input(&self, frame: &[u8]) -> Result<(), PortError> {
        let Some(link) = self.link.get() else {
            return Err(PortError::Rejected);
        };

        if let Err(err) = self.stack.input(link.id(), frame.to_vec()) {
            log::warn!("netif({}): stack rejected inbound frame: {}", self.name, err);
            return Err(PortError::Rejected);
        }

        Ok(())
    }
}

/// One network interface bound into the IP stack.
///
/// Created with [`NetifHandle::new`], made live by [`open`](Self::open), torn
/// down by [`shutdown`](Self::shutdown). The handle exclusively owns its stack
/// registration; the port's lifetime is managed externally and must exceed the
/// handle's.
///
/// Dropping the handle cancels the monitoring task as a backstop but does not
/// remove the stack record; call `shutdown` for an orderly teardown.
pub struct NetifHandle {
    shared: Arc<NetifShared>,
    config: MonitorConfig,
}

impl NetifHandle {
    pub fn new(name: impl Into<String>, stack: SharedStack) -> Self {
        Self::with_config(name, stack, MonitorConfig::default())
    }

    pub fn with_config(name: impl Into<String>, stack: SharedStack, config: MonitorConfig) -> Self {
        let shared = NetifShared {
            name: name.into(),
            stack,
            cache: Mutex::new(AddressCache::default()),
            link: OnceLock::new(),
            port: Mutex::new(None),
            subscriptions: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            monitor_started: AtomicBool::new(false),
            monitor_exited: Notify::new(),
            torn_down: CancellationToken::new(),
        };

        Self { shared: Arc::new(shared), config }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    /// The stack's record id for this interface, once registered.
    pub fn stack_id(&self) -> Option<crate::stack::NetifId> {
        self.shared.link.get().map(LinkController::id)
    }

    fn link(&self) -> Result<&LinkController, NetifError> {
        if self.is_shutdown() {
            return Err(NetifError::Disposed);
        }

        self.shared.link.get().ok_or(NetifError::NotOpen)
    }

    /// Opens the port and registers this interface with the stack. After a
    /// successful return the interface is live: the monitoring task runs,
    /// port events drive link state, and packets flow both ways.
    ///
    /// Calling `open` again reconfigures the existing registration: addresses
    /// and hardware address are re-asserted and the event subscriptions are
    /// replaced, never duplicated.
    ///
    /// Must be called from within a tokio runtime; the monitoring task is
    /// spawned onto it.
    pub fn open(
        &self,
        port: Arc<dyn EthernetPort>,
        mac: MacAddr,
        ip: Ipv4Addr,
        netmask: Ipv4Addr,
        gateway: Ipv4Addr,
        mtu: u32,
    ) -> Result<(), NetifError> {
        if self.is_shutdown() {
            return Err(NetifError::Disposed);
        }

        if self.shared.name.is_empty() {
            return Err(NetifError::invalid_argument("interface name must not be empty"));
        }

        if mtu == 0 {
            return Err(NetifError::invalid_argument("mtu must not be zero"));
        }

        {
            let mut cache = self.shared.lock_cache();
            cache.mac = mac;
            cache.ip = ip;
            cache.netmask = netmask;
            cache.gateway = gateway;
            cache.mtu = mtu;
        }

        port.open(mac).map_err(|err| NetifError::io(format!("port open failed: {err}")))?;

        self.shared.stack.ensure_initialized();

        let id = match self.shared.link.get() {
            Some(link) => {
                let id = link.id();
                self.shared.stack.set_hwaddr(id, RawMac::from_host(mac));
                self.shared.stack.set_addresses(
                    id,
                    RawIpv4::from_host(ip),
                    RawIpv4::from_host(netmask),
                    RawIpv4::from_host(gateway),
                );
                id
            }
            None => {
                let config = RawNetifConfig {
                    hostname: self.shared.name.clone(),
                    hwaddr: RawMac::from_host(mac),
                    mtu,
                    ip: RawIpv4::from_host(ip),
                    netmask: RawIpv4::from_host(netmask),
                    gateway: RawIpv4::from_host(gateway),
                };

                let id = self
                    .shared
                    .stack
                    .add_interface(config, output_handler(&self.shared))
                    .map_err(|err| NetifError::Registration { reason: err.to_string() })?;

                let link = LinkController::new(self.shared.stack.clone(), id);
                let _ = self.shared.link.set(link);

                log::debug!("netif({}): registered with stack as {}", self.shared.name, id);
                id
            }
        };

        if self.shared.stack.default_interface().is_none() {
            self.shared.stack.set_default(id);
        }

        if !self.shared.monitor_started.swap(true, Ordering::SeqCst) {
            monitor::spawn(Arc::clone(&self.shared), self.config);
        }

        self.resubscribe(port);

        Ok(())
    }

    /// Replaces any prior event subscriptions with fresh ones on `port`.
    fn resubscribe(&self, port: Arc<dyn EthernetPort>) {
        let old_port = self.shared.lock_port().replace(Arc::clone(&port));

        let mut subs = self.shared.lock_subscriptions();
        if let Some(old) = old_port {
            for sub in subs.drain(..) {
                old.unsubscribe(sub);
            }
        }

        let weak = Arc::downgrade(&self.shared);
        subs.push(port.subscribe_frames(Arc::new(move |frame: &[u8]| {
            let Some(shared) = weak.upgrade() else {
                return Err(PortError::Rejected);
            };
            shared.input(frame)
        })));

        let weak = Arc::downgrade(&self.shared);
        subs.push(port.subscribe_connection(Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                log::info!("netif({}): link connected", shared.name);
                if let Some(link) = shared.link.get() {
                    link.set_link_up();
                }
            }
        })));

        let weak = Arc::downgrade(&self.shared);
        subs.push(port.subscribe_disconnection(Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                log::info!("netif({}): link disconnected", shared.name);
                if let Some(link) = shared.link.get() {
                    link.set_link_down();
                }
            }
        })));
    }

    /// Tears the interface down. Idempotent and safe to call concurrently
    /// from any task; every caller returns only after the interface record
    /// has been removed from the stack.
    ///
    /// Ordering: the disposed flag is set first, then every port subscription
    /// is dropped, then the monitoring task's exit acknowledgement is awaited,
    /// and only then is the stack record released. No callback or poll
    /// iteration can touch the record afterwards.
    pub async fn shutdown(&self) {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            // Another caller is (or was) tearing down; wait for it to finish.
            self.shared.torn_down.cancelled().await;
            return;
        }

        self.shared.cancel.cancel();

        let port = self.shared.lock_port().take();
        if let Some(port) = port {
            for sub in self.shared.lock_subscriptions().drain(..) {
                port.unsubscribe(sub);
            }
        }

        if self.shared.monitor_started.load(Ordering::SeqCst) {
            self.shared.monitor_exited.notified().await;
        }

        if let Some(link) = self.shared.link.get() {
            self.shared.stack.remove_interface(link.id());
        }

        log::info!("netif({}): shut down", self.shared.name);
        self.shared.torn_down.cancel();
    }

    pub fn mac(&self) -> Result<MacAddr, NetifError> {
        let link = self.link()?;
        Ok(self.shared.stack.hwaddr(link.id()).to_host())
    }

    pub fn set_mac(&self, value: MacAddr) -> Result<(), NetifError> {
        let link = self.link()?;
        self.shared.stack.set_hwaddr(link.id(), RawMac::from_host(value));
        self.shared.lock_cache().mac = value;
        Ok(())
    }

    pub fn ip_address(&self) -> Result<Ipv4Addr, NetifError> {
        let link = self.link()?;
        let (ip, _, _) = self.shared.stack.addresses(link.id());
        Ok(ip.to_host())
    }

    pub fn set_ip_address(&self, value: Ipv4Addr) -> Result<(), NetifError> {
        let link = self.link()?;
        let id = link.id();
        let (_, netmask, gateway) = self.shared.stack.addresses(id);
        self.shared.stack.set_addresses(id, RawIpv4::from_host(value), netmask, gateway);
        self.shared.lock_cache().ip = value;
        Ok(())
    }

    pub fn netmask(&self) -> Result<Ipv4Addr, NetifError> {
        let link = self.link()?;
        let (_, netmask, _) = self.shared.stack.addresses(link.id());
        Ok(netmask.to_host())
    }

    pub fn set_netmask(&self, value: Ipv4Addr) -> Result<(), NetifError> {
        let link = self.link()?;
        let id = link.id();
        let (ip, _, gateway) = self.shared.stack.addresses(id);
        self.shared.stack.set_addresses(id, ip, RawIpv4::from_host(value), gateway);
        self.shared.lock_cache().netmask = value;
        Ok(())
    }

    pub fn gateway(&self) -> Result<Ipv4Addr, NetifError> {
        let link = self.link()?;
        let (_, _, gateway) = self.shared.stack.addresses(link.id());
        Ok(gateway.to_host())
    }

    pub fn set_gateway(&self, value: Ipv4Addr) -> Result<(), NetifError> {
        let link = self.link()?;
        let id = link.id();
        let (ip, netmask, _) = self.shared.stack.addresses(id);
        self.shared.stack.set_addresses(id, ip, netmask, RawIpv4::from_host(value));
        self.shared.lock_cache().gateway = value;
        Ok(())
    }

    /// Updates ip, netmask, and gateway at the cost of a single stack
    /// reconfiguration instead of three.
    pub fn set_all_addresses(
        &self,
        ip: Ipv4Addr,
        netmask: Ipv4Addr,
        gateway: Ipv4Addr,
    ) -> Result<(), NetifError> {
        let link = self.link()?;
        self.shared.stack.set_addresses(
            link.id(),
            RawIpv4::from_host(ip),
            RawIpv4::from_host(netmask),
            RawIpv4::from_host(gateway),
        );

        let mut cache = self.shared.lock_cache();
        cache.ip = ip;
        cache.netmask = netmask;
        cache.gateway = gateway;
        Ok(())
    }

    /// Sets ip, netmask, and gateway to the stack's "unspecified" value. The
    /// cached static configuration is left intact.
    pub fn clear_addresses(&self) -> Result<(), NetifError> {
        let link = self.link()?;
        self.shared.stack.set_addresses(
            link.id(),
            RawIpv4::UNSPECIFIED,
            RawIpv4::UNSPECIFIED,
            RawIpv4::UNSPECIFIED,
        );
        Ok(())
    }

    /// Arms DHCP: the monitoring task will begin acquisition whenever the
    /// link is up.
    pub fn enable_dhcp(&self) -> Result<(), NetifError> {
        let link = self.link()?;
        link.set_dhcp_enabled(true);
        link.start_dhcp();
        Ok(())
    }

    pub fn disable_dhcp(&self) -> Result<(), NetifError> {
        let link = self.link()?;
        link.set_dhcp_enabled(false);
        link.stop_dhcp();
        Ok(())
    }

    pub fn dhcp_enabled(&self) -> bool {
        self.shared.link.get().map(LinkController::dhcp_enabled).unwrap_or(false)
    }

    pub fn dhcp_started(&self) -> bool {
        self.shared.link.get().map(LinkController::dhcp_started).unwrap_or(false)
    }

    pub fn is_link_up(&self) -> bool {
        self.shared.link.get().map(LinkController::is_link_up).unwrap_or(false)
    }

    /// Whether the current DHCP negotiation has supplied an address.
    ///
    /// Precondition: DHCP must be enabled; querying otherwise is a logic
    /// error, distinct from I/O failures.
    pub fn has_dhcp_address(&self) -> Result<bool, NetifError> {
        let link = self.link()?;
        if !link.dhcp_enabled() {
            return Err(NetifError::DhcpNotEnabled);
        }

        Ok(self.shared.stack.dhcp_supplied(link.id()))
    }

    pub fn set_as_default(&self) -> Result<(), NetifError> {
        let link = self.link()?;
        self.shared.stack.set_default(link.id());
        Ok(())
    }

    pub fn is_default(&self) -> bool {
        self.shared
            .link
            .get()
            .map(|link| self.shared.stack.default_interface() == Some(link.id()))
            .unwrap_or(false)
    }
}

impl Drop for NetifHandle {
    fn drop(&mut self) {
        // Backstop only: stops the monitoring task. The stack record is
        // released by `shutdown`.
        self.shared.disposed.store(true, Ordering::SeqCst);
        self.shared.cancel.cancel();
    }
}

/// Builds the outbound path: gathers the stack's segments and hands them to
/// the current port. Holds only a weak reference so the stack-side handler
/// cannot keep the interface alive.
fn output_handler(shared: &Arc<NetifShared>) -> OutputHandler {
    let weak = Arc::downgrade(shared);

    Arc::new(move |segments: &[&[u8]]| {
        let Some(shared) = weak.upgrade() else {
            return Err(StackError::Interface);
        };

        let Some(port) = shared.lock_port().clone() else {
            return Err(StackError::Interface);
        };

        let slices: Vec<std::io::IoSlice<'_>> =
            segments.iter().map(|segment| std::io::IoSlice::new(segment)).collect();

        port.send(&slices).map_err(|err| {
            log::warn!("netif({}): send failed: {}", shared.name, err);
            StackError::Interface
        })
    })
}
