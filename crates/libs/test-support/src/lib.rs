//! Shared test doubles for the netbind workspace: a scriptable in-memory IP
//! stack and Ethernet port.

use std::collections::HashMap;
use std::io::IoSlice;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use netbind::{
    EthernetPort, FrameHandler, IpStack, LinkEventHandler, NetifId, OutputHandler, PortError,
    RawNetifConfig, SharedStack, StackError, SubscriptionId,
};
use netbind_addr::{MacAddr, RawIpv4, RawMac};

struct Record {
    hostname: String,
    hwaddr: RawMac,
    mtu: u32,
    ip: RawIpv4,
    netmask: RawIpv4,
    gateway: RawIpv4,
    up: bool,
    link_up: bool,
    dhcp_started: bool,
    dhcp_supplied: bool,
    dhcp_start_calls: u32,
    set_addr_calls: u32,
    inputs: Vec<Vec<u8>>,
    output: OutputHandler,
}

#[derive(Default)]
struct StackState {
    next_id: u64,
    records: HashMap<u64, Record>,
    default_id: Option<u64>,
    refuse_add: bool,
    lease: Option<(RawIpv4, RawIpv4, RawIpv4)>,
    reject_input: bool,
}

/// In-memory stand-in for the IP stack, with call counters and a scriptable
/// DHCP lease. Trait-method access to a removed record bumps
/// `invalid_access_count` so use-after-teardown shows up in assertions.
#[derive(Default)]
pub struct MockStack {
    state: Mutex<StackState>,
    init_calls: AtomicU32,
    remove_calls: AtomicU32,
    invalid_accesses: AtomicU32,
}

impl MockStack {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn shared(self: &Arc<Self>) -> SharedStack {
        let stack: Arc<dyn IpStack> = self.clone();
        SharedStack::new(stack)
    }

    fn lock(&self) -> MutexGuard<'_, StackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_record<T>(&self, id: NetifId, f: impl FnOnce(&mut Record) -> T) -> Option<T> {
        let mut state = self.lock();
        match state.records.get_mut(&id.raw()) {
            Some(record) => Some(f(record)),
            None => {
                self.invalid_accesses.fetch_add(1, Ordering::SeqCst);
                None
            }
        }
    }

    /// Makes subsequent `add_interface` calls fail.
    pub fn set_refuse_add(&self, refuse: bool) {
        self.lock().refuse_add = refuse;
    }

    /// Arms a lease that negotiation will report once DHCP has been started.
    pub fn grant_lease(&self, ip: Ipv4Addr, netmask: Ipv4Addr, gateway: Ipv4Addr) {
        self.lock().lease = Some((
            RawIpv4::from_host(ip),
            RawIpv4::from_host(netmask),
            RawIpv4::from_host(gateway),
        ));
    }

    pub fn set_reject_input(&self, reject: bool) {
        self.lock().reject_input = reject;
    }

    /// Drives the registered output handler as the stack would when
    /// transmitting.
    pub fn transmit(&self, id: NetifId, segments: &[&[u8]]) -> Result<(), StackError> {
        let output =
            self.with_record(id, |record| record.output.clone()).ok_or(StackError::Interface)?;
        output(segments)
    }

    pub fn interface_count(&self) -> usize {
        self.lock().records.len()
    }

    pub fn record_exists(&self, id: NetifId) -> bool {
        self.lock().records.contains_key(&id.raw())
    }

    pub fn addresses_of(&self, id: NetifId) -> Option<(RawIpv4, RawIpv4, RawIpv4)> {
        self.lock().records.get(&id.raw()).map(|r| (r.ip, r.netmask, r.gateway))
    }

    pub fn hostname_of(&self, id: NetifId) -> Option<String> {
        self.lock().records.get(&id.raw()).map(|r| r.hostname.clone())
    }

    pub fn mtu_of(&self, id: NetifId) -> Option<u32> {
        self.lock().records.get(&id.raw()).map(|r| r.mtu)
    }

    pub fn is_up(&self, id: NetifId) -> Option<bool> {
        self.lock().records.get(&id.raw()).map(|r| r.up)
    }

    pub fn is_link_up(&self, id: NetifId) -> Option<bool> {
        self.lock().records.get(&id.raw()).map(|r| r.link_up)
    }

    pub fn dhcp_start_count(&self, id: NetifId) -> u32 {
        self.lock().records.get(&id.raw()).map(|r| r.dhcp_start_calls).unwrap_or(0)
    }

    pub fn set_addr_call_count(&self, id: NetifId) -> u32 {
        self.lock().records.get(&id.raw()).map(|r| r.set_addr_calls).unwrap_or(0)
    }

    pub fn inputs_of(&self, id: NetifId) -> Vec<Vec<u8>> {
        self.lock().records.get(&id.raw()).map(|r| r.inputs.clone()).unwrap_or_default()
    }

    pub fn init_count(&self) -> u32 {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn remove_count(&self) -> u32 {
        self.remove_calls.load(Ordering::SeqCst)
    }

    pub fn invalid_access_count(&self) -> u32 {
        self.invalid_accesses.load(Ordering::SeqCst)
    }
}

impl IpStack for MockStack {
    fn init(&self) {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn add_interface(
        &self,
        config: RawNetifConfig,
        output: OutputHandler,
    ) -> Result<NetifId, StackError> {
        let mut state = self.lock();
        if state.refuse_add {
            return Err(StackError::Memory);
        }

        state.next_id += 1;
        let id = state.next_id;
        state.records.insert(
            id,
            Record {
                hostname: config.hostname,
                hwaddr: config.hwaddr,
                mtu: config.mtu,
                ip: config.ip,
                netmask: config.netmask,
                gateway: config.gateway,
                up: false,
                link_up: false,
                dhcp_started: false,
                dhcp_supplied: false,
                dhcp_start_calls: 0,
                set_addr_calls: 0,
                inputs: Vec::new(),
                output,
            },
        );

        Ok(NetifId::new(id))
    }

    fn remove_interface(&self, id: NetifId) {
        let mut state = self.lock();
        if state.records.remove(&id.raw()).is_some() {
            self.remove_calls.fetch_add(1, Ordering::SeqCst);
            if state.default_id == Some(id.raw()) {
                state.default_id = None;
            }
        } else {
            self.invalid_accesses.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn addresses(&self, id: NetifId) -> (RawIpv4, RawIpv4, RawIpv4) {
        self.with_record(id, |r| (r.ip, r.netmask, r.gateway)).unwrap_or_default()
    }

    fn set_addresses(&self, id: NetifId, ip: RawIpv4, netmask: RawIpv4, gateway: RawIpv4) {
        self.with_record(id, |r| {
            r.ip = ip;
            r.netmask = netmask;
            r.gateway = gateway;
            r.set_addr_calls += 1;
        });
    }

    fn hwaddr(&self, id: NetifId) -> RawMac {
        self.with_record(id, |r| r.hwaddr).unwrap_or_default()
    }

    fn set_hwaddr(&self, id: NetifId, hwaddr: RawMac) {
        self.with_record(id, |r| r.hwaddr = hwaddr);
    }

    fn set_up(&self, id: NetifId) {
        self.with_record(id, |r| r.up = true);
    }

    fn set_down(&self, id: NetifId) {
        self.with_record(id, |r| r.up = false);
    }

    fn set_link_up(&self, id: NetifId) {
        self.with_record(id, |r| r.link_up = true);
    }

    fn set_link_down(&self, id: NetifId) {
        self.with_record(id, |r| r.link_up = false);
    }

    fn default_interface(&self) -> Option<NetifId> {
        self.lock().default_id.map(NetifId::new)
    }

    fn set_default(&self, id: NetifId) {
        let mut state = self.lock();
        if state.records.contains_key(&id.raw()) {
            state.default_id = Some(id.raw());
        } else {
            self.invalid_accesses.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn dhcp_start(&self, id: NetifId) {
        self.with_record(id, |r| {
            r.dhcp_started = true;
            r.dhcp_supplied = false;
            r.dhcp_start_calls += 1;
        });
    }

    fn dhcp_stop(&self, id: NetifId) {
        self.with_record(id, |r| {
            r.dhcp_started = false;
            r.dhcp_supplied = false;
        });
    }

    fn dhcp_supplied(&self, id: NetifId) -> bool {
        let mut state = self.lock();
        let lease = state.lease;
        match state.records.get_mut(&id.raw()) {
            Some(record) => {
                if record.dhcp_started && !record.dhcp_supplied {
                    if let Some((ip, netmask, gateway)) = lease {
                        record.ip = ip;
                        record.netmask = netmask;
                        record.gateway = gateway;
                        record.dhcp_supplied = true;
                    }
                }
                record.dhcp_supplied
            }
            None => {
                self.invalid_accesses.fetch_add(1, Ordering::SeqCst);
                false
            }
        }
    }

    fn input(&self, id: NetifId, frame: Vec<u8>) -> Result<(), StackError> {
        let mut state = self.lock();
        if state.reject_input {
            return Err(StackError::Interface);
        }

        match state.records.get_mut(&id.raw()) {
            Some(record) => {
                record.inputs.push(frame);
                Ok(())
            }
            None => {
                self.invalid_accesses.fetch_add(1, Ordering::SeqCst);
                Err(StackError::Interface)
            }
        }
    }
}

#[derive(Default)]
struct PortState {
    next_sub: u64,
    frame_handlers: Vec<(u64, FrameHandler)>,
    connection_handlers: Vec<(u64, LinkEventHandler)>,
    disconnection_handlers: Vec<(u64, LinkEventHandler)>,
    opens: Vec<MacAddr>,
    sent: Vec<Vec<u8>>,
    fail_open: bool,
    fail_send: bool,
}

/// In-memory stand-in for an Ethernet port. Events are raised by the test
/// driving [`MockPort::connect`], [`MockPort::disconnect`], and
/// [`MockPort::deliver_frame`].
#[derive(Default)]
pub struct MockPort {
    state: Mutex<PortState>,
}

impl MockPort {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, PortState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.lock().fail_open = fail;
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.lock().fail_send = fail;
    }

    /// Raises the connection event on every subscriber.
    pub fn connect(&self) {
        let handlers: Vec<LinkEventHandler> =
            self.lock().connection_handlers.iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in handlers {
            handler();
        }
    }

    /// Raises the disconnection event on every subscriber.
    pub fn disconnect(&self) {
        let handlers: Vec<LinkEventHandler> =
            self.lock().disconnection_handlers.iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in handlers {
            handler();
        }
    }

    /// Delivers one received frame to every subscriber, returning each
    /// handler's result as the port layer would observe it.
    pub fn deliver_frame(&self, frame: &[u8]) -> Vec<Result<(), PortError>> {
        let handlers: Vec<FrameHandler> =
            self.lock().frame_handlers.iter().map(|(_, h)| Arc::clone(h)).collect();
        handlers.iter().map(|handler| handler(frame)).collect()
    }

    pub fn open_count(&self) -> usize {
        self.lock().opens.len()
    }

    pub fn opened_with(&self) -> Vec<MacAddr> {
        self.lock().opens.clone()
    }

    /// Frames handed to `send`, each flattened across its segments.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    pub fn subscription_count(&self) -> usize {
        let state = self.lock();
        state.frame_handlers.len()
            + state.connection_handlers.len()
            + state.disconnection_handlers.len()
    }
}

impl EthernetPort for MockPort {
    fn open(&self, mac: MacAddr) -> Result<(), PortError> {
        let mut state = self.lock();
        if state.fail_open {
            return Err(PortError::NotOpen);
        }

        state.opens.push(mac);
        Ok(())
    }

    fn send(&self, segments: &[IoSlice<'_>]) -> Result<(), PortError> {
        let mut state = self.lock();
        if state.fail_send {
            return Err(PortError::Send);
        }

        let mut frame = Vec::new();
        for segment in segments {
            frame.extend_from_slice(segment);
        }

        state.sent.push(frame);
        Ok(())
    }

    fn subscribe_frames(&self, handler: FrameHandler) -> SubscriptionId {
        let mut state = self.lock();
        state.next_sub += 1;
        let id = state.next_sub;
        state.frame_handlers.push((id, handler));
        SubscriptionId(id)
    }

    fn subscribe_connection(&self, handler: LinkEventHandler) -> SubscriptionId {
        let mut state = self.lock();
        state.next_sub += 1;
        let id = state.next_sub;
        state.connection_handlers.push((id, handler));
        SubscriptionId(id)
    }

    fn subscribe_disconnection(&self, handler: LinkEventHandler) -> SubscriptionId {
        let mut state = self.lock();
        state.next_sub += 1;
        let id = state.next_sub;
        state.disconnection_handlers.push((id, handler));
        SubscriptionId(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let mut state = self.lock();
        state.frame_handlers.retain(|(sub, _)| *sub != id.0);
        state.connection_handlers.retain(|(sub, _)| *sub != id.0);
        state.disconnection_handlers.retain(|(sub, _)| *sub != id.0);
    }
}
