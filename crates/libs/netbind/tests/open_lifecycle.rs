use std::net::Ipv4Addr;
use std::sync::Arc;

use netbind::{NetifError, NetifHandle};
use netbind_addr::{MacAddr, RawIpv4};
use test_support::{MockPort, MockStack};

const MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0xaa, 0xbb, 0x01]);

fn static_addrs() -> (Ipv4Addr, Ipv4Addr, Ipv4Addr) {
    (
        Ipv4Addr::new(192, 0, 2, 10),
        Ipv4Addr::new(255, 255, 255, 0),
        Ipv4Addr::new(192, 0, 2, 1),
    )
}

fn open_static(handle: &NetifHandle, port: &Arc<MockPort>) {
    let (ip, netmask, gateway) = static_addrs();
    handle
        .open(Arc::clone(port) as Arc<dyn netbind::EthernetPort>, MAC, ip, netmask, gateway, 1500)
        .expect("open interface");
}

#[tokio::test]
async fn open_rejects_zero_mtu_without_side_effects() {
    let stack = MockStack::new();
    let port = MockPort::new();
    let handle = NetifHandle::new("eth0", stack.shared());
    let (ip, netmask, gateway) = static_addrs();

    let err = handle
        .open(Arc::clone(&port) as Arc<dyn netbind::EthernetPort>, MAC, ip, netmask, gateway, 0)
        .expect_err("zero mtu must fail");

    assert!(matches!(err, NetifError::InvalidArgument { .. }));
    assert_eq!(port.open_count(), 0);
    assert_eq!(port.subscription_count(), 0);
    assert_eq!(stack.interface_count(), 0);
    assert_eq!(stack.init_count(), 0);
}

#[tokio::test]
async fn open_rejects_empty_interface_name() {
    let stack = MockStack::new();
    let port = MockPort::new();
    let handle = NetifHandle::new("", stack.shared());
    let (ip, netmask, gateway) = static_addrs();

    let err = handle
        .open(Arc::clone(&port) as Arc<dyn netbind::EthernetPort>, MAC, ip, netmask, gateway, 1500)
        .expect_err("empty name must fail");

    assert!(matches!(err, NetifError::InvalidArgument { .. }));
    assert_eq!(stack.interface_count(), 0);
}

#[tokio::test]
async fn registration_refusal_is_fatal_and_leaves_no_subscriptions() {
    let stack = MockStack::new();
    let port = MockPort::new();
    let handle = NetifHandle::new("eth0", stack.shared());
    let (ip, netmask, gateway) = static_addrs();

    stack.set_refuse_add(true);
    let err = handle
        .open(Arc::clone(&port) as Arc<dyn netbind::EthernetPort>, MAC, ip, netmask, gateway, 1500)
        .expect_err("refused registration must fail");

    assert!(matches!(err, NetifError::Registration { .. }));
    assert_eq!(port.subscription_count(), 0);
    assert_eq!(stack.interface_count(), 0);
    assert!(handle.stack_id().is_none());
}

#[tokio::test]
async fn static_open_reports_configured_addresses() {
    let stack = MockStack::new();
    let port = MockPort::new();
    let handle = NetifHandle::new("eth0", stack.shared());
    open_static(&handle, &port);

    let (ip, netmask, gateway) = static_addrs();
    assert_eq!(handle.ip_address().expect("ip"), ip);
    assert_eq!(handle.netmask().expect("netmask"), netmask);
    assert_eq!(handle.gateway().expect("gateway"), gateway);
    assert_eq!(handle.mac().expect("mac"), MAC);
    assert!(!handle.dhcp_enabled());

    let id = handle.stack_id().expect("registered");
    assert_eq!(stack.hostname_of(id).as_deref(), Some("eth0"));
    assert_eq!(stack.mtu_of(id), Some(1500));
    assert_eq!(port.opened_with(), vec![MAC]);
    assert_eq!(stack.init_count(), 1);
}

#[tokio::test]
async fn first_open_becomes_default_second_does_not_steal_it() {
    let stack = MockStack::new();
    let shared = stack.shared();
    let port_a = MockPort::new();
    let port_b = MockPort::new();

    let first = NetifHandle::new("eth0", shared.clone());
    let second = NetifHandle::new("eth1", shared);
    open_static(&first, &port_a);
    open_static(&second, &port_b);

    assert!(first.is_default());
    assert!(!second.is_default());

    second.set_as_default().expect("set default");
    assert!(second.is_default());
    assert!(!first.is_default());
}

#[tokio::test]
async fn reopen_replaces_subscriptions_without_reregistering() {
    let stack = MockStack::new();
    let port = MockPort::new();
    let handle = NetifHandle::new("eth0", stack.shared());
    open_static(&handle, &port);

    let id = handle.stack_id().expect("registered");
    let calls_before = stack.set_addr_call_count(id);

    open_static(&handle, &port);

    assert_eq!(port.subscription_count(), 3);
    assert_eq!(port.open_count(), 2);
    assert_eq!(stack.interface_count(), 1);
    assert_eq!(handle.stack_id(), Some(id));
    assert_eq!(stack.set_addr_call_count(id), calls_before + 1);
    assert_eq!(stack.init_count(), 1);
}

#[tokio::test]
async fn batch_address_update_costs_one_reconfiguration() {
    let stack = MockStack::new();
    let port = MockPort::new();
    let handle = NetifHandle::new("eth0", stack.shared());
    open_static(&handle, &port);

    let id = handle.stack_id().expect("registered");
    let baseline = stack.set_addr_call_count(id);

    handle
        .set_all_addresses(
            Ipv4Addr::new(10, 0, 0, 2),
            Ipv4Addr::new(255, 255, 0, 0),
            Ipv4Addr::new(10, 0, 0, 1),
        )
        .expect("batch set");
    assert_eq!(stack.set_addr_call_count(id), baseline + 1);

    handle.set_ip_address(Ipv4Addr::new(10, 0, 0, 3)).expect("set ip");
    handle.set_netmask(Ipv4Addr::new(255, 0, 0, 0)).expect("set netmask");
    handle.set_gateway(Ipv4Addr::new(10, 0, 0, 254)).expect("set gateway");
    assert_eq!(stack.set_addr_call_count(id), baseline + 4);

    assert_eq!(handle.ip_address().expect("ip"), Ipv4Addr::new(10, 0, 0, 3));
    assert_eq!(handle.netmask().expect("netmask"), Ipv4Addr::new(255, 0, 0, 0));
    assert_eq!(handle.gateway().expect("gateway"), Ipv4Addr::new(10, 0, 0, 254));
}

#[tokio::test]
async fn clear_addresses_sets_all_three_unspecified() {
    let stack = MockStack::new();
    let port = MockPort::new();
    let handle = NetifHandle::new("eth0", stack.shared());
    open_static(&handle, &port);

    handle.clear_addresses().expect("clear");

    let id = handle.stack_id().expect("registered");
    assert_eq!(
        stack.addresses_of(id),
        Some((RawIpv4::UNSPECIFIED, RawIpv4::UNSPECIFIED, RawIpv4::UNSPECIFIED))
    );
}

#[tokio::test]
async fn set_mac_round_trips_through_the_record() {
    let stack = MockStack::new();
    let port = MockPort::new();
    let handle = NetifHandle::new("eth0", stack.shared());
    open_static(&handle, &port);

    let mac = MacAddr([0x02, 0x42, 0x42, 0x42, 0x42, 0x07]);
    handle.set_mac(mac).expect("set mac");
    assert_eq!(handle.mac().expect("mac"), mac);
}

#[tokio::test]
async fn accessors_before_open_report_not_open() {
    let stack = MockStack::new();
    let handle = NetifHandle::new("eth0", stack.shared());

    assert_eq!(handle.ip_address().expect_err("not open"), NetifError::NotOpen);
    assert_eq!(handle.enable_dhcp().expect_err("not open"), NetifError::NotOpen);
    assert!(!handle.is_default());
    assert!(!handle.is_link_up());
}

#[tokio::test]
async fn concurrent_first_opens_initialize_the_stack_once() {
    let stack = MockStack::new();
    let shared = stack.shared();

    let mut handles = Vec::new();
    for index in 0..8 {
        let shared = shared.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            shared.ensure_initialized();
            index
        }));
    }

    for task in handles {
        task.await.expect("join");
    }

    assert_eq!(stack.init_count(), 1);
}
