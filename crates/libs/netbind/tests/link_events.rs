use std::net::Ipv4Addr;
use std::sync::Arc;

use netbind::{NetifError, NetifHandle, PortError};
use netbind_addr::MacAddr;
use test_support::{MockPort, MockStack};

const MAC: MacAddr = MacAddr([0x02, 0x00, 0x00, 0xaa, 0xbb, 0x02]);

fn open_handle(stack: &Arc<MockStack>, port: &Arc<MockPort>) -> NetifHandle {
    let handle = NetifHandle::new("eth0", stack.shared());
    handle
        .open(
            Arc::clone(port) as Arc<dyn netbind::EthernetPort>,
            MAC,
            Ipv4Addr::new(192, 0, 2, 10),
            Ipv4Addr::new(255, 255, 255, 0),
            Ipv4Addr::new(192, 0, 2, 1),
            1500,
        )
        .expect("open interface");
    handle
}

#[tokio::test]
async fn connection_event_drives_link_up() {
    let stack = MockStack::new();
    let port = MockPort::new();
    let handle = open_handle(&stack, &port);
    let id = handle.stack_id().expect("registered");

    assert!(!handle.is_link_up());
    port.connect();
    assert!(handle.is_link_up());
    assert_eq!(stack.is_up(id), Some(true));
    assert_eq!(stack.is_link_up(id), Some(true));

    port.disconnect();
    assert!(!handle.is_link_up());
    assert_eq!(stack.is_up(id), Some(false));
    assert_eq!(stack.is_link_up(id), Some(false));
}

#[tokio::test]
async fn any_down_transition_leaves_dhcp_disarmed() {
    let stack = MockStack::new();
    let port = MockPort::new();
    let handle = open_handle(&stack, &port);

    // Several orderings of events and enables; the armed flag must never
    // survive a down transition.
    handle.enable_dhcp().expect("enable dhcp");
    assert!(handle.dhcp_started());
    port.disconnect();
    assert!(!handle.dhcp_started());

    port.connect();
    port.disconnect();
    assert!(!handle.dhcp_started());

    port.connect();
    port.connect();
    port.disconnect();
    port.disconnect();
    assert!(!handle.dhcp_started());
}

#[tokio::test]
async fn up_transition_also_clears_the_armed_flag() {
    let stack = MockStack::new();
    let port = MockPort::new();
    let handle = open_handle(&stack, &port);

    handle.enable_dhcp().expect("enable dhcp");
    assert!(handle.dhcp_started());
    port.connect();
    assert!(!handle.dhcp_started());
}

#[tokio::test]
async fn repeated_enable_issues_one_dhcp_start_request() {
    let stack = MockStack::new();
    let port = MockPort::new();
    let handle = open_handle(&stack, &port);
    let id = handle.stack_id().expect("registered");

    handle.enable_dhcp().expect("enable dhcp");
    handle.enable_dhcp().expect("enable dhcp again");
    assert_eq!(stack.dhcp_start_count(id), 1);

    handle.disable_dhcp().expect("disable dhcp");
    assert!(!handle.dhcp_started());
    handle.disable_dhcp().expect("disable dhcp again");
}

#[tokio::test]
async fn dhcp_query_without_enable_is_a_precondition_error() {
    let stack = MockStack::new();
    let port = MockPort::new();
    let handle = open_handle(&stack, &port);

    assert_eq!(handle.has_dhcp_address().expect_err("disabled"), NetifError::DhcpNotEnabled);

    handle.enable_dhcp().expect("enable dhcp");
    assert!(!handle.has_dhcp_address().expect("enabled"));
}

#[tokio::test]
async fn received_frames_reach_the_stack_input_path() {
    let stack = MockStack::new();
    let port = MockPort::new();
    let handle = open_handle(&stack, &port);
    let id = handle.stack_id().expect("registered");

    let results = port.deliver_frame(&[0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(results, vec![Ok(())]);
    assert_eq!(stack.inputs_of(id), vec![vec![0xde, 0xad, 0xbe, 0xef]]);
}

#[tokio::test]
async fn stack_input_failure_is_contained_as_a_port_error() {
    let stack = MockStack::new();
    let port = MockPort::new();
    let handle = open_handle(&stack, &port);
    let id = handle.stack_id().expect("registered");

    stack.set_reject_input(true);
    let results = port.deliver_frame(&[0x01, 0x02]);
    assert_eq!(results, vec![Err(PortError::Rejected)]);
    assert!(stack.inputs_of(id).is_empty());
}

#[tokio::test]
async fn outbound_segments_are_gathered_and_sent() {
    let stack = MockStack::new();
    let port = MockPort::new();
    let handle = open_handle(&stack, &port);
    let id = handle.stack_id().expect("registered");

    stack.transmit(id, &[&[0x00, 0x01], &[0x02], &[0x03, 0x04]]).expect("transmit");
    assert_eq!(port.sent_frames(), vec![vec![0x00, 0x01, 0x02, 0x03, 0x04]]);
}

#[tokio::test]
async fn send_failure_maps_to_a_stack_error_code() {
    let stack = MockStack::new();
    let port = MockPort::new();
    let handle = open_handle(&stack, &port);
    let id = handle.stack_id().expect("registered");

    port.set_fail_send(true);
    let err = stack.transmit(id, &[&[0xff]]).expect_err("send must fail");
    assert_eq!(err, netbind::StackError::Interface);
    assert!(port.sent_frames().is_empty());
}
