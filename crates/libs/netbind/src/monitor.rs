//! Per-interface monitoring task.
//!
//! One task per handle for the handle's whole lifetime. It is the only actor
//! that initiates DHCP attempts; link transitions arrive concurrently from
//! port callbacks, so every attempt is evaluated against the link-state
//! snapshot taken when it starts.

use std::sync::Arc;
use std::time::Duration;

use netbind_addr::RawIpv4;
use tokio::time;

use crate::link::LinkController;
use crate::netif::NetifShared;

/// Retry budget for one DHCP acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhcpRetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for DhcpRetryPolicy {
    fn default() -> Self {
        Self { attempts: 50, interval: Duration::from_millis(100) }
    }
}

/// Tuning for the per-interface monitoring task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub dhcp: DhcpRetryPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(1), dhcp: DhcpRetryPolicy::default() }
    }
}

pub(crate) fn spawn(shared: Arc<NetifShared>, config: MonitorConfig) {
    tokio::spawn(async move {
        let mut had_lease = false;

        loop {
            if shared.is_disposed() {
                log::debug!("netif({}): monitor task exit", shared.name);
                shared.monitor_exited.notify_one();
                return;
            }

            if let Some(link) = shared.link.get() {
                if link.dhcp_enabled() && link.is_link_up() {
                    let snapshotted = try_dhcp(&shared, link, config.dhcp).await;

                    // A lease can also arrive after the attempt budget, on a
                    // later poll. Snapshot it the first time it shows up.
                    let has_lease = shared.stack.dhcp_supplied(link.id());
                    if !had_lease && has_lease && !snapshotted {
                        snapshot_lease(&shared, link);
                    }

                    had_lease = has_lease;
                }
            }

            tokio::select! {
                _ = shared.cancel.cancelled() => {}
                _ = time::sleep(config.poll_interval) => {}
            }
        }
    });
}

/// One bounded DHCP acquisition attempt with static fallback.
///
/// Never returns an error; a failed negotiation falls back to the cached
/// static configuration. Only the monitoring task calls this, so no two
/// attempts for the same interface can overlap. Returns whether a fresh lease
/// was snapshotted.
async fn try_dhcp(shared: &NetifShared, link: &LinkController, policy: DhcpRetryPolicy) -> bool {
    if link.dhcp_started() {
        return false;
    }

    log::info!("netif({}): starting dhcp", shared.name);
    link.start_dhcp();

    let id = link.id();
    let mut supplied = false;

    for _ in 0..policy.attempts {
        if shared.stack.dhcp_supplied(id) {
            supplied = true;
            break;
        }

        time::sleep(policy.interval).await;
    }

    if !supplied {
        let (ip, netmask, gateway) = {
            let cache = shared.lock_cache();
            (cache.ip, cache.netmask, cache.gateway)
        };

        shared.stack.set_addresses(
            id,
            RawIpv4::from_host(ip),
            RawIpv4::from_host(netmask),
            RawIpv4::from_host(gateway),
        );

        log::info!(
            "netif({}): dhcp timed out, using static ip={} netmask={} gateway={}",
            shared.name,
            ip,
            netmask,
            gateway
        );
        return false;
    }

    snapshot_lease(shared, link);
    true
}

/// Copies the stack-assigned triple into the cache and logs the lease.
fn snapshot_lease(shared: &NetifShared, link: &LinkController) {
    let (ip, netmask, gateway) = shared.stack.addresses(link.id());
    let (ip, netmask, gateway) = (ip.to_host(), netmask.to_host(), gateway.to_host());

    {
        let mut cache = shared.lock_cache();
        cache.ip = ip;
        cache.netmask = netmask;
        cache.gateway = gateway;
    }

    log::info!(
        "netif({}): dhcp lease acquired ip={} netmask={} gateway={}",
        shared.name,
        ip,
        netmask,
        gateway
    );
}
