//! ==============================================================================
//! network.rs - local network identity
//! ==============================================================================
//!
//! purpose:
//!     the station shows its ip address on the display and reports it as the
//!     "hostname" in status announcements. the address is found by pointing a
//!     udp socket at a non-routable address (nothing is sent) and reading the
//!     local end; if that fails, 127.0.0.1.
//!
//! ==============================================================================

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::OnceLock;

const PROBE_ADDR: &str = "10.255.255.255:1";

static LOCAL_IP: OnceLock<IpAddr> = OnceLock::new();

/// this host's outward-facing address, discovered once per process
pub fn local_ip() -> IpAddr {
    *LOCAL_IP.get_or_init(|| {
        let ip = discover().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        tracing::info!(target: "network", %ip, "local address");
        ip
    })
}

fn discover() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect(PROBE_ADDR).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_yields_an_address_and_caches_it() {
        let first = local_ip();
        assert!(!first.is_unspecified());
        assert_eq!(local_ip(), first);
    }
}
