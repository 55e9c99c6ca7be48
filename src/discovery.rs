//! Host discovery
//!
//! Finds the local IPv4 address the OS would use to reach the outside world,
//! so a client on another device or emulator can call back into a test
//! server running here. A UDP socket is "connected" to a public address;
//! that only asks the routing table to pick a source interface, no packet
//! is sent.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, ToSocketAddrs, UdpSocket};

use crate::error::{Result, StagehandError};

/// Public address used to select the outbound interface.
pub const PROBE_ADDR: &str = "8.8.8.8:65530";

/// The externally routable local IPv4 address of this host.
pub fn local_reachable_address() -> Result<Ipv4Addr> {
    local_reachable_address_via(PROBE_ADDR)
}

/// Same as [`local_reachable_address`], routing towards `probe` instead.
pub fn local_reachable_address_via<A: ToSocketAddrs>(probe: A) -> Result<Ipv4Addr> {
    let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
        .map_err(|e| StagehandError::NetworkUnavailable(format!("cannot open UDP socket: {}", e)))?;

    socket
        .connect(probe)
        .map_err(|e| StagehandError::NetworkUnavailable(format!("no route to probe address: {}", e)))?;

    let local = socket
        .local_addr()
        .map_err(|e| StagehandError::NetworkUnavailable(format!("cannot read local address: {}", e)))?;

    match local.ip() {
        IpAddr::V4(ip) if !ip.is_unspecified() => {
            log::debug!("discovered local address {}", ip);
            Ok(ip)
        }
        other => Err(StagehandError::NetworkUnavailable(format!(
            "routing selected no usable IPv4 address ({})",
            other
        ))),
    }
}

/// Whether a TCP listener could bind `port` on all interfaces right now.
pub fn is_port_free(port: u16) -> bool {
    TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_probe_selects_loopback() {
        let ip = local_reachable_address_via("127.0.0.1:65530").unwrap();
        assert!(ip.is_loopback());
    }

    #[test]
    fn test_external_probe_is_not_loopback() {
        // Hosts without a default route report NetworkUnavailable instead.
        match local_reachable_address() {
            Ok(ip) => {
                assert!(!ip.is_loopback());
                assert!(!ip.is_unspecified());
                assert_eq!(ip.to_string().parse::<Ipv4Addr>().unwrap(), ip);
            }
            Err(e) => assert!(matches!(e, StagehandError::NetworkUnavailable(_))),
        }
    }

    #[test]
    fn test_unresolvable_probe_is_network_unavailable() {
        let result = local_reachable_address_via("no-such-host.invalid:1");
        assert!(matches!(result, Err(StagehandError::NetworkUnavailable(_))));
    }

    #[test]
    fn test_is_port_free() {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(!is_port_free(port));
        drop(listener);
        assert!(is_port_free(port));
    }
}
