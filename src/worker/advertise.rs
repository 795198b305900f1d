//! Picking the host a worker advertises to its master.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Host the master should use to reach a worker bound to `bound`.
///
/// Order: the configured host, the bound IP when it is specific, the
/// outbound interface address when bound to all interfaces, and finally
/// loopback.
pub fn advertise_host(configured: Option<&str>, bound: IpAddr) -> String {
    if let Some(host) = configured.map(str::trim).filter(|h| !h.is_empty()) {
        return host.to_string();
    }
    if !bound.is_unspecified() {
        return bound.to_string();
    }
    detect_external_ip()
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .to_string()
}

/// Address of the interface used for outbound traffic.
///
/// Connecting a UDP socket sends nothing; it only asks the OS to choose a
/// route and therefore a source address.
pub fn detect_external_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_loopback() && !ip.is_unspecified()).then_some(ip)
}
