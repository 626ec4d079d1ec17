//! Bootstrap discovery: seed-peer parsing and local/public IP lookup.

use std::net::{IpAddr, UdpSocket};

use tracing::debug;

/// Parse an `"ip:port"` seed entry. `None` for malformed input.
pub fn parse_peer_addr(entry: &str) -> Option<(String, u16)> {
    let (ip, port) = entry.rsplit_once(':')?;
    let port = port.parse::<u16>().ok()?;
    ip.parse::<IpAddr>().ok()?;
    Some((ip.to_string(), port))
}

/// The address other machines on the local network reach us at.
///
/// Opens a UDP socket toward a public address; no packet is sent, the
/// kernel just picks the outbound interface.
pub fn fetch_local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    Some(socket.local_addr().ok()?.ip())
}

/// The public address to announce to remote peers, from an external
/// what-is-my-ip service. `None` when the lookup fails or returns junk.
pub async fn fetch_public_ip() -> Option<IpAddr> {
    let body = reqwest::get("https://api.ipify.org")
        .await
        .ok()?
        .text()
        .await
        .ok()?;
    match body.trim().parse::<IpAddr>() {
        Ok(ip) => Some(ip),
        Err(_) => {
            debug!(response = %body, "public ip service returned a non-address");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ipv4_with_port() {
        assert_eq!(
            parse_peer_addr("192.168.1.4:31013"),
            Some(("192.168.1.4".to_string(), 31013))
        );
    }

    #[test]
    fn rejects_missing_port() {
        assert_eq!(parse_peer_addr("192.168.1.4"), None);
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert_eq!(parse_peer_addr("192.168.1.4:ghost"), None);
    }

    #[test]
    fn rejects_non_address_host() {
        assert_eq!(parse_peer_addr("not-an-ip:31013"), None);
    }

    #[test]
    fn parses_ipv6_with_port() {
        assert_eq!(parse_peer_addr("::1:31013"), Some(("::1".to_string(), 31013)));
    }
}
