//! Helpers for turning user supplied host strings into socket addresses.
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use crate::error::Result;

/// Returns `host` when it is a valid IPv4 literal, `127.0.0.1` otherwise.
pub fn check_address(host: &str) -> Ipv4Addr {
    host.parse().unwrap_or(Ipv4Addr::LOCALHOST)
}

pub fn format_address(host: &str, port: u16) -> String {
    format!("{}:{port}", check_address(host))
}

/// Parses `host:port` or a bare `port`.
///
/// A missing or invalid host falls back to `127.0.0.1`; an invalid port is an error.
pub fn parse_address(address: &str) -> Result<SocketAddr> {
    let (host, port) = match address.rsplit_once(':') {
        Some((host, port)) => (host, port),
        None => ("", address),
    };
    let port = port.trim().parse::<u16>()?;

    Ok(SocketAddr::V4(SocketAddrV4::new(check_address(host.trim()), port)))
}
