// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};

use crate::core::url::{parse_url_with_scheme, OPC_UDP_SCHEME};

/// How datagrams reach an endpoint, which decides how its socket is set up.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UdpAddressType {
    Unicast,
    Broadcast,
    Multicast,
}

impl UdpAddressType {
    /// Classifies an address. Besides the limited broadcast address any IPv4 address ending in
    /// 255 is taken to be a subnet broadcast.
    pub fn classify(address: &SocketAddr) -> Self {
        match address.ip() {
            IpAddr::V4(ip) if ip.is_multicast() => UdpAddressType::Multicast,
            IpAddr::V4(ip) if ip.is_broadcast() || ip.octets()[3] == 255 => {
                UdpAddressType::Broadcast
            }
            IpAddr::V6(ip) if ip.is_multicast() => UdpAddressType::Multicast,
            _ => UdpAddressType::Unicast,
        }
    }
}

fn is_dotted_numeric(host: &str) -> bool {
    host.split('.').count() == 4
        && host
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// Resolves an `opc.udp://host:port` url to a socket address. The url must have a host and a
/// non zero port. Returns `None` for anything else, including host names that do not resolve.
pub fn get_endpoint(url: &str) -> Option<SocketAddr> {
    let (host, port) = match parse_url_with_scheme(url, OPC_UDP_SCHEME) {
        Ok((host, Some(port))) if port != 0 => (host, port),
        Ok(_) => {
            debug!("Url {} has no usable port", url);
            return None;
        }
        Err(_) => return None,
    };

    if is_dotted_numeric(&host) {
        return match host.parse::<Ipv4Addr>() {
            Ok(ip) => Some(SocketAddr::new(IpAddr::V4(ip), port)),
            Err(_) => {
                debug!("Url {} has an invalid IPv4 address", url);
                None
            }
        };
    }

    // IPv6 hosts come back in brackets
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Some(SocketAddr::new(ip, port));
    }
    match (host, port).to_socket_addrs() {
        Ok(addrs) => {
            let addrs = addrs.collect::<Vec<_>>();
            addrs
                .iter()
                .find(|a| a.is_ipv4())
                .or_else(|| addrs.first())
                .copied()
        }
        Err(err) => {
            debug!("Cannot resolve host {}, error = {}", host, err);
            None
        }
    }
}
