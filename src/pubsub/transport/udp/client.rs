// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! UDP sockets of a connection. Every socket is wrapped in a `UdpClient` that remembers how it was
//! made so it can be rebuilt in place after a failure.

use std::{
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::sync::*;

use super::endpoint::UdpAddressType;

/// Whether a socket sends to the endpoint or receives what is sent to it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UdpClientRole {
    Publisher,
    Subscriber,
}

/// Looks up a local IPv4 interface by address or by name.
pub fn resolve_interface(network_interface: &str) -> Option<Ipv4Addr> {
    if let Ok(ip) = network_interface.parse::<Ipv4Addr>() {
        return Some(ip);
    }
    match local_ip_address::list_afinet_netifas() {
        Ok(interfaces) => interfaces.into_iter().find_map(|(name, ip)| match ip {
            IpAddr::V4(ip) if name == network_interface => Some(ip),
            _ => None,
        }),
        Err(err) => {
            warn!("Cannot list network interfaces, error = {}", err);
            None
        }
    }
}

/// Non loopback IPv4 interfaces that can take part in multicast.
fn multicast_interfaces() -> Vec<Ipv4Addr> {
    match local_ip_address::list_afinet_netifas() {
        Ok(interfaces) => {
            let mut addresses = interfaces
                .into_iter()
                .filter_map(|(_, ip)| match ip {
                    IpAddr::V4(ip) if !ip.is_loopback() => Some(ip),
                    _ => None,
                })
                .collect::<Vec<_>>();
            addresses.sort();
            addresses.dedup();
            addresses
        }
        Err(err) => {
            debug!("Cannot list network interfaces, error = {}", err);
            Vec::new()
        }
    }
}

#[derive(Debug)]
pub struct UdpClient {
    role: UdpClientRole,
    address_type: UdpAddressType,
    endpoint: SocketAddr,
    /// Interface to send from. Unspecified lets the operating system pick.
    interface: Ipv4Addr,
    /// Interfaces a multicast subscriber joins the group on.
    join_interfaces: Vec<Ipv4Addr>,
    sockets: RwLock<ClientSockets>,
}

/// The tokio socket receives. Sends go through a duplicate of the same descriptor, which does
/// not depend on the reactor having registered the socket yet.
#[derive(Debug, Clone)]
struct ClientSockets {
    socket: Arc<UdpSocket>,
    sender: Arc<Socket>,
}

impl UdpClient {
    /// Creates the socket. Must be called from within a tokio runtime.
    pub fn new(
        role: UdpClientRole,
        interface: Ipv4Addr,
        join_interfaces: Vec<Ipv4Addr>,
        endpoint: SocketAddr,
    ) -> io::Result<Self> {
        let address_type = UdpAddressType::classify(&endpoint);
        let sockets =
            Self::create_socket(role, address_type, interface, &join_interfaces, endpoint)?;
        Ok(Self {
            role,
            address_type,
            endpoint,
            interface,
            join_interfaces,
            sockets: RwLock::new(sockets),
        })
    }

    fn create_socket(
        role: UdpClientRole,
        address_type: UdpAddressType,
        interface: Ipv4Addr,
        join_interfaces: &[Ipv4Addr],
        endpoint: SocketAddr,
    ) -> io::Result<ClientSockets> {
        let socket = Socket::new(
            Domain::for_address(endpoint),
            Type::DGRAM,
            Some(Protocol::UDP),
        )?;
        // Several subscribers on one host share a port
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;
        socket.set_nonblocking(true)?;

        let unspecified = match endpoint {
            SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            SocketAddr::V6(_) => IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED),
        };
        let bind_address = match (role, address_type) {
            (UdpClientRole::Subscriber, UdpAddressType::Unicast) => endpoint,
            (UdpClientRole::Subscriber, _) => SocketAddr::new(unspecified, endpoint.port()),
            (UdpClientRole::Publisher, _) if endpoint.is_ipv4() => {
                SocketAddr::new(IpAddr::V4(interface), 0)
            }
            (UdpClientRole::Publisher, _) => SocketAddr::new(unspecified, 0),
        };

        match address_type {
            UdpAddressType::Broadcast => socket.set_broadcast(true)?,
            UdpAddressType::Multicast => {
                if endpoint.is_ipv4() {
                    socket.set_multicast_loop_v4(true)?;
                    socket.set_multicast_ttl_v4(1)?;
                    if !interface.is_unspecified() {
                        socket.set_multicast_if_v4(&interface)?;
                    }
                }
            }
            UdpAddressType::Unicast => {}
        }

        socket.bind(&bind_address.into())?;

        if role == UdpClientRole::Subscriber && address_type == UdpAddressType::Multicast {
            if let IpAddr::V4(group) = endpoint.ip() {
                Self::join_multicast_group(&socket, group, join_interfaces)?;
            }
        }

        debug!(
            "Created {:?} socket for {} ({:?}) bound to {}",
            role, endpoint, address_type, bind_address
        );
        let sender = socket.try_clone()?;
        Ok(ClientSockets {
            socket: Arc::new(UdpSocket::from_std(socket.into())?),
            sender: Arc::new(sender),
        })
    }

    fn join_multicast_group(
        socket: &Socket,
        group: Ipv4Addr,
        interfaces: &[Ipv4Addr],
    ) -> io::Result<()> {
        if interfaces.is_empty() {
            return socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED);
        }
        let mut joined = false;
        for interface in interfaces {
            match socket.join_multicast_v4(&group, interface) {
                Ok(()) => {
                    debug!("Joined multicast group {} on {}", group, interface);
                    joined = true;
                }
                Err(err) => debug!(
                    "Cannot join multicast group {} on {}, error = {}",
                    group, interface, err
                ),
            }
        }
        if joined {
            Ok(())
        } else {
            socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
        }
    }

    pub fn role(&self) -> UdpClientRole {
        self.role
    }

    pub fn address_type(&self) -> UdpAddressType {
        self.address_type
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn socket(&self) -> Arc<UdpSocket> {
        trace_read_lock!(self.sockets).socket.clone()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket().local_addr()
    }

    /// Replaces the socket with a new one made the same way.
    pub fn renew(&self) -> io::Result<()> {
        let sockets = Self::create_socket(
            self.role,
            self.address_type,
            self.interface,
            &self.join_interfaces,
            self.endpoint,
        )?;
        *trace_write_lock!(self.sockets) = sockets;
        info!("Renewed {:?} socket for {}", self.role, self.endpoint);
        Ok(())
    }

    /// Sends a datagram to the endpoint without waiting. Returns false if it could not be sent.
    pub fn send(&self, bytes: &[u8]) -> bool {
        let sender = trace_read_lock!(self.sockets).sender.clone();
        match sender.send_to(bytes, &self.endpoint.into()) {
            Ok(sent) if sent == bytes.len() => true,
            Ok(sent) => {
                warn!(
                    "Sent {} of {} bytes to {}",
                    sent,
                    bytes.len(),
                    self.endpoint
                );
                false
            }
            Err(err) => {
                warn!("Cannot send to {}, error = {}", self.endpoint, err);
                false
            }
        }
    }
}

/// Creates the sockets for an endpoint. A multicast publisher without an interface sends from
/// every interface. A multicast subscriber has one socket that joins the group on the interface,
/// or on every interface if there is none. Other endpoints get a single socket.
pub fn get_udp_clients(
    role: UdpClientRole,
    network_interface: Option<&str>,
    endpoint: SocketAddr,
) -> io::Result<Vec<UdpClient>> {
    let interface = match network_interface {
        Some(name) => resolve_interface(name).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("network interface {} not found", name),
            )
        })?,
        None => Ipv4Addr::UNSPECIFIED,
    };
    let address_type = UdpAddressType::classify(&endpoint);

    if address_type != UdpAddressType::Multicast || !endpoint.is_ipv4() {
        return Ok(vec![UdpClient::new(role, interface, Vec::new(), endpoint)?]);
    }

    let interfaces = if interface.is_unspecified() {
        multicast_interfaces()
    } else {
        vec![interface]
    };
    match role {
        UdpClientRole::Subscriber => Ok(vec![UdpClient::new(
            role,
            interface,
            interfaces,
            endpoint,
        )?]),
        UdpClientRole::Publisher if interfaces.is_empty() => {
            Ok(vec![UdpClient::new(role, interface, Vec::new(), endpoint)?])
        }
        UdpClientRole::Publisher => {
            let mut clients = Vec::with_capacity(interfaces.len());
            for interface in interfaces {
                match UdpClient::new(role, interface, Vec::new(), endpoint) {
                    Ok(client) => clients.push(client),
                    Err(err) => debug!(
                        "Cannot send to {} from {}, error = {}",
                        endpoint, interface, err
                    ),
                }
            }
            if clients.is_empty() {
                clients.push(UdpClient::new(
                    role,
                    Ipv4Addr::UNSPECIFIED,
                    Vec::new(),
                    endpoint,
                )?);
            }
            Ok(clients)
        }
    }
}
