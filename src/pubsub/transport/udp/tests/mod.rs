use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use super::*;

#[test]
fn endpoint_from_url() {
    let endpoint = get_endpoint("opc.udp://192.168.0.1:4840").unwrap();
    assert_eq!(endpoint.ip(), IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1)));
    assert_eq!(endpoint.port(), 4840);

    let endpoint = get_endpoint("opc.udp://224.0.2.14:4840").unwrap();
    assert_eq!(endpoint.ip(), IpAddr::V4(Ipv4Addr::new(224, 0, 2, 14)));

    let endpoint = get_endpoint("opc.udp://localhost:4841").unwrap();
    assert_eq!(endpoint.port(), 4841);
    assert!(endpoint.ip().is_loopback());
}

#[test]
fn endpoint_from_invalid_url() {
    // Malformed scheme
    assert!(get_endpoint("opc.udp:192.168.0.1:4840").is_none());
    assert!(get_endpoint("opc.tcp://192.168.0.1:4840").is_none());
    assert!(get_endpoint("192.168.0.1:4840").is_none());
    // Bad address
    assert!(get_endpoint("opc.udp://192.168.0.280:4840").is_none());
    // Bad or missing port
    assert!(get_endpoint("opc.udp://192.168.0.1:0").is_none());
    assert!(get_endpoint("opc.udp://192.168.0.1").is_none());
    assert!(get_endpoint("opc.udp://192.168.0.1:70000").is_none());
    assert!(get_endpoint("").is_none());
}

#[test]
fn address_type() {
    let classify = |ip: [u8; 4]| {
        UdpAddressType::classify(&SocketAddr::new(IpAddr::V4(Ipv4Addr::from(ip)), 4840))
    };
    assert_eq!(classify([192, 168, 0, 1]), UdpAddressType::Unicast);
    assert_eq!(classify([127, 0, 0, 1]), UdpAddressType::Unicast);
    assert_eq!(classify([224, 0, 2, 14]), UdpAddressType::Multicast);
    assert_eq!(classify([239, 0, 0, 1]), UdpAddressType::Multicast);
    assert_eq!(classify([255, 255, 255, 255]), UdpAddressType::Broadcast);
    assert_eq!(classify([192, 168, 0, 255]), UdpAddressType::Broadcast);
}

#[test]
fn resolve_interface_by_address() {
    assert_eq!(
        client::resolve_interface("127.0.0.1"),
        Some(Ipv4Addr::LOCALHOST)
    );
    assert_eq!(client::resolve_interface("no-such-interface-0"), None);
}

#[tokio::test]
async fn unicast_clients_exchange_datagrams() {
    // Port 0 is rejected in urls but a socket can still be bound to an ephemeral port
    let subscriber = UdpClient::new(
        UdpClientRole::Subscriber,
        Ipv4Addr::UNSPECIFIED,
        Vec::new(),
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
    )
    .unwrap();
    let address = subscriber.local_addr().unwrap();
    assert_eq!(subscriber.address_type(), UdpAddressType::Unicast);

    let clients = get_udp_clients(UdpClientRole::Publisher, None, address).unwrap();
    assert_eq!(clients.len(), 1);
    let publisher = &clients[0];
    assert_eq!(publisher.role(), UdpClientRole::Publisher);
    assert!(publisher.send(&[1, 2, 3]));

    let mut buffer = [0u8; 16];
    let (size, _) = subscriber.socket().recv_from(&mut buffer).await.unwrap();
    assert_eq!(&buffer[..size], &[1, 2, 3]);

    // A renewed publisher socket still reaches the subscriber
    publisher.renew().unwrap();
    assert!(publisher.send(&[4]));
    let (size, _) = subscriber.socket().recv_from(&mut buffer).await.unwrap();
    assert_eq!(&buffer[..size], &[4]);
}

#[tokio::test]
async fn unknown_interface_is_an_error() {
    let endpoint = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 4840);
    assert!(get_udp_clients(
        UdpClientRole::Publisher,
        Some("no-such-interface-0"),
        endpoint
    )
    .is_err());
}
