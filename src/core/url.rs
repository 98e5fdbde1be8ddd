// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Parsing of the transport urls PubSub connections are addressed by.

use url::Url;

use crate::{core::constants, types::status_code::StatusCode};

pub const OPC_UDP_SCHEME: &str = "opc.udp";
pub const MQTT_SCHEME: &str = "mqtt";
pub const MQTTS_SCHEME: &str = "mqtts";

/// Parses a url, requiring it to have the given scheme and a host. The port is returned as-is,
/// i.e. `None` when the url does not supply one.
pub fn parse_url_with_scheme(url: &str, scheme: &str) -> Result<(String, Option<u16>), StatusCode> {
    let url = Url::parse(url).map_err(|err| {
        debug!("Cannot parse url \"{}\", error = {:?}", url, err);
        StatusCode::BadTcpEndpointUrlInvalid
    })?;
    if url.scheme() != scheme {
        debug!("Url {} does not have the expected scheme {}", url, scheme);
        return Err(StatusCode::BadTcpEndpointUrlInvalid);
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok((host.to_string(), url.port())),
        _ => Err(StatusCode::BadTcpEndpointUrlInvalid),
    }
}

/// Splits an `mqtt://` or `mqtts://` url into host and port, applying the default port for the
/// scheme. The boolean is true for the TLS scheme.
pub fn mqtt_host_port_from_url(url: &str) -> Result<(String, u16, bool), StatusCode> {
    if let Ok((host, port)) = parse_url_with_scheme(url, MQTT_SCHEME) {
        Ok((host, port.unwrap_or(constants::DEFAULT_MQTT_PORT), false))
    } else {
        let (host, port) = parse_url_with_scheme(url, MQTTS_SCHEME)?;
        Ok((host, port.unwrap_or(constants::DEFAULT_MQTTS_PORT), true))
    }
}

pub fn is_opc_udp_url(url: &str) -> bool {
    parse_url_with_scheme(url, OPC_UDP_SCHEME).is_ok()
}

pub fn is_mqtt_url(url: &str) -> bool {
    mqtt_host_port_from_url(url).is_ok()
}
