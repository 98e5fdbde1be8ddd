// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Provides configuration of PubSub connections including serialization and deserialization from
//! file.

use std::collections::BTreeSet;

use crate::core::{
    config::Config,
    url::{is_mqtt_url, is_opc_udp_url},
};

use super::{
    data_set_reader::ReaderGroup, published_data_set::PublishedDataSet,
    publisher_id::PublisherId, writer_group::WriterGroup,
};

/// Transport profile for UADP over UDP
pub const UDP_UADP_TRANSPORT_PROFILE: &str =
    "http://opcfoundation.org/UA-Profile/Transport/pubsub-udp-uadp";
/// Transport profile for UADP over MQTT
pub const MQTT_UADP_TRANSPORT_PROFILE: &str =
    "http://opcfoundation.org/UA-Profile/Transport/pubsub-mqtt-uadp";

/// The well known UADP discovery multicast address
pub const DEFAULT_DISCOVERY_URL: &str = "opc.udp://224.0.2.14:4840";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkAddress {
    /// Name or address of the local interface to send from and join multicast groups on. None
    /// lets the operating system choose.
    pub network_interface: Option<String>,
    pub url: String,
}

impl NetworkAddress {
    pub fn new<T>(url: T) -> Self
    where
        T: Into<String>,
    {
        Self {
            network_interface: None,
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct DiscoveryConfig {
    #[derivative(Default(value = "true"))]
    pub enabled: bool,
    #[derivative(Default(value = "DEFAULT_DISCOVERY_URL.to_string()"))]
    pub url: String,
    #[derivative(Default(value = "1500"))]
    pub max_network_message_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct PubSubConnectionConfig {
    pub name: String,
    #[derivative(Default(value = "true"))]
    pub enabled: bool,
    pub publisher_id: Option<PublisherId>,
    #[derivative(Default(value = "UDP_UADP_TRANSPORT_PROFILE.to_string()"))]
    pub transport_profile_uri: String,
    pub address: NetworkAddress,
    /// Discovery only applies to UDP connections.
    pub discovery: DiscoveryConfig,
    pub writer_groups: Vec<WriterGroup>,
    pub reader_groups: Vec<ReaderGroup>,
}

impl PubSubConnectionConfig {
    pub fn new<T>(name: T, transport_profile_uri: &str, url: T) -> Self
    where
        T: Into<String>,
    {
        Self {
            name: name.into(),
            transport_profile_uri: transport_profile_uri.to_string(),
            address: NetworkAddress::new(url),
            ..Default::default()
        }
    }

    pub fn is_udp(&self) -> bool {
        self.transport_profile_uri == UDP_UADP_TRANSPORT_PROFILE
    }

    pub fn is_mqtt(&self) -> bool {
        self.transport_profile_uri == MQTT_UADP_TRANSPORT_PROFILE
    }

    pub fn is_valid(&self) -> bool {
        let mut valid = true;
        if self.is_udp() {
            if !is_opc_udp_url(&self.address.url) {
                error!(
                    "Connection {} has an invalid UDP url {}",
                    self.name, self.address.url
                );
                valid = false;
            }
            if self.discovery.enabled && !is_opc_udp_url(&self.discovery.url) {
                error!(
                    "Connection {} has an invalid discovery url {}",
                    self.name, self.discovery.url
                );
                valid = false;
            }
        } else if self.is_mqtt() {
            if !is_mqtt_url(&self.address.url) {
                error!(
                    "Connection {} has an invalid MQTT url {}",
                    self.name, self.address.url
                );
                valid = false;
            }
        } else {
            error!(
                "Connection {} has an unsupported transport profile {}",
                self.name, self.transport_profile_uri
            );
            valid = false;
        }
        if !self.writer_groups.is_empty() && self.publisher_id.is_none() {
            error!("Connection {} publishes but has no publisher id", self.name);
            valid = false;
        }

        let mut writer_ids = BTreeSet::new();
        for writer_group in &self.writer_groups {
            if !writer_group.is_valid() {
                valid = false;
            }
            for writer in &writer_group.data_set_writers {
                if !writer_ids.insert(writer.data_set_writer_id) {
                    error!(
                        "Connection {} has more than one writer with id {}",
                        self.name, writer.data_set_writer_id
                    );
                    valid = false;
                }
            }
        }
        valid
    }

    pub fn find_writer_group(&self, writer_group_id: u16) -> Option<&WriterGroup> {
        self.writer_groups
            .iter()
            .find(|g| g.writer_group_id == writer_group_id)
    }
}

/// All the PubSub configuration of an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct PubSubConfiguration {
    #[derivative(Default(value = "true"))]
    pub enabled: bool,
    pub connections: Vec<PubSubConnectionConfig>,
    pub published_data_sets: Vec<PublishedDataSet>,
}

impl Config for PubSubConfiguration {
    fn is_valid(&self) -> bool {
        let mut valid = true;
        for connection in &self.connections {
            if !connection.is_valid() {
                valid = false;
            }
            for writer in connection
                .writer_groups
                .iter()
                .flat_map(|g| g.data_set_writers.iter())
            {
                if self.find_published_data_set(&writer.data_set_name).is_none() {
                    error!(
                        "Writer {} refers to unknown published data set {}",
                        writer.name, writer.data_set_name
                    );
                    valid = false;
                }
            }
        }
        if !self.published_data_sets.iter().all(|p| p.is_valid()) {
            valid = false;
        }
        valid
    }
}

impl PubSubConfiguration {
    pub fn find_published_data_set(&self, name: &str) -> Option<&PublishedDataSet> {
        self.published_data_sets.iter().find(|p| p.name == name)
    }
}
