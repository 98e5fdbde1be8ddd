// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The top level of a PubSub application. It owns the configuration, the data store that
//! published values come from and received values go to, and the running connections.

use std::{path::Path, sync::Arc};

use tokio::sync::mpsc;

use crate::{
    core::config::Config,
    pubsub::{
        connection::PubSubConnection,
        core::{DataCollector, DataStore, DataStoreCollector, PubSubConfiguration},
        events::{PubSubEventReceiver, PubSubEventSender},
        transport::{
            mqtt::MqttPubSubConnection, udp::UdpPubSubConnection, ConnectionContext,
            EndpointsProvider, PubSubTransport,
        },
    },
    sync::*,
    types::StatusCode,
};

pub struct PubSubApplication {
    configuration: PubSubConfiguration,
    data_store: Arc<DataStore>,
    collector: Arc<DataStoreCollector>,
    events: PubSubEventSender,
    event_receiver: Mutex<Option<PubSubEventReceiver>>,
    endpoints_provider: RwLock<Option<EndpointsProvider>>,
    connections: RwLock<Vec<Arc<dyn PubSubTransport>>>,
}

impl PubSubApplication {
    /// Creates an application from a configuration. Fails if the configuration is invalid.
    pub fn new(configuration: PubSubConfiguration) -> Result<Self, StatusCode> {
        if !configuration.is_valid() {
            error!("PubSub configuration is invalid");
            return Err(StatusCode::BadConfigurationError);
        }
        let data_store = Arc::new(DataStore::new());
        let collector = Arc::new(DataStoreCollector::new(
            data_store.clone(),
            configuration.published_data_sets.clone(),
        ));
        let (events, event_receiver) = mpsc::unbounded_channel();
        Ok(Self {
            configuration,
            data_store,
            collector,
            events,
            event_receiver: Mutex::new(Some(event_receiver)),
            endpoints_provider: RwLock::new(None),
            connections: RwLock::new(Vec::new()),
        })
    }

    /// Creates an application from a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, StatusCode> {
        let configuration = PubSubConfiguration::load(path).map_err(|_| {
            error!("Cannot load PubSub configuration {}", path.display());
            StatusCode::BadConfigurationError
        })?;
        Self::new(configuration)
    }

    pub fn configuration(&self) -> &PubSubConfiguration {
        &self.configuration
    }

    /// The store published values are sampled from and received values are written to.
    pub fn data_store(&self) -> Arc<DataStore> {
        self.data_store.clone()
    }

    pub fn collector(&self) -> Arc<DataStoreCollector> {
        self.collector.clone()
    }

    /// The receiving end of the application's events. Can only be taken once.
    pub fn take_event_receiver(&self) -> Option<PubSubEventReceiver> {
        trace_lock!(self.event_receiver).take()
    }

    /// Sets what the application announces in PublisherEndpoints discovery responses. Applies to
    /// connections started afterwards.
    pub fn set_endpoints_provider(&self, endpoints_provider: EndpointsProvider) {
        *trace_write_lock!(self.endpoints_provider) = Some(endpoints_provider);
    }

    fn create_transport(&self, connection: PubSubConnection) -> Option<Arc<dyn PubSubTransport>> {
        let collector: Arc<dyn DataCollector> = self.collector.clone();
        let mut context = ConnectionContext::new(collector, self.data_store.clone());
        context.events = Some(self.events.clone());
        context.endpoints_provider = trace_read_lock!(self.endpoints_provider).clone();

        let connection = Arc::new(connection);
        if connection.config().is_udp() {
            Some(Arc::new(UdpPubSubConnection::new(connection, context)))
        } else if connection.config().is_mqtt() {
            Some(Arc::new(MqttPubSubConnection::new(connection, context)))
        } else {
            error!(
                "Connection {} has unsupported transport profile {}",
                connection.name(),
                connection.config().transport_profile_uri
            );
            None
        }
    }

    /// Starts every enabled connection. Must be called from within a tokio runtime. If any
    /// connection fails to start, those already started are stopped again.
    pub fn start(&self) -> Result<(), StatusCode> {
        let mut connections = trace_write_lock!(self.connections);
        if !connections.is_empty() {
            return Ok(());
        }
        if !self.configuration.enabled {
            info!("PubSub is disabled");
            return Ok(());
        }
        for config in self.configuration.connections.iter().filter(|c| c.enabled) {
            let transport = match self.create_transport(PubSubConnection::new(config.clone())) {
                Some(transport) => transport,
                None => continue,
            };
            if let Err(err) = transport.start() {
                error!("Connection {} failed to start, status = {}", config.name, err);
                connections.iter().for_each(|c| c.stop());
                connections.clear();
                return Err(err);
            }
            connections.push(transport);
        }
        info!("PubSub started {} connections", connections.len());
        Ok(())
    }

    pub fn stop(&self) {
        let connections = std::mem::take(&mut *trace_write_lock!(self.connections));
        for connection in connections {
            connection.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        trace_read_lock!(self.connections)
            .iter()
            .any(|c| c.is_running())
    }

    pub fn connections(&self) -> Vec<Arc<dyn PubSubTransport>> {
        trace_read_lock!(self.connections).clone()
    }

    pub fn find_connection(&self, name: &str) -> Option<Arc<dyn PubSubTransport>> {
        trace_read_lock!(self.connections)
            .iter()
            .find(|c| c.connection().name() == name)
            .cloned()
    }
}

impl Drop for PubSubApplication {
    fn drop(&mut self) {
        self.stop();
    }
}
