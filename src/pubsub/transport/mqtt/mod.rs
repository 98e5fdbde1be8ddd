// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The `pubsub-mqtt-uadp` transport. UADP NetworkMessages are the payload of MQTT publishes, a
//! writer group publishes to its queue and a reader subscribes to its queue.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    core::url::mqtt_host_port_from_url,
    pubsub::{
        connection::PubSubConnection,
        core::BrokerTransportQualityOfService,
        publisher::WriterGroupPublisher,
        subscriber::MessageDispatcher,
        transport::{ConnectionContext, NetworkMessageSink, PubSubTransport},
        uadp::{DiscoveryResponse, NetworkMessagePayload, UadpNetworkMessage},
    },
    sync::*,
    types::StatusCode,
};

/// Capacity of the request channel between the client and its event loop
const CHANNEL_CAPACITY: usize = 1000;
/// Interval of MQTT pings
const KEEP_ALIVE: Duration = Duration::from_secs(5);
/// Pause before the event loop tries to reconnect
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// The queue of a connection whose groups and readers name none.
pub fn default_queue_name(connection_name: &str) -> String {
    format!("opcua-pubsub/{}", connection_name)
}

pub(crate) fn qos(qos: BrokerTransportQualityOfService) -> QoS {
    match qos {
        BrokerTransportQualityOfService::AtLeastOnce => QoS::AtLeastOnce,
        BrokerTransportQualityOfService::AtMostOnce => QoS::AtMostOnce,
        BrokerTransportQualityOfService::ExactlyOnce => QoS::ExactlyOnce,
        // Default the rest like so
        BrokerTransportQualityOfService::BestEffort
        | BrokerTransportQualityOfService::NotSpecified => QoS::AtLeastOnce,
    }
}

/// Publishes NetworkMessages through the broker client of a connection.
pub struct MqttSender {
    connection: Arc<PubSubConnection>,
    client: RwLock<Option<AsyncClient>>,
}

impl MqttSender {
    fn new(connection: Arc<PubSubConnection>) -> Self {
        Self {
            connection,
            client: RwLock::new(None),
        }
    }

    /// The queue and quality of service a message goes out with. Data goes to the queue of its
    /// writer group and metadata to the queue of the group owning the writer, so readers find both
    /// on the queue they subscribe to. Everything else goes to the connection's default queue.
    pub fn destination(&self, message: &UadpNetworkMessage) -> (String, QoS) {
        let mut writer_groups = self.connection.enabled_writer_groups();
        let writer_group = match message.payload {
            NetworkMessagePayload::DataSetMessages(_) => {
                writer_groups.find(|g| g.writer_group_id == message.writer_group_id)
            }
            NetworkMessagePayload::DiscoveryResponse(DiscoveryResponse::DataSetMetaData {
                data_set_writer_id,
                ..
            }) => writer_groups.find(|g| g.find_writer(data_set_writer_id).is_some()),
            _ => None,
        };
        match writer_group {
            Some(writer_group) => (
                writer_group
                    .queue_name
                    .clone()
                    .unwrap_or_else(|| default_queue_name(self.connection.name())),
                qos(writer_group.qos),
            ),
            None => (
                default_queue_name(self.connection.name()),
                QoS::AtLeastOnce,
            ),
        }
    }
}

impl NetworkMessageSink for MqttSender {
    fn send(&self, message: &UadpNetworkMessage, bytes: &[u8]) -> bool {
        let client = trace_read_lock!(self.client);
        let client = match client.as_ref() {
            Some(client) => client,
            None => {
                trace!("MQTT client of {} is not connected", self.connection.name());
                return false;
            }
        };
        let (topic, qos) = self.destination(message);
        match client.try_publish(topic.as_str(), qos, false, bytes.to_vec()) {
            Ok(()) => true,
            Err(err) => {
                warn!("Cannot publish to {}, error = {}", topic, err);
                false
            }
        }
    }
}

struct RunningState {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// A connection through an MQTT broker.
pub struct MqttPubSubConnection {
    connection: Arc<PubSubConnection>,
    context: ConnectionContext,
    sender: Arc<MqttSender>,
    state: Mutex<Option<RunningState>>,
}

impl MqttPubSubConnection {
    pub fn new(connection: Arc<PubSubConnection>, context: ConnectionContext) -> Self {
        Self {
            sender: Arc::new(MqttSender::new(connection.clone())),
            connection,
            context,
            state: Mutex::new(None),
        }
    }

    /// The queues the readers of the connection listen to.
    pub fn subscribed_queues(&self) -> BTreeSet<String> {
        self.connection
            .readers()
            .into_iter()
            .map(|r| {
                r.queue_name
                    .unwrap_or_else(|| default_queue_name(self.connection.name()))
            })
            .collect()
    }

    fn mqtt_options(&self) -> Result<MqttOptions, StatusCode> {
        let config = self.connection.config();
        let (host, port, tls) = mqtt_host_port_from_url(&config.address.url).map_err(|err| {
            error!(
                "Connection {} has an invalid broker address {}",
                config.name, config.address.url
            );
            err
        })?;
        let client_id = format!("opcua-pubsub-{}", uuid::Uuid::new_v4().simple());
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(KEEP_ALIVE);
        if tls {
            options.set_transport(Transport::tls_with_default_config());
        }
        Ok(options)
    }

    fn spawn_event_loop(
        &self,
        client: AsyncClient,
        mut event_loop: EventLoop,
        dispatcher: Arc<MessageDispatcher>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let queues = self.subscribed_queues();
        let component_name = format!("MqttEventLoop {}", self.connection.name());
        tokio::spawn(async move {
            register_runtime_component!(&component_name);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = event_loop.poll() => match event {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            // Subscriptions do not survive a reconnect with a clean session
                            for queue in &queues {
                                debug!("Subscribing to {}", queue);
                                if let Err(err) = client.try_subscribe(queue.as_str(), QoS::AtLeastOnce) {
                                    error!("Cannot subscribe to {}, error = {}", queue, err);
                                }
                            }
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            trace!("Received {} bytes on {}", publish.payload.len(), publish.topic);
                            dispatcher.dispatch(&publish.payload);
                        }
                        Ok(_) => {}
                        Err(err) => {
                            warn!("MQTT connection error {}", err);
                            tokio::select! {
                                _ = cancel.cancelled() => break,
                                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                            }
                        }
                    }
                }
            }
            deregister_runtime_component!(&component_name);
        })
    }
}

impl NetworkMessageSink for MqttPubSubConnection {
    fn send(&self, message: &UadpNetworkMessage, bytes: &[u8]) -> bool {
        self.sender.send(message, bytes)
    }
}

impl PubSubTransport for MqttPubSubConnection {
    fn connection(&self) -> &Arc<PubSubConnection> {
        &self.connection
    }

    fn start(&self) -> Result<(), StatusCode> {
        let mut state = trace_lock!(self.state);
        if state.is_some() {
            return Ok(());
        }
        let options = self.mqtt_options()?;
        let (client, event_loop) = AsyncClient::new(options, CHANNEL_CAPACITY);
        *trace_write_lock!(self.sender.client) = Some(client.clone());

        let cancel = CancellationToken::new();
        let dispatcher = Arc::new(MessageDispatcher::new(
            self.connection.clone(),
            self.context.data_store.clone(),
            self.context.events.clone(),
        ));
        let mut tasks = vec![self.spawn_event_loop(client, event_loop, dispatcher, cancel.clone())];

        let sink: Arc<dyn NetworkMessageSink> = self.sender.clone();
        for writer_group in self.connection.enabled_writer_groups() {
            let publisher = WriterGroupPublisher::new(
                self.connection.clone(),
                writer_group.clone(),
                sink.clone(),
                self.context.collector.clone(),
                cancel.child_token(),
            );
            tasks.push(publisher.spawn());
        }
        info!(
            "Connection {} started on {}",
            self.connection.name(),
            self.connection.config().address.url
        );
        *state = Some(RunningState { cancel, tasks });
        Ok(())
    }

    fn stop(&self) {
        let state = trace_lock!(self.state).take();
        if let Some(state) = state {
            state.cancel.cancel();
            if let Some(client) = trace_write_lock!(self.sender.client).take() {
                let _ = client.try_disconnect();
            }
            for task in state.tasks {
                task.abort();
            }
            info!("Connection {} stopped", self.connection.name());
        }
    }

    fn is_running(&self) -> bool {
        trace_lock!(self.state).is_some()
    }
}
