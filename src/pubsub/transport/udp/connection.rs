// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    sync::mpsc::{self, UnboundedReceiver},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    pubsub::{
        connection::PubSubConnection,
        discovery::{UdpDiscoveryPublisher, UdpDiscoverySubscriber},
        publisher::WriterGroupPublisher,
        subscriber::MessageDispatcher,
        transport::{ConnectionContext, NetworkMessageSink, PubSubTransport},
        uadp::UadpNetworkMessage,
    },
    sync::*,
    types::StatusCode,
};

use super::{
    client::{get_udp_clients, UdpClient, UdpClientRole},
    endpoint::get_endpoint,
};

/// Largest UDP payload
const RECEIVE_BUFFER_SIZE: usize = 65_535;
/// Pause before trying again when a socket could not be renewed
const RENEW_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Sends data messages to the connection address and discovery messages to the discovery
/// address. Discovery messages go to the connection address when discovery is off.
#[derive(Debug, Default)]
pub struct UdpSender {
    data_clients: RwLock<Vec<Arc<UdpClient>>>,
    discovery_clients: RwLock<Vec<Arc<UdpClient>>>,
}

impl UdpSender {
    fn set_clients(&self, data_clients: Vec<Arc<UdpClient>>, discovery_clients: Vec<Arc<UdpClient>>) {
        *trace_write_lock!(self.data_clients) = data_clients;
        *trace_write_lock!(self.discovery_clients) = discovery_clients;
    }

    fn clear(&self) {
        self.set_clients(Vec::new(), Vec::new());
    }
}

impl NetworkMessageSink for UdpSender {
    fn send(&self, message: &UadpNetworkMessage, bytes: &[u8]) -> bool {
        let discovery_clients = trace_read_lock!(self.discovery_clients);
        let clients = if message.is_discovery() && !discovery_clients.is_empty() {
            discovery_clients
        } else {
            drop(discovery_clients);
            trace_read_lock!(self.data_clients)
        };
        if clients.is_empty() {
            trace!("No socket to send a {:?} message on", message.message_type());
            return false;
        }
        // Every socket is tried, one is enough for success
        clients
            .iter()
            .fold(false, |sent, client| client.send(bytes) || sent)
    }
}

struct RunningState {
    cancel: CancellationToken,
    discovery_publisher: Option<Arc<UdpDiscoveryPublisher>>,
    discovery_subscriber: Option<Arc<UdpDiscoverySubscriber>>,
    receive_addresses: Vec<SocketAddr>,
    tasks: Vec<JoinHandle<()>>,
}

/// A connection over UDP with the `pubsub-udp-uadp` transport profile.
pub struct UdpPubSubConnection {
    connection: Arc<PubSubConnection>,
    context: ConnectionContext,
    sender: Arc<UdpSender>,
    state: Mutex<Option<RunningState>>,
}

impl UdpPubSubConnection {
    pub fn new(connection: Arc<PubSubConnection>, context: ConnectionContext) -> Self {
        Self {
            connection,
            context,
            sender: Arc::new(UdpSender::default()),
            state: Mutex::new(None),
        }
    }

    /// Local addresses the connection receives data on.
    pub fn receive_addresses(&self) -> Vec<SocketAddr> {
        trace_lock!(self.state)
            .as_ref()
            .map(|s| s.receive_addresses.clone())
            .unwrap_or_default()
    }

    fn clients(
        &self,
        role: UdpClientRole,
        endpoint: SocketAddr,
    ) -> Result<Vec<Arc<UdpClient>>, StatusCode> {
        let network_interface = self.connection.config().address.network_interface.as_deref();
        get_udp_clients(role, network_interface, endpoint)
            .map(|clients| clients.into_iter().map(Arc::new).collect())
            .map_err(|err| {
                error!(
                    "Connection {} cannot open {:?} socket for {}, error = {}",
                    self.connection.name(),
                    role,
                    endpoint,
                    err
                );
                StatusCode::BadCommunicationError
            })
    }

    fn spawn_receive_loop(
        &self,
        client: Arc<UdpClient>,
        dispatch_tx: mpsc::UnboundedSender<Vec<u8>>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let component_name = format!(
            "UdpReceiveLoop {} {}",
            self.connection.name(),
            client.endpoint()
        );
        tokio::spawn(async move {
            register_runtime_component!(&component_name);
            let mut buffer = vec![0u8; RECEIVE_BUFFER_SIZE];
            loop {
                let socket = client.socket();
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = socket.recv_from(&mut buffer) => match result {
                        Ok((size, from)) => {
                            trace!("Received {} bytes from {}", size, from);
                            if dispatch_tx.send(buffer[..size].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            warn!("Receive from {} failed, error = {}", client.endpoint(), err);
                            if let Err(err) = client.renew() {
                                error!("Cannot renew socket for {}, error = {}", client.endpoint(), err);
                                tokio::select! {
                                    _ = cancel.cancelled() => break,
                                    _ = tokio::time::sleep(RENEW_RETRY_DELAY) => {}
                                }
                            }
                        }
                    }
                }
            }
            deregister_runtime_component!(&component_name);
        })
    }

    fn spawn_dispatch_worker(
        dispatcher: Arc<MessageDispatcher>,
        mut dispatch_rx: UnboundedReceiver<Vec<u8>>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    data = dispatch_rx.recv() => match data {
                        Some(data) => dispatcher.dispatch(&data),
                        None => break,
                    }
                }
            }
        })
    }
}

impl NetworkMessageSink for UdpPubSubConnection {
    fn send(&self, message: &UadpNetworkMessage, bytes: &[u8]) -> bool {
        self.sender.send(message, bytes)
    }
}

impl PubSubTransport for UdpPubSubConnection {
    fn connection(&self) -> &Arc<PubSubConnection> {
        &self.connection
    }

    fn start(&self) -> Result<(), StatusCode> {
        let mut state = trace_lock!(self.state);
        if state.is_some() {
            return Ok(());
        }
        let config = self.connection.config();
        let endpoint = get_endpoint(&config.address.url).ok_or_else(|| {
            error!(
                "Connection {} has an invalid address {}",
                config.name, config.address.url
            );
            StatusCode::BadTcpEndpointUrlInvalid
        })?;
        let has_writers = self.connection.has_writers();
        let has_readers = self.connection.has_readers();

        let data_clients = if has_writers {
            self.clients(UdpClientRole::Publisher, endpoint)?
        } else {
            Vec::new()
        };
        let receive_clients = if has_readers {
            self.clients(UdpClientRole::Subscriber, endpoint)?
        } else {
            Vec::new()
        };
        let discovery_clients = if config.discovery.enabled && (has_writers || has_readers) {
            let discovery_endpoint = get_endpoint(&config.discovery.url).ok_or_else(|| {
                error!(
                    "Connection {} has an invalid discovery address {}",
                    config.name, config.discovery.url
                );
                StatusCode::BadTcpEndpointUrlInvalid
            })?;
            self.clients(UdpClientRole::Subscriber, discovery_endpoint)?
        } else {
            Vec::new()
        };
        self.sender
            .set_clients(data_clients, discovery_clients.clone());
        let sink: Arc<dyn NetworkMessageSink> = self.sender.clone();

        let cancel = CancellationToken::new();
        let discovery_enabled = !discovery_clients.is_empty();
        let discovery_publisher = if discovery_enabled && has_writers {
            Some(Arc::new(UdpDiscoveryPublisher::new(
                self.connection.clone(),
                sink.clone(),
                self.context.clone(),
            )))
        } else {
            None
        };
        let discovery_subscriber = if discovery_enabled && has_readers {
            Some(Arc::new(UdpDiscoverySubscriber::new(
                self.connection.clone(),
                sink.clone(),
            )))
        } else {
            None
        };

        let dispatcher = Arc::new(
            MessageDispatcher::new(
                self.connection.clone(),
                self.context.data_store.clone(),
                self.context.events.clone(),
            )
            .with_discovery(discovery_publisher.clone(), discovery_subscriber.clone()),
        );

        let mut tasks = Vec::new();
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        tasks.push(Self::spawn_dispatch_worker(
            dispatcher,
            dispatch_rx,
            cancel.clone(),
        ));
        let receive_addresses = receive_clients
            .iter()
            .filter_map(|c| c.local_addr().ok())
            .collect::<Vec<_>>();
        for client in receive_clients.into_iter().chain(discovery_clients) {
            tasks.push(self.spawn_receive_loop(client, dispatch_tx.clone(), cancel.clone()));
        }

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
        if let Some(ref discovery_subscriber) = discovery_subscriber {
            tasks.push(discovery_subscriber.start());
        }

        info!(
            "Connection {} started on {}, {} tasks",
            config.name,
            config.address.url,
            tasks.len()
        );
        *state = Some(RunningState {
            cancel,
            discovery_publisher,
            discovery_subscriber,
            receive_addresses,
            tasks,
        });
        Ok(())
    }

    fn stop(&self) {
        let state = trace_lock!(self.state).take();
        if let Some(state) = state {
            state.cancel.cancel();
            if let Some(discovery_publisher) = state.discovery_publisher {
                discovery_publisher.stop();
            }
            if let Some(discovery_subscriber) = state.discovery_subscriber {
                discovery_subscriber.stop();
            }
            for task in state.tasks {
                task.abort();
            }
            self.sender.clear();
            info!("Connection {} stopped", self.connection.name());
        }
    }

    fn is_running(&self) -> bool {
        trace_lock!(self.state).is_some()
    }

    /// Present while running if the connection has readers and discovery is on.
    fn discovery_subscriber(&self) -> Option<Arc<UdpDiscoverySubscriber>> {
        trace_lock!(self.state)
            .as_ref()
            .and_then(|s| s.discovery_subscriber.clone())
    }
}
