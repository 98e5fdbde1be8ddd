// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The requesting side of UADP discovery. Pending requests are repeated with an interval that
//! doubles after every send until the answer arrives.

use std::{cmp, collections::BTreeSet, sync::Arc, time::Duration};

use tokio::{
    sync::Notify,
    task::JoinHandle,
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;

use crate::{
    pubsub::{
        connection::PubSubConnection, transport::NetworkMessageSink,
        uadp::DiscoveryInformationType,
    },
    sync::*,
};

/// Interval of a request that has just become pending
pub const INITIAL_REQUEST_INTERVAL: Duration = Duration::from_millis(5_000);
/// Upper bound of the request interval
pub const MAX_REQUEST_INTERVAL: Duration = Duration::from_millis(300_000);

#[derive(Debug)]
struct Backoff {
    interval: Duration,
    due: Option<Instant>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            interval: INITIAL_REQUEST_INTERVAL,
            due: None,
        }
    }
}

impl Backoff {
    /// New work goes out straight away unless a send is already scheduled.
    fn schedule(&mut self, now: Instant) {
        if self.due.is_none() {
            self.due = Some(now);
        }
    }

    fn is_due(&self, now: Instant) -> bool {
        matches!(self.due, Some(due) if due <= now)
    }

    fn on_sent(&mut self, now: Instant) {
        self.interval = cmp::min(self.interval * 2, MAX_REQUEST_INTERVAL);
        self.due = Some(now + self.interval);
    }

    fn reset(&mut self) {
        *self = Backoff::default();
    }
}

#[derive(Debug, Default)]
struct PendingRequests {
    meta_data_ids: BTreeSet<u16>,
    meta_data: Backoff,
    endpoints: bool,
    endpoints_backoff: Backoff,
    writer_configuration_ids: BTreeSet<u16>,
    writer_configuration: Backoff,
}

impl PendingRequests {
    fn next_due(&self) -> Option<Instant> {
        [
            self.meta_data.due,
            self.endpoints_backoff.due,
            self.writer_configuration.due,
        ]
        .into_iter()
        .flatten()
        .min()
    }
}

pub struct UdpDiscoverySubscriber {
    connection: Arc<PubSubConnection>,
    sink: Arc<dyn NetworkMessageSink>,
    pending: Mutex<PendingRequests>,
    notify: Notify,
    cancel: CancellationToken,
}

impl UdpDiscoverySubscriber {
    pub fn new(connection: Arc<PubSubConnection>, sink: Arc<dyn NetworkMessageSink>) -> Self {
        Self {
            connection,
            sink,
            pending: Mutex::new(PendingRequests::default()),
            notify: Notify::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Queues a MetaData request for every reader without usable metadata and starts the task
    /// that sends requests.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let writer_ids = self.connection.writer_ids_without_meta_data();
        if !writer_ids.is_empty() {
            debug!(
                "Connection {} needs metadata for writers {:?}",
                self.connection.name(),
                writer_ids
            );
            self.request_meta_data(&writer_ids);
        }
        let subscriber = self.clone();
        tokio::spawn(async move { subscriber.run().await })
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    async fn run(&self) {
        let component_name = format!("UdpDiscoverySubscriber {}", self.connection.name());
        register_runtime_component!(&component_name);
        loop {
            let next_due = self.send_due_requests(Instant::now());
            let wake_at = next_due.unwrap_or_else(|| Instant::now() + MAX_REQUEST_INTERVAL);
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.notify.notified() => {}
                _ = time::sleep_until(wake_at) => {}
            }
        }
        deregister_runtime_component!(&component_name);
    }

    /// Sends every request that is due and returns when the next one will be.
    fn send_due_requests(&self, now: Instant) -> Option<Instant> {
        let mut requests = Vec::new();
        let next_due = {
            let mut pending = trace_lock!(self.pending);
            if pending.meta_data.is_due(now) {
                requests.push((
                    DiscoveryInformationType::DataSetMetaData,
                    pending.meta_data_ids.iter().copied().collect::<Vec<_>>(),
                ));
                pending.meta_data.on_sent(now);
            }
            if pending.endpoints_backoff.is_due(now) {
                requests.push((DiscoveryInformationType::PublisherEndpoints, Vec::new()));
                pending.endpoints_backoff.on_sent(now);
            }
            if pending.writer_configuration.is_due(now) {
                requests.push((
                    DiscoveryInformationType::DataSetWriterConfiguration,
                    pending
                        .writer_configuration_ids
                        .iter()
                        .copied()
                        .collect::<Vec<_>>(),
                ));
                pending.writer_configuration.on_sent(now);
            }
            pending.next_due()
        };

        for (information_type, writer_ids) in requests {
            debug!(
                "Sending {:?} discovery request for writers {:?}",
                information_type, writer_ids
            );
            let message = self
                .connection
                .create_discovery_request_message(information_type, writer_ids);
            if !self.sink.publish_network_message(&message) {
                warn!("{:?} discovery request was not sent", information_type);
            }
        }
        next_due
    }

    /// Asks publishers for the metadata of the writers.
    pub fn request_meta_data(&self, data_set_writer_ids: &[u16]) {
        if data_set_writer_ids.is_empty() {
            return;
        }
        {
            let mut pending = trace_lock!(self.pending);
            pending
                .meta_data_ids
                .extend(data_set_writer_ids.iter().copied());
            pending.meta_data.schedule(Instant::now());
        }
        self.notify.notify_one();
    }

    pub fn request_publisher_endpoints(&self) {
        {
            let mut pending = trace_lock!(self.pending);
            pending.endpoints = true;
            pending.endpoints_backoff.schedule(Instant::now());
        }
        self.notify.notify_one();
    }

    pub fn request_writer_configuration(&self, data_set_writer_ids: &[u16]) {
        if data_set_writer_ids.is_empty() {
            return;
        }
        {
            let mut pending = trace_lock!(self.pending);
            pending
                .writer_configuration_ids
                .extend(data_set_writer_ids.iter().copied());
            pending.writer_configuration.schedule(Instant::now());
        }
        self.notify.notify_one();
    }

    pub fn on_meta_data_received(&self, data_set_writer_id: u16) {
        let mut pending = trace_lock!(self.pending);
        if pending.meta_data_ids.remove(&data_set_writer_id) {
            debug!("Metadata request for writer {} answered", data_set_writer_id);
        }
        if pending.meta_data_ids.is_empty() {
            pending.meta_data.reset();
        }
    }

    pub fn on_publisher_endpoints_received(&self) {
        let mut pending = trace_lock!(self.pending);
        pending.endpoints = false;
        pending.endpoints_backoff.reset();
    }

    pub fn on_writer_configuration_received(&self, data_set_writer_ids: &[u16]) {
        let mut pending = trace_lock!(self.pending);
        for id in data_set_writer_ids {
            pending.writer_configuration_ids.remove(id);
        }
        if pending.writer_configuration_ids.is_empty() {
            pending.writer_configuration.reset();
        }
    }

    pub fn pending_meta_data_ids(&self) -> Vec<u16> {
        trace_lock!(self.pending)
            .meta_data_ids
            .iter()
            .copied()
            .collect()
    }

    pub fn meta_data_request_interval(&self) -> Duration {
        trace_lock!(self.pending).meta_data.interval
    }

    pub fn is_requesting_publisher_endpoints(&self) -> bool {
        trace_lock!(self.pending).endpoints
    }

    pub fn pending_writer_configuration_ids(&self) -> Vec<u16> {
        trace_lock!(self.pending)
            .writer_configuration_ids
            .iter()
            .copied()
            .collect()
    }
}
