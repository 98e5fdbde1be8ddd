// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The answering side of UADP discovery. Requests arriving close together are collected and
//! answered once after a short delay.

use std::{collections::BTreeSet, mem, sync::Arc, time::Duration};

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::{
    pubsub::{
        connection::PubSubConnection,
        transport::{ConnectionContext, NetworkMessageSink},
        uadp::{DiscoveryInformationType, DiscoveryRequest},
    },
    sync::*,
};

/// Time between the first request and the responses to everything requested in the meantime
pub const RESPONSE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
struct PendingResponses {
    meta_data_ids: BTreeSet<u16>,
    writer_configuration_ids: BTreeSet<u16>,
    endpoints: bool,
    scheduled: bool,
}

impl PendingResponses {
    fn is_empty(&self) -> bool {
        self.meta_data_ids.is_empty() && self.writer_configuration_ids.is_empty() && !self.endpoints
    }
}

pub struct UdpDiscoveryPublisher {
    connection: Arc<PubSubConnection>,
    sink: Arc<dyn NetworkMessageSink>,
    context: ConnectionContext,
    pending: Mutex<PendingResponses>,
    cancel: CancellationToken,
}

impl UdpDiscoveryPublisher {
    pub fn new(
        connection: Arc<PubSubConnection>,
        sink: Arc<dyn NetworkMessageSink>,
        context: ConnectionContext,
    ) -> Self {
        Self {
            connection,
            sink,
            context,
            pending: Mutex::new(PendingResponses::default()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Records what a request asks for and schedules the responses. A publisher without writers
    /// has nothing to answer.
    pub fn on_request(self: &Arc<Self>, request: &DiscoveryRequest) {
        if !self.connection.has_writers() {
            trace!(
                "Connection {} ignores discovery request, it has no writers",
                self.connection.name()
            );
            return;
        }
        let schedule = {
            let mut pending = trace_lock!(self.pending);
            match request.information_type {
                DiscoveryInformationType::PublisherEndpoints => pending.endpoints = true,
                DiscoveryInformationType::DataSetMetaData => pending
                    .meta_data_ids
                    .extend(request.data_set_writer_ids.iter().copied()),
                DiscoveryInformationType::DataSetWriterConfiguration => pending
                    .writer_configuration_ids
                    .extend(request.data_set_writer_ids.iter().copied()),
            }
            if pending.scheduled || pending.is_empty() {
                false
            } else {
                pending.scheduled = true;
                true
            }
        };
        if schedule {
            let publisher = self.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = publisher.cancel.cancelled() => {}
                    _ = time::sleep(RESPONSE_DELAY) => publisher.send_pending_responses(),
                }
            });
        }
    }

    /// Sends a response for everything requested since the last call.
    pub fn send_pending_responses(&self) {
        let pending = mem::take(&mut *trace_lock!(self.pending));
        if pending.is_empty() {
            return;
        }
        let mut messages = Vec::new();
        if pending.endpoints {
            messages.extend(
                self.connection
                    .create_publisher_endpoints_network_message(self.context.endpoints()),
            );
        }
        if !pending.meta_data_ids.is_empty() {
            let ids = pending.meta_data_ids.into_iter().collect::<Vec<_>>();
            messages.extend(
                self.connection
                    .create_data_set_meta_data_network_messages(&ids, self.context.collector.as_ref()),
            );
        }
        if !pending.writer_configuration_ids.is_empty() {
            let ids = pending
                .writer_configuration_ids
                .into_iter()
                .collect::<Vec<_>>();
            messages.extend(
                self.connection
                    .create_data_set_writer_configuration_network_messages(&ids),
            );
        }
        debug!(
            "Connection {} sends {} discovery responses",
            self.connection.name(),
            messages.len()
        );
        for message in &messages {
            if !self.sink.publish_network_message(message) {
                warn!("Discovery response was not sent");
            }
        }
    }
}
