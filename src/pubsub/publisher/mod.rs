// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The publishing half of a connection. Each enabled writer group gets a task that samples its
//! data sets every publishing interval.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::pubsub::{
    connection::PubSubConnection,
    core::{DataCollector, WriterGroup, WriterGroupPublishState},
    transport::NetworkMessageSink,
    uadp::{DiscoveryResponse, NetworkMessagePayload},
};

/// What a writer group remembers between publishing cycles.
#[derive(Debug)]
pub struct PublishCycleState {
    pub publish_state: WriterGroupPublishState,
    /// When a data or keep alive message was last sent.
    last_sent: Instant,
    /// When metadata was last sent per writer, for periodic metadata updates.
    meta_data_sent: HashMap<u16, Instant>,
}

impl PublishCycleState {
    pub fn new(now: Instant) -> Self {
        Self {
            publish_state: WriterGroupPublishState::new(),
            last_sent: now,
            meta_data_sent: HashMap::new(),
        }
    }
}

pub struct WriterGroupPublisher {
    connection: Arc<PubSubConnection>,
    writer_group: WriterGroup,
    sink: Arc<dyn NetworkMessageSink>,
    collector: Arc<dyn DataCollector>,
    cancel: CancellationToken,
}

fn millis(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_micros((ms * 1000.0) as u64)
    } else {
        Duration::ZERO
    }
}

impl WriterGroupPublisher {
    pub fn new(
        connection: Arc<PubSubConnection>,
        writer_group: WriterGroup,
        sink: Arc<dyn NetworkMessageSink>,
        collector: Arc<dyn DataCollector>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            connection,
            writer_group,
            sink,
            collector,
            cancel,
        }
    }

    /// Spawns the publishing task. It stops when the cancellation token fires.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let publishing_interval = millis(self.writer_group.publishing_interval);
        if publishing_interval.is_zero() {
            error!(
                "Writer group {} has no usable publishing interval",
                self.writer_group.name
            );
            return;
        }
        let component_name = format!(
            "WriterGroupPublisher {}/{}",
            self.connection.name(),
            self.writer_group.name
        );
        register_runtime_component!(&component_name);
        debug!(
            "Writer group {} publishes every {:?}",
            self.writer_group.name, publishing_interval
        );

        let mut timer = interval_at(Instant::now(), publishing_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut state = PublishCycleState::new(Instant::now());
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = timer.tick() => {
                    self.publish_cycle(&mut state, Instant::now());
                }
            }
        }
        deregister_runtime_component!(&component_name);
    }

    /// Runs one publishing cycle and returns the number of NetworkMessages sent. Sends metadata
    /// that is new, changed or due for its periodic update, then the data. If there was no data
    /// and nothing was sent for the keep alive time a keep alive goes out instead.
    pub fn publish_cycle(&self, state: &mut PublishCycleState, now: Instant) -> usize {
        let messages = self.connection.create_network_messages(
            &self.writer_group,
            &mut state.publish_state,
            self.collector.as_ref(),
        );

        let mut sent = 0;
        let mut data_sent = false;
        for message in &messages {
            match message.payload {
                NetworkMessagePayload::DiscoveryResponse(DiscoveryResponse::DataSetMetaData {
                    data_set_writer_id,
                    ..
                }) => {
                    state.meta_data_sent.insert(data_set_writer_id, now);
                }
                NetworkMessagePayload::DataSetMessages(_) => data_sent = true,
                _ => {}
            }
            if self.sink.publish_network_message(message) {
                sent += 1;
            }
        }

        let due_meta_data = self
            .writer_group
            .enabled_writers()
            .filter(|w| w.meta_data_update_time > 0)
            .filter(|w| match state.meta_data_sent.get(&w.data_set_writer_id) {
                Some(last) => {
                    now.duration_since(*last) >= Duration::from_millis(w.meta_data_update_time)
                }
                None => true,
            })
            .map(|w| w.data_set_writer_id)
            .collect::<Vec<_>>();
        if !due_meta_data.is_empty() {
            for message in self
                .connection
                .create_data_set_meta_data_network_messages(&due_meta_data, self.collector.as_ref())
            {
                if self.sink.publish_network_message(&message) {
                    sent += 1;
                }
            }
            for id in due_meta_data {
                state.meta_data_sent.insert(id, now);
            }
        }

        if data_sent {
            state.last_sent = now;
        } else {
            let keep_alive_time = millis(self.writer_group.keep_alive_time);
            if !keep_alive_time.is_zero() && now.duration_since(state.last_sent) >= keep_alive_time
            {
                if let Some(message) = self
                    .connection
                    .create_keep_alive_network_message(&self.writer_group)
                {
                    trace!("Writer group {} sends a keep alive", self.writer_group.name);
                    if self.sink.publish_network_message(&message) {
                        sent += 1;
                    }
                    state.last_sent = now;
                }
            }
        }
        sent
    }
}
