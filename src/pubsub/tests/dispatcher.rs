use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;

use crate::{
    pubsub::{
        connection::PubSubConnection,
        core::*,
        discovery::{UdpDiscoveryPublisher, UdpDiscoverySubscriber},
        events::{PubSubEvent, PubSubEventReceiver},
        subscriber::MessageDispatcher,
        tests::*,
        transport::ConnectionContext,
        uadp::{
            DataSetFieldContentMask, DiscoveryInformationType, DiscoveryResponse,
            NetworkMessagePayload, UadpDataSetMessageContentMask, UadpNetworkMessage,
        },
    },
    types::*,
};

fn targets() -> Vec<NodeId> {
    (1..=6).map(|i| NodeId::new(2, i as u32)).collect()
}

/// Publishes writer 1 of group 100 with a key frame every third message.
struct TestPublisher {
    connection: PubSubConnection,
    data_store: Arc<DataStore>,
    collector: Arc<DataStoreCollector>,
    state: WriterGroupPublishState,
}

impl TestPublisher {
    fn new(meta_data: DataSetMetaData) -> Self {
        let mut writer = writer(
            1,
            DataSetFieldContentMask::empty(),
            UadpDataSetMessageContentMask::SEQUENCE_NUMBER
                | UadpDataSetMessageContentMask::MAJOR_VERSION
                | UadpDataSetMessageContentMask::MINOR_VERSION,
        );
        writer.key_frame_count = 3;
        let (data_store, collector) = collector(meta_data);
        Self {
            connection: PubSubConnection::new(publisher_config(vec![writer])),
            data_store,
            collector,
            state: WriterGroupPublishState::new(),
        }
    }

    /// One publishing interval, as encoded (metadata, data) messages.
    fn publish(&mut self) -> (Vec<Vec<u8>>, Vec<Vec<u8>>) {
        let writer_group = self.connection.config().writer_groups[0].clone();
        let messages = self.connection.create_network_messages(
            &writer_group,
            &mut self.state,
            self.collector.as_ref(),
        );
        let (meta_data, data): (Vec<_>, Vec<_>) =
            messages.into_iter().partition(|m| m.is_discovery());
        let encode = |messages: Vec<UadpNetworkMessage>| {
            messages
                .iter()
                .map(|m| m.encode_to_vec().unwrap())
                .collect::<Vec<_>>()
        };
        (encode(meta_data), encode(data))
    }

    fn set_value(&self, index: usize, value: Variant) {
        self.data_store
            .write_value(&published_variables()[index], DataValue::value_only(value));
    }
}

struct TestSubscriber {
    connection: Arc<PubSubConnection>,
    data_store: Arc<DataStore>,
    events: PubSubEventReceiver,
    discovery: Arc<UdpDiscoverySubscriber>,
    dispatcher: MessageDispatcher,
}

impl TestSubscriber {
    fn new(reader_meta_data: DataSetMetaData) -> Self {
        let mut reader = reader(Some(PublisherId::UInt16(1)), 100, 1, reader_meta_data);
        reader.target_variables = targets();
        let connection = Arc::new(PubSubConnection::new(subscriber_config(vec![reader])));
        let data_store = Arc::new(DataStore::new());
        let (sender, events) = mpsc::unbounded_channel();
        let discovery = Arc::new(UdpDiscoverySubscriber::new(
            connection.clone(),
            MemorySink::new(),
        ));
        let dispatcher = MessageDispatcher::new(connection.clone(), data_store.clone(), Some(sender))
            .with_discovery(None, Some(discovery.clone()));
        Self {
            connection,
            data_store,
            events,
            discovery,
            dispatcher,
        }
    }

    fn events(&mut self) -> Vec<PubSubEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    fn stored(&self, index: usize) -> Option<Variant> {
        self.data_store
            .read_value(&targets()[index])
            .and_then(|v| v.value)
    }
}

fn received_data_set(event: &PubSubEvent) -> &DataSet {
    match event {
        PubSubEvent::DataReceived {
            publisher_id,
            writer_group_id,
            data_set_writer_id,
            data_set,
            ..
        } => {
            assert_eq!(publisher_id, &Some(PublisherId::UInt16(1)));
            assert_eq!(*writer_group_id, 100);
            assert_eq!(*data_set_writer_id, 1);
            data_set
        }
        event => panic!("Expected data, got {:?}", event),
    }
}

#[tokio::test]
async fn key_frame_then_delta_frame() {
    let mut publisher = TestPublisher::new(meta_data(1, 1));
    let mut subscriber = TestSubscriber::new(meta_data(1, 1));

    let (_, data) = publisher.publish();
    subscriber.dispatcher.dispatch(&data[0]);
    let events = subscriber.events();
    assert_eq!(events.len(), 1);
    let data_set = received_data_set(&events[0]);
    assert_eq!(data_set.present_fields().count(), 6);
    assert_eq!(subscriber.stored(0), Some(Variant::from(true)));
    assert_eq!(subscriber.stored(1), Some(Variant::from(-42i32)));
    assert_eq!(subscriber.stored(3), Some(Variant::from("Hello")));

    publisher.set_value(1, Variant::from(-7i32));
    let (_, data) = publisher.publish();
    subscriber.dispatcher.dispatch(&data[0]);
    let events = subscriber.events();
    assert_eq!(events.len(), 1);
    // The delta is merged so a complete data set is delivered
    let data_set = received_data_set(&events[0]);
    assert!(!data_set.is_delta());
    assert_eq!(
        data_set.field_by_name("Int32").unwrap().value.value,
        Some(Variant::from(-7i32))
    );
    assert_eq!(
        data_set.field_by_name("BoolToggle").unwrap().value.value,
        Some(Variant::from(true))
    );
    assert_eq!(subscriber.stored(1), Some(Variant::from(-7i32)));
}

#[tokio::test]
async fn delta_frame_without_key_frame_is_dropped() {
    let mut publisher = TestPublisher::new(meta_data(1, 1));
    let mut subscriber = TestSubscriber::new(meta_data(1, 1));

    publisher.publish();
    publisher.set_value(2, Variant::from(0.25f64));
    let (_, data) = publisher.publish();
    subscriber.dispatcher.dispatch(&data[0]);
    assert!(subscriber.events().is_empty());
    assert_eq!(subscriber.stored(2), None);
}

#[tokio::test]
async fn major_version_change_requests_meta_data() {
    let mut publisher = TestPublisher::new(meta_data(2, 1));
    let mut subscriber = TestSubscriber::new(meta_data(1, 1));

    let (meta_data_messages, data) = publisher.publish();
    subscriber.dispatcher.dispatch(&data[0]);
    let events = subscriber.events();
    assert_eq!(
        events,
        vec![PubSubEvent::DataSetDecodeErrorOccurred {
            connection_name: "Subscriber".to_string(),
            publisher_id: Some(PublisherId::UInt16(1)),
            data_set_writer_id: 1,
            reason: DataSetDecodeErrorReason::MetadataMajorVersion,
        }]
    );
    assert_eq!(subscriber.discovery.pending_meta_data_ids(), vec![1]);
    assert_eq!(subscriber.stored(1), None);

    // The new metadata arrives, the reader takes it and decodes from then on
    subscriber.dispatcher.dispatch(&meta_data_messages[0]);
    match subscriber.events().as_slice() {
        [PubSubEvent::MetaDataReceived {
            data_set_writer_id,
            meta_data: received,
            ..
        }] => {
            assert_eq!(*data_set_writer_id, 1);
            assert_eq!(*received, meta_data(2, 1));
        }
        events => panic!("Unexpected events {:?}", events),
    }
    assert!(subscriber.discovery.pending_meta_data_ids().is_empty());
    assert_eq!(
        subscriber.connection.readers()[0].data_set_meta_data,
        meta_data(2, 1)
    );

    subscriber.dispatcher.dispatch(&data[0]);
    let events = subscriber.events();
    assert_eq!(events.len(), 1);
    received_data_set(&events[0]);
    assert_eq!(subscriber.stored(1), Some(Variant::from(-42i32)));
}

#[tokio::test]
async fn unusable_meta_data_waits_for_discovery() {
    let mut publisher = TestPublisher::new(meta_data(1, 1));
    let mut subscriber = TestSubscriber::new(meta_data(0, 0));

    let (meta_data_messages, data) = publisher.publish();
    subscriber.dispatcher.dispatch(&data[0]);
    assert!(matches!(
        subscriber.events().as_slice(),
        [PubSubEvent::DataSetDecodeErrorOccurred { .. }]
    ));

    subscriber.dispatcher.dispatch(&meta_data_messages[0]);
    subscriber.events();
    subscriber.dispatcher.dispatch(&data[0]);
    let events = subscriber.events();
    assert_eq!(events.len(), 1);
    assert_eq!(received_data_set(&events[0]).present_fields().count(), 6);
}

#[tokio::test]
async fn new_meta_data_discards_baseline() {
    let mut publisher = TestPublisher::new(meta_data(1, 1));
    let mut subscriber = TestSubscriber::new(meta_data(1, 1));

    let (_, data) = publisher.publish();
    subscriber.dispatcher.dispatch(&data[0]);
    subscriber.events();

    // A minor change still decodes but the old baseline no longer applies
    let response = DiscoveryResponse::DataSetMetaData {
        sequence_number: 1,
        data_set_writer_id: 1,
        meta_data: meta_data(1, 2),
        status_code: StatusCode::Good,
    };
    let message = UadpNetworkMessage::discovery_response(PublisherId::UInt16(1), response);
    subscriber
        .dispatcher
        .dispatch(&message.encode_to_vec().unwrap());
    subscriber.events();

    publisher.set_value(1, Variant::from(5i32));
    let (_, data) = publisher.publish();
    subscriber.dispatcher.dispatch(&data[0]);
    assert!(subscriber.events().is_empty());
    assert_eq!(subscriber.stored(1), Some(Variant::from(-42i32)));
}

#[tokio::test]
async fn bad_meta_data_response_is_ignored() {
    let mut subscriber = TestSubscriber::new(meta_data(0, 0));
    subscriber.discovery.request_meta_data(&[1]);
    let response = DiscoveryResponse::DataSetMetaData {
        sequence_number: 1,
        data_set_writer_id: 1,
        meta_data: DataSetMetaData::default(),
        status_code: StatusCode::BadNotFound,
    };
    let message = UadpNetworkMessage::discovery_response(PublisherId::UInt16(1), response);
    subscriber.dispatcher.dispatch_message(message);
    assert!(subscriber.events().is_empty());
    assert_eq!(subscriber.discovery.pending_meta_data_ids(), vec![1]);
    assert_eq!(
        subscriber.connection.readers()[0].data_set_meta_data,
        meta_data(0, 0)
    );
}

#[tokio::test]
async fn endpoint_and_configuration_responses() {
    let mut subscriber = TestSubscriber::new(meta_data(1, 1));
    subscriber.discovery.request_publisher_endpoints();
    subscriber.discovery.request_writer_configuration(&[1]);

    let endpoints = vec![EndpointDescription::new(
        "opc.tcp://localhost:4840",
        "http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary",
    )];
    subscriber
        .dispatcher
        .dispatch_message(UadpNetworkMessage::discovery_response(
            PublisherId::UInt16(1),
            DiscoveryResponse::PublisherEndpoints {
                sequence_number: 1,
                endpoints: endpoints.clone(),
                status_code: StatusCode::Good,
            },
        ));
    let mut writer_group = WriterGroup::new("Group", 100, 100.0);
    writer_group.add_writer(writer(
        1,
        DataSetFieldContentMask::empty(),
        UadpDataSetMessageContentMask::empty(),
    ));
    subscriber
        .dispatcher
        .dispatch_message(UadpNetworkMessage::discovery_response(
            PublisherId::UInt16(1),
            DiscoveryResponse::DataSetWriterConfiguration {
                sequence_number: 2,
                data_set_writer_ids: vec![1],
                writer_group: writer_group.clone(),
                status_codes: vec![StatusCode::Good],
            },
        ));

    assert!(!subscriber.discovery.is_requesting_publisher_endpoints());
    assert!(subscriber
        .discovery
        .pending_writer_configuration_ids()
        .is_empty());
    assert_eq!(
        subscriber.events(),
        vec![
            PubSubEvent::PublisherEndpointsReceived {
                connection_name: "Subscriber".to_string(),
                publisher_id: Some(PublisherId::UInt16(1)),
                endpoints,
                status_code: StatusCode::Good,
            },
            PubSubEvent::DataSetWriterConfigurationReceived {
                connection_name: "Subscriber".to_string(),
                publisher_id: Some(PublisherId::UInt16(1)),
                data_set_writer_ids: vec![1],
                writer_group,
                status_codes: vec![StatusCode::Good],
            },
        ]
    );
}

#[tokio::test]
async fn malformed_input_is_dropped() {
    let mut subscriber = TestSubscriber::new(meta_data(1, 1));
    subscriber.dispatcher.dispatch(&[]);
    subscriber.dispatcher.dispatch(&[0xff, 0x00]);
    subscriber.dispatcher.dispatch(&[0x81, 0x10, 0x00]);
    assert!(subscriber.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn requests_go_to_discovery_publisher() {
    let sink = MemorySink::new();
    let connection = Arc::new(PubSubConnection::new(publisher_config(vec![writer(
        1,
        DataSetFieldContentMask::empty(),
        UadpDataSetMessageContentMask::empty(),
    )])));
    let (data_store, collector) = collector(meta_data(1, 1));
    let context = ConnectionContext::new(collector, data_store.clone());
    let discovery_publisher = Arc::new(UdpDiscoveryPublisher::new(
        connection.clone(),
        sink.clone(),
        context,
    ));
    let dispatcher = MessageDispatcher::new(connection.clone(), data_store, None)
        .with_discovery(Some(discovery_publisher), None);

    let request = connection
        .create_discovery_request_message(DiscoveryInformationType::DataSetMetaData, vec![1]);
    dispatcher.dispatch(&request.encode_to_vec().unwrap());
    tokio::time::sleep(Duration::from_millis(600)).await;

    let sent = sink.messages();
    assert_eq!(sent.len(), 1);
    assert!(matches!(
        sent[0].payload,
        NetworkMessagePayload::DiscoveryResponse(DiscoveryResponse::DataSetMetaData {
            data_set_writer_id: 1,
            ..
        })
    ));
}
