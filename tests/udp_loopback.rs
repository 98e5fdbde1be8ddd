use std::{net::UdpSocket, time::Duration};

use tokio::time::timeout;

use opcua_pubsub::prelude::*;

const WAIT: Duration = Duration::from_secs(10);

/// A port on the loopback interface that nothing listens on.
fn free_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

fn meta_data(major_version: u32, minor_version: u32) -> DataSetMetaData {
    DataSetMetaData::new(
        "Sensors",
        vec![
            FieldMetaData::new("Running", BuiltInType::Boolean),
            FieldMetaData::new("Speed", BuiltInType::Double),
            FieldMetaData::new("Label", BuiltInType::String),
        ],
        ConfigurationVersion::new(major_version, minor_version),
    )
}

fn source(i: u32) -> NodeId {
    NodeId::new(1, i)
}

fn target(i: u32) -> NodeId {
    NodeId::new(2, i)
}

fn publisher(url: &str) -> PubSubConnectionConfig {
    let mut config = PubSubConnectionConfig::new("Publisher", UDP_UADP_TRANSPORT_PROFILE, url);
    config.publisher_id = Some(PublisherId::UInt16(7));
    config.address.network_interface = Some("127.0.0.1".to_string());
    config.discovery.enabled = false;
    let mut writer_group = WriterGroup::new("Group", 1, 100.0);
    let mut writer = DataSetWriter::new("Writer", 10, "Sensors");
    writer.data_set_message_content_mask = UadpDataSetMessageContentMask::SEQUENCE_NUMBER
        | UadpDataSetMessageContentMask::MAJOR_VERSION
        | UadpDataSetMessageContentMask::MINOR_VERSION;
    writer.key_frame_count = 4;
    writer.meta_data_update_time = 500;
    writer_group.add_writer(writer);
    config.writer_groups.push(writer_group);
    config
}

fn subscriber(url: &str, reader_meta_data: DataSetMetaData) -> PubSubConnectionConfig {
    let mut config = PubSubConnectionConfig::new("Subscriber", UDP_UADP_TRANSPORT_PROFILE, url);
    config.discovery.enabled = false;
    let mut reader = DataSetReader::new(
        "Reader",
        Some(PublisherId::UInt16(7)),
        1,
        10,
        reader_meta_data,
    );
    reader.target_variables = (1..=3).map(target).collect();
    config
        .reader_groups
        .push(ReaderGroup::new("Readers", vec![reader]));
    config
}

fn application(connections: Vec<PubSubConnectionConfig>) -> PubSubApplication {
    let configuration = PubSubConfiguration {
        enabled: true,
        connections,
        published_data_sets: vec![PublishedDataSet::new(
            meta_data(1, 1),
            (1..=3).map(source).collect(),
        )],
    };
    let application = PubSubApplication::new(configuration).unwrap();
    let data_store = application.data_store();
    data_store.write_value(&source(1), DataValue::value_only(Variant::from(true)));
    data_store.write_value(&source(2), DataValue::value_only(Variant::from(12.5f64)));
    data_store.write_value(&source(3), DataValue::value_only(Variant::from("Line 1")));
    application
}

/// Waits for the first event the filter accepts.
async fn wait_for<F>(events: &mut PubSubEventReceiver, mut filter: F) -> PubSubEvent
where
    F: FnMut(&PubSubEvent) -> bool,
{
    timeout(WAIT, async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if filter(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for an event")
}

#[tokio::test]
async fn publish_and_subscribe_on_loopback() {
    let url = format!("opc.udp://127.0.0.1:{}", free_port());
    let application = application(vec![publisher(&url), subscriber(&url, meta_data(1, 1))]);
    let mut events = application.take_event_receiver().unwrap();
    application.start().unwrap();
    assert!(application.is_running());
    assert_eq!(application.connections().len(), 2);

    let event = wait_for(&mut events, |e| matches!(e, PubSubEvent::DataReceived { .. })).await;
    match event {
        PubSubEvent::DataReceived {
            connection_name,
            publisher_id,
            writer_group_id,
            data_set_writer_id,
            data_set,
            ..
        } => {
            assert_eq!(connection_name, "Subscriber");
            assert_eq!(publisher_id, Some(PublisherId::UInt16(7)));
            assert_eq!(writer_group_id, 1);
            assert_eq!(data_set_writer_id, 10);
            assert_eq!(
                data_set.field_by_name("Speed").unwrap().value.value,
                Some(Variant::from(12.5f64))
            );
        }
        _ => unreachable!(),
    }
    assert!(opcua_pubsub::runtime_components!()
        .iter()
        .any(|c| c == "WriterGroupPublisher Publisher/Group"));
    let stored = application.data_store().read_value(&target(3)).unwrap();
    assert_eq!(stored.value, Some(Variant::from("Line 1")));

    // A changed value arrives in a later message
    application
        .data_store()
        .write_value(&source(2), DataValue::value_only(Variant::from(99.0f64)));
    wait_for(&mut events, |e| match e {
        PubSubEvent::DataReceived { data_set, .. } => {
            data_set.field_by_name("Speed").and_then(|f| f.value.value.clone())
                == Some(Variant::from(99.0f64))
        }
        _ => false,
    })
    .await;
    assert_eq!(
        application.data_store().read_value(&target(2)).unwrap().value,
        Some(Variant::from(99.0f64))
    );

    application.stop();
    assert!(!application.is_running());
}

#[tokio::test]
async fn subscriber_learns_meta_data_from_publisher() {
    let url = format!("opc.udp://127.0.0.1:{}", free_port());
    // The reader starts out without usable metadata
    let application = application(vec![
        subscriber(&url, DataSetMetaData::default()),
        publisher(&url),
    ]);
    let mut events = application.take_event_receiver().unwrap();
    application.start().unwrap();

    let event = wait_for(&mut events, |e| matches!(e, PubSubEvent::MetaDataReceived { .. })).await;
    if let PubSubEvent::MetaDataReceived {
        data_set_writer_id,
        meta_data: received,
        ..
    } = event
    {
        assert_eq!(data_set_writer_id, 10);
        assert_eq!(received.configuration_version, ConfigurationVersion::new(1, 1));
    }
    wait_for(&mut events, |e| matches!(e, PubSubEvent::DataReceived { .. })).await;
    assert_eq!(
        application.data_store().read_value(&target(1)).unwrap().value,
        Some(Variant::from(true))
    );
    application.stop();
}
