use crate::{
    pubsub::{
        connection::PubSubConnection,
        core::*,
        tests::*,
        uadp::{
            DataSetFieldContentMask, DataSetMessageType, DiscoveryInformationType,
            DiscoveryResponse, NetworkMessagePayload, UadpDataSetMessageContentMask,
            UadpNetworkMessage, UadpNetworkMessageContentMask,
        },
    },
    types::*,
};

fn two_writers() -> Vec<DataSetWriter> {
    vec![
        writer(
            1,
            DataSetFieldContentMask::empty(),
            UadpDataSetMessageContentMask::SEQUENCE_NUMBER,
        ),
        writer(
            2,
            DataSetFieldContentMask::RAW_DATA,
            UadpDataSetMessageContentMask::SEQUENCE_NUMBER,
        ),
    ]
}

fn values(data_set: &DataSet) -> Vec<Option<Variant>> {
    data_set
        .fields
        .iter()
        .map(|f| f.as_ref().and_then(|f| f.value.value.clone()))
        .collect()
}

fn expected_values() -> Vec<Option<Variant>> {
    field_values().into_iter().map(Some).collect()
}

#[test]
fn writer_group_messages_with_payload_header() {
    let connection = PubSubConnection::new(publisher_config(two_writers()));
    let writer_group = connection.config().writer_groups[0].clone();
    let (_, collector) = collector(meta_data(1, 1));
    let mut state = WriterGroupPublishState::new();

    let messages = connection.create_network_messages(&writer_group, &mut state, collector.as_ref());
    // Metadata of both writers, then their data in one message
    assert_eq!(messages.len(), 3);
    for (message, writer_id) in messages.iter().zip([1, 2]) {
        match message.payload {
            NetworkMessagePayload::DiscoveryResponse(DiscoveryResponse::DataSetMetaData {
                data_set_writer_id,
                ref meta_data,
                ..
            }) => {
                assert_eq!(data_set_writer_id, writer_id);
                assert_eq!(meta_data.configuration_version, ConfigurationVersion::new(1, 1));
            }
            ref payload => panic!("Expected metadata, got {:?}", payload),
        }
    }
    let data = &messages[2];
    assert_eq!(data.publisher_id, Some(PublisherId::UInt16(1)));
    assert_eq!(data.writer_group_id, 100);
    let data_set_messages = data.data_set_messages();
    assert_eq!(data_set_messages.len(), 2);
    for (message, writer_id) in data_set_messages.iter().zip([1, 2]) {
        assert_eq!(message.data_set_writer_id, writer_id);
        assert_eq!(message.message_type, DataSetMessageType::KeyFrame);
        assert_eq!(values(message.data_set.as_ref().unwrap()), expected_values());
    }

    // Metadata only goes out again when it changes
    let messages = connection.create_network_messages(&writer_group, &mut state, collector.as_ref());
    assert_eq!(messages.len(), 1);
    assert!(!messages[0].is_discovery());

    collector.set_meta_data(meta_data(1, 2));
    let messages = connection.create_network_messages(&writer_group, &mut state, collector.as_ref());
    assert_eq!(messages.len(), 3);
    assert!(messages[0].is_discovery() && messages[1].is_discovery());
}

#[test]
fn writer_group_messages_without_payload_header() {
    let mut config = publisher_config(two_writers());
    config.writer_groups[0].network_message_content_mask = UadpNetworkMessageContentMask::PUBLISHER_ID
        | UadpNetworkMessageContentMask::GROUP_HEADER
        | UadpNetworkMessageContentMask::WRITER_GROUP_ID
        | UadpNetworkMessageContentMask::SEQUENCE_NUMBER;
    let connection = PubSubConnection::new(config);
    let writer_group = connection.config().writer_groups[0].clone();
    let (_, collector) = collector(meta_data(1, 1));
    let mut state = WriterGroupPublishState::new();

    let messages = connection.create_network_messages(&writer_group, &mut state, collector.as_ref());
    let data = messages
        .iter()
        .filter(|m| !m.is_discovery())
        .collect::<Vec<_>>();
    // Each writer gets a message of its own
    assert_eq!(data.len(), 2);
    assert_eq!(data[0].data_set_messages()[0].data_set_writer_id, 1);
    assert_eq!(data[1].data_set_messages()[0].data_set_writer_id, 2);
    assert_eq!(data[1].sequence_number, data[0].sequence_number.wrapping_add(1));
    assert_eq!(
        data[1].data_set_messages()[0].sequence_number,
        data[0].data_set_messages()[0].sequence_number.wrapping_add(1)
    );
    for message in data {
        assert!(message.encode_to_vec().is_ok());
    }
}

#[test]
fn writer_of_unknown_data_set_is_skipped() {
    let mut writers = two_writers();
    writers[1].data_set_name = "Missing".to_string();
    let connection = PubSubConnection::new(publisher_config(writers));
    let writer_group = connection.config().writer_groups[0].clone();
    let (_, collector) = collector(meta_data(1, 1));
    let mut state = WriterGroupPublishState::new();

    let messages = connection.create_network_messages(&writer_group, &mut state, collector.as_ref());
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].data_set_messages().len(), 1);
    assert_eq!(messages[1].data_set_messages()[0].data_set_writer_id, 1);
}

#[test]
fn delta_frames_carry_changes() {
    let mut writers = two_writers();
    writers.truncate(1);
    writers[0].key_frame_count = 5;
    let connection = PubSubConnection::new(publisher_config(writers));
    let writer_group = connection.config().writer_groups[0].clone();
    let (data_store, collector) = collector(meta_data(1, 1));
    let mut state = WriterGroupPublishState::new();

    connection.create_network_messages(&writer_group, &mut state, collector.as_ref());
    // No change means nothing to send
    assert!(connection
        .create_network_messages(&writer_group, &mut state, collector.as_ref())
        .is_empty());

    data_store.write_value(&published_variables()[2], DataValue::value_only(Variant::from(9.5f64)));
    let messages = connection.create_network_messages(&writer_group, &mut state, collector.as_ref());
    assert_eq!(messages.len(), 1);
    let message = &messages[0].data_set_messages()[0];
    assert_eq!(message.message_type, DataSetMessageType::DeltaFrame);
    let data_set = message.data_set.as_ref().unwrap();
    assert_eq!(data_set.present_fields().count(), 1);
    assert_eq!(
        data_set.fields[2].as_ref().unwrap().value.value,
        Some(Variant::from(9.5f64))
    );
}

#[test]
fn keep_alive() {
    let connection = PubSubConnection::new(publisher_config(two_writers()));
    let writer_group = connection.config().writer_groups[0].clone();
    let message = connection
        .create_keep_alive_network_message(&writer_group)
        .unwrap();
    let data_set_messages = message.data_set_messages();
    assert_eq!(data_set_messages.len(), 2);
    assert!(data_set_messages
        .iter()
        .all(|m| m.message_type == DataSetMessageType::KeepAlive && m.data_set.is_none()));

    // Without a payload header only one writer can be named
    let mut writer_group = writer_group;
    writer_group.network_message_content_mask = UadpNetworkMessageContentMask::PUBLISHER_ID;
    let message = connection
        .create_keep_alive_network_message(&writer_group)
        .unwrap();
    assert_eq!(message.data_set_messages().len(), 1);
    assert!(message.encode_to_vec().is_ok());

    writer_group.data_set_writers.clear();
    assert!(connection
        .create_keep_alive_network_message(&writer_group)
        .is_none());
}

#[test]
fn publisher_endpoints() {
    let connection = PubSubConnection::new(publisher_config(two_writers()));
    let message = connection
        .create_publisher_endpoints_network_message(Vec::new())
        .unwrap();
    match message.payload {
        NetworkMessagePayload::DiscoveryResponse(DiscoveryResponse::PublisherEndpoints {
            endpoints,
            status_code,
            ..
        }) => {
            assert!(endpoints.is_empty());
            assert_eq!(status_code, StatusCode::BadNotFound);
        }
        payload => panic!("Unexpected payload {:?}", payload),
    }

    // No response can be sent without a publisher id
    let connection = PubSubConnection::new(subscriber_config(Vec::new()));
    assert!(connection
        .create_publisher_endpoints_network_message(vec![EndpointDescription::new(
            "opc.tcp://localhost:4840",
            "http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary",
        )])
        .is_none());
}

#[test]
fn only_own_writers_are_answered() {
    let connection = PubSubConnection::new(publisher_config(two_writers()));
    let (_, collector) = collector(meta_data(1, 1));

    let messages = connection.create_data_set_meta_data_network_messages(&[2, 9], collector.as_ref());
    assert_eq!(messages.len(), 1);

    let messages = connection.create_data_set_writer_configuration_network_messages(&[2, 9]);
    assert_eq!(messages.len(), 1);
    match &messages[0].payload {
        NetworkMessagePayload::DiscoveryResponse(DiscoveryResponse::DataSetWriterConfiguration {
            data_set_writer_ids,
            writer_group,
            status_codes,
            ..
        }) => {
            assert_eq!(data_set_writer_ids, &vec![2]);
            assert_eq!(writer_group.data_set_writers.len(), 1);
            assert_eq!(writer_group.data_set_writers[0].data_set_writer_id, 2);
            assert_eq!(status_codes.len(), 1);
        }
        payload => panic!("Unexpected payload {:?}", payload),
    }

    assert!(connection
        .create_data_set_writer_configuration_network_messages(&[9])
        .is_empty());
}

#[test]
fn discovery_sequence_numbers_increase() {
    let connection = PubSubConnection::new(publisher_config(two_writers()));
    let (_, collector) = collector(meta_data(1, 1));
    let messages = connection.create_data_set_meta_data_network_messages(&[1, 2], collector.as_ref());
    let sequence_numbers = messages
        .iter()
        .map(|m| match m.payload {
            NetworkMessagePayload::DiscoveryResponse(ref response) => response.sequence_number(),
            _ => panic!("Expected a discovery response"),
        })
        .collect::<Vec<_>>();
    assert_eq!(sequence_numbers, vec![1, 2]);
}

#[test]
fn readers_without_meta_data() {
    let readers = vec![
        reader(None, 0, 1, meta_data(1, 1)),
        reader(None, 0, 2, meta_data(0, 0)),
        reader(Some(PublisherId::UInt16(5)), 0, 2, DataSetMetaData::default()),
        reader(None, 0, 0, DataSetMetaData::default()),
    ];
    let connection = PubSubConnection::new(subscriber_config(readers));
    assert!(connection.has_readers());
    assert!(!connection.has_writers());
    assert_eq!(connection.writer_ids_without_meta_data(), vec![2]);

    // Metadata from publisher 5 only reaches readers that accept publisher 5
    assert!(connection.update_reader_meta_data(
        Some(&PublisherId::UInt16(5)),
        2,
        &meta_data(3, 1)
    ));
    assert!(connection.writer_ids_without_meta_data().is_empty());
    assert!(connection
        .readers()
        .iter()
        .filter(|r| r.data_set_writer_id == 2)
        .all(|r| r.data_set_meta_data == meta_data(3, 1)));

    // The same metadata again changes nothing
    assert!(!connection.update_reader_meta_data(
        Some(&PublisherId::UInt16(5)),
        2,
        &meta_data(3, 1)
    ));

    // Publisher 6 only reaches the reader that accepts any publisher
    assert!(connection.update_reader_meta_data(
        Some(&PublisherId::UInt16(6)),
        2,
        &meta_data(4, 1)
    ));
    let versions = connection
        .readers()
        .iter()
        .filter(|r| r.data_set_writer_id == 2)
        .map(|r| r.data_set_meta_data.configuration_version)
        .collect::<Vec<_>>();
    assert_eq!(
        versions,
        vec![ConfigurationVersion::new(4, 1), ConfigurationVersion::new(3, 1)]
    );
}

#[test]
fn published_messages_decode_on_subscriber() {
    let publisher = PubSubConnection::new(publisher_config(two_writers()));
    let writer_group = publisher.config().writer_groups[0].clone();
    let (_, collector) = collector(meta_data(1, 1));
    let mut state = WriterGroupPublishState::new();
    let messages = publisher.create_network_messages(&writer_group, &mut state, collector.as_ref());
    let bytes = messages[2].encode_to_vec().unwrap();

    let subscriber = PubSubConnection::new(subscriber_config(vec![
        reader(Some(PublisherId::UInt16(1)), 100, 1, meta_data(1, 1)),
        reader(Some(PublisherId::UInt16(1)), 100, 2, meta_data(1, 1)),
    ]));
    let decoded = subscriber.decode_network_message(&bytes).unwrap();
    let data_set_messages = decoded.data_set_messages();
    assert_eq!(data_set_messages.len(), 2);
    for message in data_set_messages {
        assert_eq!(message.decode_error_reason, DataSetDecodeErrorReason::NoError);
        assert_eq!(values(message.data_set.as_ref().unwrap()), expected_values());
    }

    let request = subscriber
        .create_discovery_request_message(DiscoveryInformationType::DataSetMetaData, vec![1]);
    let decoded = publisher
        .decode_network_message(&request.encode_to_vec().unwrap())
        .unwrap();
    assert!(matches!(decoded.payload, NetworkMessagePayload::DiscoveryRequest(_)));
}

#[test]
fn disabled_groups_and_writers() {
    let mut config = publisher_config(two_writers());
    config.writer_groups[0].data_set_writers[1].enabled = false;
    let mut disabled_group = WriterGroup::new("Disabled", 101, 100.0);
    disabled_group.enabled = false;
    disabled_group.add_writer(writer(
        3,
        DataSetFieldContentMask::empty(),
        UadpDataSetMessageContentMask::empty(),
    ));
    config.writer_groups.push(disabled_group);
    let connection = PubSubConnection::new(config);
    assert_eq!(connection.enabled_writer_groups().count(), 1);

    let (_, collector) = collector(meta_data(1, 1));
    assert!(connection
        .create_data_set_meta_data_network_messages(&[2, 3], collector.as_ref())
        .is_empty());
    let message: Option<UadpNetworkMessage> = connection
        .create_data_set_meta_data_network_messages(&[1], collector.as_ref())
        .into_iter()
        .next();
    assert!(message.is_some());
}
