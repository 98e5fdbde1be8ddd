use std::convert::TryFrom;

use crate::{
    pubsub::{
        core::*,
        tests::*,
        uadp::{
            DataSetFieldContentMask, DiscoveryInformationType, DiscoveryRequest,
            DiscoveryResponse, NetworkMessagePayload, UadpDataSetMessage,
            UadpDataSetMessageContentMask, UadpNetworkMessage, UadpNetworkMessageContentMask,
            UadpNetworkMessageType,
        },
    },
    types::*,
};

fn decode(bytes: &[u8], readers: &[DataSetReader]) -> EncodingResult<UadpNetworkMessage> {
    UadpNetworkMessage::decode(bytes, readers, &DecodingOptions::test())
}

fn data_set_message(data_set_writer_id: u16) -> UadpDataSetMessage {
    let writer = writer(
        data_set_writer_id,
        DataSetFieldContentMask::empty(),
        UadpDataSetMessageContentMask::SEQUENCE_NUMBER
            | UadpDataSetMessageContentMask::MAJOR_VERSION
            | UadpDataSetMessageContentMask::MINOR_VERSION,
    );
    UadpDataSetMessage::new(&writer, data_set(&meta_data(1, 1)), data_set_writer_id)
}

#[test]
fn publisher_id_types() {
    let publisher_ids = vec![
        PublisherId::Byte(1),
        PublisherId::UInt16(0x1234),
        PublisherId::UInt32(0x1234_5678),
        PublisherId::UInt64(0x1234_5678_9abc_def0),
        PublisherId::from("PublisherA"),
    ];
    for publisher_id in publisher_ids {
        let reader = reader(Some(publisher_id.clone()), 0, 1, meta_data(1, 1));
        let message = UadpNetworkMessage::new(
            UadpNetworkMessageContentMask::PUBLISHER_ID,
            Some(publisher_id.clone()),
            NetworkMessagePayload::DataSetMessages(vec![data_set_message(1)]),
        );
        let decoded = decode(&message.encode_to_vec().unwrap(), &[reader]).unwrap();
        assert_eq!(decoded.publisher_id, Some(publisher_id));
        assert_eq!(decoded.data_set_messages().len(), 1);
    }

    assert!(PublisherId::try_from(Variant::from(1.5f32)).is_err());
    assert!(PublisherId::try_from(Variant::from(1.5f64)).is_err());
    assert_eq!(
        PublisherId::try_from(Variant::UInt16(7)).unwrap(),
        PublisherId::UInt16(7)
    );
}

#[test]
fn publisher_id_filters_readers() {
    let message = UadpNetworkMessage::new(
        UadpNetworkMessageContentMask::PUBLISHER_ID,
        Some(PublisherId::UInt16(10)),
        NetworkMessagePayload::DataSetMessages(vec![data_set_message(1)]),
    );
    let bytes = message.encode_to_vec().unwrap();

    let other = reader(Some(PublisherId::UInt16(11)), 0, 1, meta_data(1, 1));
    assert!(decode(&bytes, &[other]).unwrap().data_set_messages().is_empty());

    let any = reader(None, 0, 1, meta_data(1, 1));
    assert_eq!(decode(&bytes, &[any]).unwrap().data_set_messages().len(), 1);
}

#[test]
fn missing_publisher_id() {
    let message = UadpNetworkMessage::new(
        UadpNetworkMessageContentMask::PUBLISHER_ID,
        None,
        NetworkMessagePayload::DataSetMessages(vec![data_set_message(1)]),
    );
    assert_eq!(message.encode_to_vec(), Err(StatusCode::BadInvalidArgument));
}

#[test]
fn several_messages_need_a_payload_header() {
    let message = UadpNetworkMessage::new(
        UadpNetworkMessageContentMask::PUBLISHER_ID,
        Some(PublisherId::Byte(1)),
        NetworkMessagePayload::DataSetMessages(vec![data_set_message(1), data_set_message(2)]),
    );
    assert_eq!(message.encode_to_vec(), Err(StatusCode::BadInvalidArgument));
}

#[test]
fn several_messages_with_payload_header() {
    let message = UadpNetworkMessage::new(
        UadpNetworkMessageContentMask::PUBLISHER_ID
            | UadpNetworkMessageContentMask::PAYLOAD_HEADER,
        Some(PublisherId::Byte(1)),
        NetworkMessagePayload::DataSetMessages(vec![
            data_set_message(1),
            data_set_message(2),
            data_set_message(3),
        ]),
    );
    let bytes = message.encode_to_vec().unwrap();
    // Flags, publisher id, count and three writer ids come first
    assert_eq!(&bytes[..4], &[0x51, 0x01, 0x03, 0x01]);

    // Writer 2 has no reader and is skipped, the messages around it still decode
    let readers = vec![
        reader(None, 0, 1, meta_data(1, 1)),
        reader(None, 0, 3, meta_data(1, 1)),
    ];
    let decoded = decode(&bytes, &readers).unwrap();
    let messages = decoded.data_set_messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].data_set_writer_id, 1);
    assert_eq!(messages[1].data_set_writer_id, 3);
    assert_eq!(messages[1].sequence_number, 3);
    assert_eq!(
        messages[1].data_set.as_ref(),
        Some(&data_set(&meta_data(1, 1)))
    );
}

#[test]
fn group_header_and_extended_fields() {
    let mut message = UadpNetworkMessage::new(
        UadpNetworkMessageContentMask::PUBLISHER_ID
            | UadpNetworkMessageContentMask::GROUP_HEADER
            | UadpNetworkMessageContentMask::WRITER_GROUP_ID
            | UadpNetworkMessageContentMask::GROUP_VERSION
            | UadpNetworkMessageContentMask::NETWORK_MESSAGE_NUMBER
            | UadpNetworkMessageContentMask::SEQUENCE_NUMBER
            | UadpNetworkMessageContentMask::PAYLOAD_HEADER
            | UadpNetworkMessageContentMask::TIMESTAMP
            | UadpNetworkMessageContentMask::PICO_SECONDS
            | UadpNetworkMessageContentMask::DATA_SET_CLASS_ID,
        Some(PublisherId::UInt32(99)),
        NetworkMessagePayload::DataSetMessages(vec![data_set_message(5)]),
    );
    message.writer_group_id = 12;
    message.group_version = 700;
    message.network_message_number = 1;
    message.sequence_number = 4321;
    message.timestamp = DateTime::from(131_000_000_000_000_000i64);
    message.pico_seconds = 500;
    message.data_set_class_id = Guid::new();

    let readers = vec![reader(Some(PublisherId::UInt32(99)), 12, 5, meta_data(1, 1))];
    let decoded = decode(&message.encode_to_vec().unwrap(), &readers).unwrap();
    assert_eq!(decoded.message_type(), UadpNetworkMessageType::DataSetMessage);
    assert_eq!(decoded.writer_group_id, 12);
    assert_eq!(decoded.group_version, 700);
    assert_eq!(decoded.network_message_number, 1);
    assert_eq!(decoded.sequence_number, 4321);
    assert_eq!(decoded.timestamp, message.timestamp);
    assert_eq!(decoded.pico_seconds, 500);
    assert_eq!(decoded.data_set_class_id, message.data_set_class_id);
    assert_eq!(decoded.data_set_messages().len(), 1);

    // A reader of another group does not get the message
    let readers = vec![reader(Some(PublisherId::UInt32(99)), 13, 5, meta_data(1, 1))];
    let decoded = decode(&message.encode_to_vec().unwrap(), &readers).unwrap();
    assert!(decoded.data_set_messages().is_empty());
}

#[test]
fn without_payload_header_first_matching_reader_decodes() {
    let message = UadpNetworkMessage::new(
        UadpNetworkMessageContentMask::empty(),
        None,
        NetworkMessagePayload::DataSetMessages(vec![data_set_message(7)]),
    );
    let bytes = message.encode_to_vec().unwrap();

    let mut disabled = reader(None, 0, 6, meta_data(1, 1));
    disabled.enabled = false;
    let readers = vec![disabled, reader(None, 0, 8, meta_data(1, 1))];
    let decoded = decode(&bytes, &readers).unwrap();
    let messages = decoded.data_set_messages();
    assert_eq!(messages.len(), 1);
    // The writer id is unknown on the wire so it is taken from the reader
    assert_eq!(messages[0].data_set_writer_id, 8);
    assert_eq!(messages[0].data_set.as_ref(), Some(&data_set(&meta_data(1, 1))));

    assert!(decode(&bytes, &[]).unwrap().data_set_messages().is_empty());
}

#[test]
fn discovery_request() {
    let request = DiscoveryRequest::new(DiscoveryInformationType::DataSetMetaData, vec![1, 2, 300]);
    let message = UadpNetworkMessage::discovery_request(None, request.clone());
    let bytes = message.encode_to_vec().unwrap();
    // ExtFlags1 and ExtFlags2 announce the request, then type, information type and ids
    assert_eq!(
        bytes,
        vec![0x81, 0x80, 0x04, 0x01, 0x02, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x2c, 0x01]
    );
    let decoded = decode(&bytes, &[]).unwrap();
    assert_eq!(decoded.message_type(), UadpNetworkMessageType::DiscoveryRequest);
    assert!(decoded.is_discovery());
    assert_eq!(decoded.payload, NetworkMessagePayload::DiscoveryRequest(request));
}

#[test]
fn discovery_responses() {
    let mut writer_group = WriterGroup::new("Group", 3, 250.0);
    writer_group.add_writer(writer(
        4,
        DataSetFieldContentMask::RAW_DATA,
        UadpDataSetMessageContentMask::SEQUENCE_NUMBER,
    ));
    let responses = vec![
        DiscoveryResponse::PublisherEndpoints {
            sequence_number: 1,
            endpoints: vec![EndpointDescription::new(
                "opc.tcp://localhost:4840",
                "http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary",
            )],
            status_code: StatusCode::Good,
        },
        DiscoveryResponse::DataSetMetaData {
            sequence_number: 2,
            data_set_writer_id: 4,
            meta_data: meta_data(3, 4),
            status_code: StatusCode::Good,
        },
        DiscoveryResponse::DataSetWriterConfiguration {
            sequence_number: 3,
            data_set_writer_ids: vec![4],
            writer_group: writer_group.clone(),
            status_codes: vec![StatusCode::Good],
        },
    ];
    for response in responses {
        let message = UadpNetworkMessage::discovery_response(PublisherId::UInt16(1), response.clone());
        let decoded = decode(&message.encode_to_vec().unwrap(), &[]).unwrap();
        assert_eq!(decoded.message_type(), UadpNetworkMessageType::DiscoveryResponse);
        assert_eq!(decoded.publisher_id, Some(PublisherId::UInt16(1)));
        match (decoded.payload, response) {
            (
                NetworkMessagePayload::DiscoveryResponse(DiscoveryResponse::DataSetWriterConfiguration {
                    data_set_writer_ids,
                    writer_group: decoded_group,
                    status_codes,
                    ..
                }),
                DiscoveryResponse::DataSetWriterConfiguration { .. },
            ) => {
                // Broker settings are not part of the configuration sent
                assert_eq!(data_set_writer_ids, vec![4]);
                assert_eq!(status_codes, vec![StatusCode::Good]);
                assert_eq!(decoded_group.name, "Group");
                assert_eq!(decoded_group.writer_group_id, 3);
                assert_eq!(decoded_group.publishing_interval, 250.0);
                assert_eq!(decoded_group.data_set_writers, writer_group.data_set_writers);
            }
            (NetworkMessagePayload::DiscoveryResponse(decoded), response) => {
                assert_eq!(decoded, response)
            }
            (payload, _) => panic!("Unexpected payload {:?}", payload),
        }
    }
}

#[test]
fn secured_and_chunked_are_not_supported() {
    // ExtFlags1 with the security bit
    assert_eq!(decode(&[0x81, 0x10], &[]), Err(StatusCode::BadNotSupported));
    // ExtFlags2 with the chunk bit
    assert_eq!(
        decode(&[0x81, 0x80, 0x01], &[]),
        Err(StatusCode::BadNotSupported)
    );
}

#[test]
fn truncated_header() {
    // A publisher id is announced but missing
    assert!(decode(&[0x11], &[]).is_err());
    assert!(decode(&[], &[]).is_err());
}

#[test]
fn message_size_limit() {
    let mut decoding_options = DecodingOptions::test();
    decoding_options.max_message_size = 8;
    let message = UadpNetworkMessage::new(
        UadpNetworkMessageContentMask::empty(),
        None,
        NetworkMessagePayload::DataSetMessages(vec![data_set_message(1)]),
    );
    let bytes = message.encode_to_vec().unwrap();
    assert!(bytes.len() > 8);
    assert_eq!(
        UadpNetworkMessage::decode(&bytes, &[], &decoding_options),
        Err(StatusCode::BadEncodingLimitsExceeded)
    );
}
