use std::{io::Cursor, str::FromStr};

use crate::types::{tests::*, *};

#[test]
fn encoding_bool() {
    serialize_test(true);
    serialize_test(false);
    serialize_and_compare(true, &[1]);
}

#[test]
fn encoding_numbers() {
    serialize_test(-42i8);
    serialize_test(0xfeu8);
    serialize_test(-1234i16);
    serialize_test(0xbeefu16);
    serialize_test(-123_456i32);
    serialize_test(0xdead_beefu32);
    serialize_test(-1i64);
    serialize_test(u64::MAX);
    serialize_test(1.25f32);
    serialize_test(-3.5e100f64);
    serialize_and_compare(0x1234u16, &[0x34, 0x12]);
    serialize_and_compare(1i32, &[1, 0, 0, 0]);
}

#[test]
fn encoding_string() {
    serialize_test(UAString::null());
    serialize_test(UAString::from(""));
    serialize_test(UAString::from("Sunshine"));
    serialize_and_compare(UAString::null(), &[0xff, 0xff, 0xff, 0xff]);
    serialize_and_compare(UAString::from("ab"), &[2, 0, 0, 0, b'a', b'b']);
}

#[test]
fn decode_string_exceeding_limit() {
    let bytes = UAString::from("too long for the limit").encode_to_vec();
    let decoding_options = DecodingOptions {
        max_string_length: 5,
        ..DecodingOptions::test()
    };
    let result = UAString::decode(&mut Cursor::new(bytes), &decoding_options);
    assert_eq!(result.unwrap_err(), StatusCode::BadDecodingError);
}

#[test]
fn decode_truncated_stream() {
    let result = u32::decode(&mut Cursor::new(vec![1u8, 2]), &DecodingOptions::test());
    assert_eq!(result.unwrap_err(), StatusCode::BadDecodingError);
}

#[test]
fn encoding_byte_string() {
    serialize_test(ByteString::null());
    serialize_test(ByteString::from(&[1u8, 2, 3, 4]));
}

#[test]
fn encoding_date_time() {
    serialize_test(DateTime::now());
    serialize_test(DateTime::null());
}

#[test]
fn encoding_node_id() {
    // two byte, four byte and full numeric forms
    serialize_and_compare(NodeId::new(0, 11u32), &[0x0, 11]);
    serialize_and_compare(NodeId::new(2, 0x1234u32), &[0x1, 2, 0x34, 0x12]);
    serialize_test(NodeId::new(300, 0x12345u32));
    serialize_test(NodeId::new(1, "Temperature"));
    serialize_test(NodeId::new(3, Guid::new()));
    serialize_test(NodeId::new(4, ByteString::from(&[9u8, 8, 7])));
}

#[test]
fn node_id_from_str() {
    assert_eq!(NodeId::from_str("i=11").unwrap(), NodeId::new(0, 11u32));
    assert_eq!(
        NodeId::from_str("ns=2;s=Pump.Speed").unwrap(),
        NodeId::new(2, "Pump.Speed")
    );
    assert_eq!(
        NodeId::from_str("ns=4;b=090807").unwrap(),
        NodeId::new(4, ByteString::from(&[9u8, 8, 7]))
    );
    assert!(NodeId::from_str("ns=x;i=1").is_err());
    assert!(NodeId::from_str("q=1").is_err());
    assert!(NodeId::from_str("b=123").is_err());
    assert!(NodeId::from_str("b=zz").is_err());

    // The string form parses back to the same node id
    for node_id in [
        NodeId::new(0, 2255u32),
        NodeId::new(1, "Line 1"),
        NodeId::new(3, Guid::new()),
        NodeId::new(4, ByteString::from(&[0u8, 0xff, 0x10])),
    ] {
        assert_eq!(NodeId::from_str(&node_id.to_string()).unwrap(), node_id);
    }
}

#[test]
fn encoding_localized_text() {
    serialize_test(LocalizedText::null());
    serialize_test(LocalizedText::new("en", "Hello"));
    serialize_and_compare(LocalizedText::null(), &[0]);
}

#[test]
fn encoding_data_value() {
    serialize_test(DataValue::null());
    serialize_test(DataValue::value_only(42i32));
    serialize_test(DataValue {
        value: Some(Variant::from(1.5f64)),
        status: Some(StatusCode::UncertainLastUsableValue),
        source_timestamp: Some(DateTime::now()),
        source_picoseconds: Some(5),
        server_timestamp: Some(DateTime::now()),
        server_picoseconds: Some(u16::MAX),
    });
}

#[test]
fn data_value_mask_matches_presence() {
    let dv = DataValue {
        status: Some(StatusCode::BadNotFound),
        ..Default::default()
    };
    let bytes = dv.encode_to_vec();
    assert_eq!(bytes[0], 0x2);
    assert_eq!(bytes.len(), 5);
}

#[test]
fn depth_gauge_limits_nested_data_values() {
    let mut value = Variant::from(1u8);
    for _ in 0..20 {
        value = Variant::from(DataValue::value_only(value));
    }
    let bytes = value.encode_to_vec();
    let result = Variant::decode(&mut Cursor::new(bytes), &DecodingOptions::test());
    assert_eq!(result.unwrap_err(), StatusCode::BadDecodingError);
}
